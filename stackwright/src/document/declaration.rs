//! Declared template parameters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parameter declared by a template.
///
/// Built either from the document's `Parameters` section or from the
/// provider's validation response; the latter is authoritative when
/// converging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDeclaration {
    /// Logical parameter name.
    pub name: String,
    /// Provider type, e.g. `String` or `AWS::EC2::KeyPair::KeyName`.
    pub param_type: String,
    /// Declared default, rendered as a string.
    pub default: Option<String>,
    /// Whether the value must be masked in diagnostics (`NoEcho`).
    pub sensitive: bool,
    /// Allowed values, if constrained.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_values: Vec<String>,
    /// Allowed pattern, if constrained.
    pub allowed_pattern: Option<String>,
    /// Human description.
    pub description: Option<String>,
}

impl ParameterDeclaration {
    /// Creates a `String` parameter with no default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: "String".to_string(),
            default: None,
            sensitive: false,
            allowed_values: Vec::new(),
            allowed_pattern: None,
            description: None,
        }
    }

    /// Sets the default value.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Marks the parameter sensitive.
    #[must_use]
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Sets the parameter type.
    #[must_use]
    pub fn with_type(mut self, param_type: impl Into<String>) -> Self {
        self.param_type = param_type.into();
        self
    }

    /// Builds a declaration from one entry of a template `Parameters` section.
    #[must_use]
    pub fn from_template_entry(name: &str, entry: &Value) -> Self {
        let mut decl = Self::new(name);
        let Some(obj) = entry.as_object() else {
            return decl;
        };

        if let Some(t) = obj.get("Type").and_then(Value::as_str) {
            decl.param_type = t.to_string();
        }
        decl.default = obj.get("Default").and_then(scalar_to_string);
        decl.sensitive = obj.get("NoEcho").is_some_and(is_truthy);
        decl.allowed_values = obj
            .get("AllowedValues")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(scalar_to_string).collect())
            .unwrap_or_default();
        decl.allowed_pattern = obj
            .get("AllowedPattern")
            .and_then(Value::as_str)
            .map(str::to_string);
        decl.description = obj
            .get("Description")
            .and_then(Value::as_str)
            .map(str::to_string);
        decl
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

// NoEcho shows up as both `true` and `"true"` in hand-written templates.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_template_entry_reads_all_fields() {
        let entry = json!({
            "Type": "Number",
            "Default": 3,
            "NoEcho": "true",
            "AllowedValues": [1, 3, 5],
            "AllowedPattern": "[0-9]+",
            "Description": "Instance count"
        });

        let decl = ParameterDeclaration::from_template_entry("Count", &entry);
        assert_eq!(decl.name, "Count");
        assert_eq!(decl.param_type, "Number");
        assert_eq!(decl.default.as_deref(), Some("3"));
        assert!(decl.sensitive);
        assert_eq!(decl.allowed_values, vec!["1", "3", "5"]);
        assert_eq!(decl.allowed_pattern.as_deref(), Some("[0-9]+"));
        assert_eq!(decl.description.as_deref(), Some("Instance count"));
    }

    #[test]
    fn test_from_template_entry_defaults_to_string() {
        let decl = ParameterDeclaration::from_template_entry("Name", &json!({}));
        assert_eq!(decl.param_type, "String");
        assert!(decl.default.is_none());
        assert!(!decl.sensitive);
    }
}
