//! Raw parameter inputs gathered from files, flags and arguments.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{InputError, Result};

/// Splits `name<sep>value`, requiring both sides to be non-empty.
///
/// The name ends at the first separator that leaves a non-empty value.
#[must_use]
pub fn split_assignment(raw: &str, separator: char) -> Option<(&str, &str)> {
    raw.char_indices()
        .skip(1)
        .find(|&(i, c)| c == separator && i + c.len_utf8() < raw.len())
        .map(|(i, c)| (&raw[..i], &raw[i + c.len_utf8()..]))
}

/// Input parameters keyed by name.
///
/// Sources are merged in the order they are applied; later sources win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterInputs {
    values: BTreeMap<String, String>,
}

impl ParameterInputs {
    /// Creates an empty set of inputs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Sets one value, builder style.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the merged values.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Consumes the inputs, returning the merged values.
    #[must_use]
    pub fn into_values(self) -> BTreeMap<String, String> {
        self.values
    }

    /// Merges a YAML or JSON parameter file.
    ///
    /// Top-level scalars are taken as-is. Nested maps are per-environment
    /// overrides: when `environment` is given, that map is merged over the
    /// top level; the others are ignored.
    pub fn merge_file(&mut self, path: &Path, environment: Option<&str>) -> Result<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InputError::new(format!("Could not read parameter file {}: {e}", path.display()))
        })?;
        let parsed: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        let Value::Object(map) = parsed else {
            return Err(InputError::new(format!(
                "Parameter file {} must contain a map of names to values",
                path.display()
            ))
            .into());
        };

        for (name, value) in &map {
            if let Some(rendered) = scalar(value) {
                self.values.insert(name.clone(), rendered);
            }
        }

        if let Some(env) = environment {
            match map.get(env) {
                Some(Value::Object(overrides)) => {
                    for (name, value) in overrides {
                        if let Some(rendered) = scalar(value) {
                            self.values.insert(name.clone(), rendered);
                        }
                    }
                }
                _ => {
                    return Err(InputError::new(format!(
                        "Parameter file {} has no '{env}' section",
                        path.display()
                    ))
                    .into())
                }
            }
        }
        Ok(())
    }

    /// Merges a `name:value` flag.
    pub fn merge_flag(&mut self, flag: &str) -> Result<()> {
        let (name, value) = split_assignment(flag, ':').ok_or_else(|| {
            InputError::new(format!("Invalid parameter '{flag}' (expected name:value)"))
        })?;
        self.insert(name, value);
        Ok(())
    }

    /// Consumes `name=value` arguments, returning the rest in order.
    pub fn extract_assignments<I, S>(&mut self, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rest = Vec::new();
        for arg in args {
            let arg = arg.into();
            match split_assignment(&arg, '=') {
                Some((name, value)) => {
                    tracing::debug!(parameter = %name, "Extracted parameter from arguments");
                    self.insert(name, value);
                }
                None => rest.push(arg),
            }
        }
        rest
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(scalar)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Value::Null | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_assignment() {
        assert_eq!(split_assignment("Size=t3.micro", '='), Some(("Size", "t3.micro")));
        assert_eq!(split_assignment("Url=http://x?a=b", '='), Some(("Url", "http://x?a=b")));
        assert_eq!(split_assignment("=value", '='), None);
        assert_eq!(split_assignment("name=", '='), None);
        assert_eq!(split_assignment("web", '='), None);
    }

    #[test]
    fn test_extract_assignments_keeps_other_args() {
        let mut inputs = ParameterInputs::new();
        let rest = inputs.extract_assignments(["web", "Size=t3.micro", "db", "Vpc=@net.VpcId"]);

        assert_eq!(rest, vec!["web".to_string(), "db".to_string()]);
        assert_eq!(inputs.values()["Size"], "t3.micro");
        assert_eq!(inputs.values()["Vpc"], "@net.VpcId");
    }

    #[test]
    fn test_merge_flag() {
        let mut inputs = ParameterInputs::new();
        inputs.merge_flag("Image:ami-123:beta").unwrap();
        assert_eq!(inputs.values()["Image"], "ami-123:beta");
        assert!(inputs.merge_flag("novalue").is_err());
    }

    #[test]
    fn test_merge_file_with_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.yaml");
        std::fs::write(
            &path,
            "Size: t3.micro\nCount: 2\nprod:\n  Size: m5.large\nstaging:\n  Size: t3.small\n",
        )
        .unwrap();

        let mut inputs = ParameterInputs::new();
        inputs.merge_file(&path, Some("prod")).unwrap();

        assert_eq!(inputs.values()["Size"], "m5.large");
        assert_eq!(inputs.values()["Count"], "2");
        assert!(!inputs.values().contains_key("staging"));
    }

    #[test]
    fn test_merge_file_missing_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"Size": "t3.micro"}"#).unwrap();

        let mut inputs = ParameterInputs::new();
        assert!(inputs.merge_file(&path, Some("prod")).is_err());
    }

    #[test]
    fn test_later_sources_win() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("params.json");
        std::fs::write(&path, r#"{"Size": "from-file", "Keep": "yes"}"#).unwrap();

        let mut inputs = ParameterInputs::new();
        inputs.merge_file(&path, None).unwrap();
        inputs.merge_flag("Size:from-flag").unwrap();
        inputs.extract_assignments(["Size=from-arg"]);

        assert_eq!(inputs.values()["Size"], "from-arg");
        assert_eq!(inputs.values()["Keep"], "yes");
    }
}
