//! Structural validation of rendered documents.
//!
//! The provider refuses templates containing `null` anywhere, and reports only
//! the first one it finds. Walking the tree locally lets every offending
//! location be reported in one pass.

use serde_json::Value;

use crate::errors::Violation;

/// Message attached to every `null` violation.
pub const NULL_VALUE_MESSAGE: &str = "null values are not allowed in templates";

/// One step of a path into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Object key.
    Key(String),
    /// Array index.
    Index(usize),
}

/// Renders a path as `Stack.Resources.Web[0]`.
#[must_use]
pub fn render_path(segments: &[PathSegment]) -> String {
    segments
        .iter()
        .fold(String::from("Stack"), |mut rendered, segment| {
            match segment {
                PathSegment::Key(key) => {
                    rendered.push('.');
                    rendered.push_str(key);
                }
                PathSegment::Index(i) => {
                    rendered.push_str(&format!("[{i}]"));
                }
            }
            rendered
        })
}

/// Collects every structural violation in `root`, in document order.
#[must_use]
pub fn collect_violations(root: &Value) -> Vec<Violation> {
    let mut violations = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &mut violations);
    violations
}

fn walk(value: &Value, path: &mut Vec<PathSegment>, violations: &mut Vec<Violation>) {
    match value {
        Value::Null => violations.push(Violation::new(render_path(path), NULL_VALUE_MESSAGE)),
        Value::Object(map) => {
            for (key, child) in map {
                path.push(PathSegment::Key(key.clone()));
                walk(child, path, violations);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                path.push(PathSegment::Index(i));
                walk(child, path, violations);
                path.pop();
            }
        }
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_render_path() {
        let path = vec![
            PathSegment::Key("Resources".into()),
            PathSegment::Key("Web".into()),
            PathSegment::Index(2),
        ];
        assert_eq!(render_path(&path), "Stack.Resources.Web[2]");
        assert_eq!(render_path(&[]), "Stack");
    }

    #[test]
    fn test_collects_all_nulls_in_order() {
        let doc = json!({
            "Resources": {
                "Web": {
                    "Type": "AWS::EC2::Instance",
                    "Properties": {"ImageId": null, "Tags": [{"Key": "a", "Value": null}]}
                }
            },
            "Outputs": {"Ip": null}
        });

        let violations = collect_violations(&doc);
        let paths: Vec<_> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "Stack.Resources.Web.Properties.ImageId",
                "Stack.Resources.Web.Properties.Tags[0].Value",
                "Stack.Outputs.Ip",
            ]
        );
        assert!(violations.iter().all(|v| v.message == NULL_VALUE_MESSAGE));
    }

    #[test]
    fn test_clean_document_has_no_violations() {
        let doc = json!({"Resources": {"A": {"Type": "X", "Properties": {"List": [1, "two", true]}}}});
        assert!(collect_violations(&doc).is_empty());
    }
}
