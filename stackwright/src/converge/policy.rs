//! Stack policy input detection.

use std::path::Path;
use url::Url;

use crate::errors::{InputError, Result};
use crate::provider::StackPolicy;

const URL_SCHEMES: &[&str] = &["http", "https", "s3"];

impl StackPolicy {
    /// Interprets a user-supplied policy argument.
    ///
    /// In order: a URL becomes [`StackPolicy::Url`]; a path to an existing
    /// file becomes [`StackPolicy::Body`] with the file's contents; a JSON
    /// document becomes [`StackPolicy::Body`] verbatim. Anything else is an
    /// [`InputError`].
    pub fn detect(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if let Ok(url) = Url::parse(raw) {
            if URL_SCHEMES.contains(&url.scheme()) {
                return Ok(Self::Url(raw.to_string()));
            }
        }

        let path = Path::new(raw);
        if path.is_file() {
            return Ok(Self::Body(std::fs::read_to_string(path)?));
        }

        if serde_json::from_str::<serde_json::Value>(raw).is_ok_and(|v| v.is_object()) {
            return Ok(Self::Body(raw.to_string()));
        }

        Err(InputError::new(format!(
            "Could not interpret stack policy '{raw}' as a URL, an existing file or a JSON document"
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StackwrightError;

    #[test]
    fn test_url() {
        assert_eq!(
            StackPolicy::detect("https://example.com/policy.json").unwrap(),
            StackPolicy::Url("https://example.com/policy.json".into())
        );
    }

    #[test]
    fn test_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.json");
        std::fs::write(&path, r#"{"Statement": []}"#).unwrap();

        assert_eq!(
            StackPolicy::detect(path.to_str().unwrap()).unwrap(),
            StackPolicy::Body(r#"{"Statement": []}"#.into())
        );
    }

    #[test]
    fn test_raw_json() {
        let raw = r#"{"Statement":[{"Effect":"Allow","Action":"Update:*","Principal":"*","Resource":"*"}]}"#;
        assert_eq!(StackPolicy::detect(raw).unwrap(), StackPolicy::Body(raw.into()));
    }

    #[test]
    fn test_anything_else_is_input_error() {
        let err = StackPolicy::detect("/no/such/policy.json").unwrap_err();
        assert!(matches!(err, StackwrightError::Input(_)));
        assert!(StackPolicy::detect("allow everything").is_err());
    }
}
