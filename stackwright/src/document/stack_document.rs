//! The immutable rendered document.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;

use super::declaration::ParameterDeclaration;
use super::validation::collect_violations;
use crate::errors::{DocumentValidationError, InputError, Result};

/// A rendered stack document.
///
/// The body is serialized once at construction and never changes afterwards,
/// so the payload submitted to the provider is exactly the one that was
/// fingerprinted and validated.
#[derive(Debug, Clone)]
pub struct StackDocument {
    root: Value,
    body: String,
}

impl StackDocument {
    /// Wraps a rendered tree. The root must be an object.
    pub fn new(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(InputError::new("Stack document must be a JSON object at the top level").into());
        }
        let body = serde_json::to_string(&root)?;
        Ok(Self { root, body })
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Self::new(serde_yaml::from_str(yaml)?)
    }

    /// Loads a document from disk; `.yaml`/`.yml` files are read as YAML,
    /// everything else as JSON.
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            InputError::new(format!("Could not read template {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    /// Returns the rendered tree.
    #[must_use]
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Returns a top-level section such as `Parameters` or `Outputs`.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    /// Returns the compact serialized body.
    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Returns the body size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.body.len()
    }

    /// Returns a pretty-printed rendering.
    pub fn to_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.root)?)
    }

    /// SHA-256 hex digest of the body.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.body.as_bytes()))
    }

    /// Parameters declared in the document, in declaration order.
    #[must_use]
    pub fn declared_parameters(&self) -> Vec<ParameterDeclaration> {
        self.section("Parameters")
            .map(|params| {
                params
                    .iter()
                    .map(|(name, entry)| ParameterDeclaration::from_template_entry(name, entry))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fails with every structural violation if the document is malformed.
    pub fn validate_structure(&self) -> Result<()> {
        let violations = collect_violations(&self.root);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(DocumentValidationError::new(violations).into())
        }
    }
}
