//! Error types for the stackwright engine.
//!
//! Every failure the engine can surface has its own struct so callers can
//! match on it and render a precise message naming the stack, parameter or
//! file involved. [`StackwrightError`] is the umbrella type returned by all
//! public operations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StackwrightError>;

/// The main error type for stackwright operations.
#[derive(Debug, Error)]
pub enum StackwrightError {
    /// The provider rejected the template.
    #[error("{0}")]
    TemplateRejected(#[from] TemplateRejectedError),

    /// A create was attempted against a stack that already exists.
    #[error("{0}")]
    StackExists(#[from] StackExistsError),

    /// The named stack does not exist.
    #[error("{0}")]
    StackNotFound(#[from] StackNotFoundError),

    /// A cross-stack output lookup failed.
    #[error("{0}")]
    MissingOutput(#[from] MissingOutputError),

    /// The requested credential profile does not exist.
    #[error("{0}")]
    NoSuchProfile(#[from] NoSuchProfileError),

    /// Credentials could not be loaded or refreshed.
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// The provider throttled the request.
    #[error("{0}")]
    Throttling(#[from] ThrottlingError),

    /// The document contains structural violations.
    #[error("{0}")]
    DocumentValidation(#[from] DocumentValidationError),

    /// User input could not be interpreted.
    #[error("{0}")]
    Input(#[from] InputError),

    /// Any other provider failure, passed through unchanged.
    #[error("Provider error on stack '{stack}': [{code}] {message}")]
    Provider {
        /// Stack the call was made for.
        stack: String,
        /// Provider error code.
        code: String,
        /// Provider error message.
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StackwrightError {
    /// Returns true if this error means the stack does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::StackNotFound(_))
    }

    /// Attaches a stack name to a provider error.
    #[must_use]
    pub fn from_provider(stack: &str, err: ProviderError) -> Self {
        match err {
            ProviderError::AlreadyExists => StackExistsError::new(stack).into(),
            ProviderError::NotFound => StackNotFoundError::new(stack).into(),
            ProviderError::Validation { message } => {
                TemplateRejectedError::new(stack, message).into()
            }
            ProviderError::Throttling { message } => ThrottlingError::new(stack, message).into(),
            ProviderError::Other { code, message } => Self::Provider {
                stack: stack.to_string(),
                code,
                message,
            },
        }
    }
}

impl From<serde_json::Error> for StackwrightError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for StackwrightError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors returned by a [`crate::provider::StackProvider`] implementation.
///
/// Providers know nothing about which stack the caller cares about, so the
/// stack name is attached when converting into [`StackwrightError`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The stack already exists.
    #[error("stack already exists")]
    AlreadyExists,
    /// The stack does not exist.
    #[error("stack does not exist")]
    NotFound,
    /// The request failed provider-side validation.
    #[error("validation error: {message}")]
    Validation {
        /// Provider message.
        message: String,
    },
    /// The request was throttled.
    #[error("throttled: {message}")]
    Throttling {
        /// Provider message.
        message: String,
    },
    /// Anything else.
    #[error("[{code}] {message}")]
    Other {
        /// Provider error code.
        code: String,
        /// Provider message.
        message: String,
    },
}

impl ProviderError {
    /// Creates an unclassified provider error.
    #[must_use]
    pub fn other(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Other {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a throttling error.
    #[must_use]
    pub fn throttling(message: impl Into<String>) -> Self {
        Self::Throttling {
            message: message.into(),
        }
    }
}

/// Error raised when the provider rejects a template.
#[derive(Debug, Clone, Error)]
#[error("Template for stack '{stack}' was rejected: {message}")]
pub struct TemplateRejectedError {
    /// The stack being converged.
    pub stack: String,
    /// The provider's validation message.
    pub message: String,
}

impl TemplateRejectedError {
    /// Creates a new template rejection error.
    #[must_use]
    pub fn new(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            message: message.into(),
        }
    }
}

/// Signal raised when creating a stack that already exists.
#[derive(Debug, Clone, Error)]
#[error("Stack '{stack}' already exists")]
pub struct StackExistsError {
    /// The stack name.
    pub stack: String,
}

impl StackExistsError {
    /// Creates a new stack exists error.
    #[must_use]
    pub fn new(stack: impl Into<String>) -> Self {
        Self { stack: stack.into() }
    }
}

/// Error raised when a named stack does not exist.
#[derive(Debug, Clone, Error)]
#[error("Stack '{stack}' does not exist")]
pub struct StackNotFoundError {
    /// The stack name.
    pub stack: String,
}

impl StackNotFoundError {
    /// Creates a new stack not found error.
    #[must_use]
    pub fn new(stack: impl Into<String>) -> Self {
        Self { stack: stack.into() }
    }
}

/// Error raised when a `@stack.output` lookup names an output that is absent.
#[derive(Debug, Clone, Error)]
#[error("Stack '{stack}' has no output value named '{output}' (needed by parameter '{parameter}')")]
pub struct MissingOutputError {
    /// The stack that was consulted.
    pub stack: String,
    /// The missing output name.
    pub output: String,
    /// The parameter whose value contained the lookup.
    pub parameter: String,
}

impl MissingOutputError {
    /// Creates a new missing output error.
    #[must_use]
    pub fn new(
        stack: impl Into<String>,
        output: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        Self {
            stack: stack.into(),
            output: output.into(),
            parameter: parameter.into(),
        }
    }
}

/// Error raised when a credential profile cannot be found.
#[derive(Debug, Clone, Error)]
#[error("Profile '{profile}' not found in {}", path.display())]
pub struct NoSuchProfileError {
    /// The requested profile.
    pub profile: String,
    /// The credentials file that was searched.
    pub path: PathBuf,
}

impl NoSuchProfileError {
    /// Creates a new missing profile error.
    #[must_use]
    pub fn new(profile: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            profile: profile.into(),
            path: path.into(),
        }
    }
}

/// Error raised when credentials are incomplete or a role cannot be assumed.
#[derive(Debug, Clone, Error)]
#[error("Credentials for profile '{profile}': {message}")]
pub struct CredentialError {
    /// The profile being loaded.
    pub profile: String,
    /// What went wrong.
    pub message: String,
}

impl CredentialError {
    /// Creates a new credential error.
    #[must_use]
    pub fn new(profile: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            message: message.into(),
        }
    }
}

/// Transient throttling response from the provider.
#[derive(Debug, Clone, Error)]
#[error("Throttled while operating on stack '{stack}': {message}")]
pub struct ThrottlingError {
    /// The stack name.
    pub stack: String,
    /// Provider message.
    pub message: String,
}

impl ThrottlingError {
    /// Creates a new throttling error.
    #[must_use]
    pub fn new(stack: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            message: message.into(),
        }
    }
}

/// A single structural problem found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Rendered location, e.g. `Stack.Resources.Web.Properties.Tags[0]`.
    pub path: String,
    /// Description of the problem.
    pub message: String,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} in {}", self.message, self.path)
    }
}

/// Error carrying every structural violation found in a document.
#[derive(Debug, Clone, Error)]
#[error("Document has {} validation error(s): {}", violations.len(), summarize(violations))]
pub struct DocumentValidationError {
    /// All violations, in document order.
    pub violations: Vec<Violation>,
}

impl DocumentValidationError {
    /// Creates a new document validation error.
    #[must_use]
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Error raised for user input the engine cannot interpret.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InputError {
    /// The error message.
    pub message: String,
}

impl InputError {
    /// Creates a new input error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_conflict_maps_to_stack_exists() {
        let err = StackwrightError::from_provider("web", ProviderError::AlreadyExists);
        assert!(matches!(err, StackwrightError::StackExists(ref e) if e.stack == "web"));
    }

    #[test]
    fn test_provider_not_found_is_recognized() {
        let err = StackwrightError::from_provider("web", ProviderError::NotFound);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Stack 'web' does not exist");
    }

    #[test]
    fn test_provider_other_keeps_code_and_message() {
        let err = StackwrightError::from_provider(
            "web",
            ProviderError::other("InsufficientCapabilitiesException", "Requires CAPABILITY_IAM"),
        );
        assert_eq!(
            err.to_string(),
            "Provider error on stack 'web': [InsufficientCapabilitiesException] Requires CAPABILITY_IAM"
        );
    }

    #[test]
    fn test_document_validation_lists_every_violation() {
        let err = DocumentValidationError::new(vec![
            Violation::new("Stack.Resources.A", "null values are not allowed in templates"),
            Violation::new("Stack.Outputs.B[1]", "null values are not allowed in templates"),
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Document has 2 validation error(s)"));
        assert!(msg.contains("Stack.Resources.A"));
        assert!(msg.contains("Stack.Outputs.B[1]"));
    }

    #[test]
    fn test_missing_output_names_parameter() {
        let err = MissingOutputError::new("network", "VpcId", "Vpc");
        assert_eq!(
            err.to_string(),
            "Stack 'network' has no output value named 'VpcId' (needed by parameter 'Vpc')"
        );
    }
}
