//! Resolved parameters as submitted to the provider.

use serde::{Deserialize, Serialize};

/// Where a resolved parameter's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterValue {
    /// Send this value.
    Explicit(String),
    /// Keep the value the provider already stores.
    UsePrevious,
}

/// A parameter ready to submit.
///
/// Either carries a value or asks the provider to keep its stored one, never
/// both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParameter {
    /// Parameter name.
    pub key: String,
    /// Value or previous-value marker.
    pub value: ParameterValue,
}

impl ResolvedParameter {
    /// Creates a parameter with an explicit value.
    #[must_use]
    pub fn explicit(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::Explicit(value.into()),
        }
    }

    /// Creates a parameter that keeps the provider's stored value.
    #[must_use]
    pub fn use_previous(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: ParameterValue::UsePrevious,
        }
    }

    /// Returns the explicit value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match &self.value {
            ParameterValue::Explicit(v) => Some(v),
            ParameterValue::UsePrevious => None,
        }
    }

    /// Returns true if the provider should keep its stored value.
    #[must_use]
    pub fn use_previous_value(&self) -> bool {
        matches!(self.value, ParameterValue::UsePrevious)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_of_value_or_previous() {
        let explicit = ResolvedParameter::explicit("Size", "t3.micro");
        assert_eq!(explicit.value(), Some("t3.micro"));
        assert!(!explicit.use_previous_value());

        let previous = ResolvedParameter::use_previous("Size");
        assert_eq!(previous.value(), None);
        assert!(previous.use_previous_value());
    }
}
