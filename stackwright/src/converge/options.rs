//! Options for a converge run.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use url::Url;

use crate::errors::InputError;
use crate::provider::{OnFailure, StackPolicy};

/// Request for a named change-set instead of an immediate update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetOptions {
    /// Change-set name.
    pub name: String,
    /// Description shown to reviewers.
    pub description: Option<String>,
}

impl ChangeSetOptions {
    /// Creates options for a change-set called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Where oversized templates are uploaded, parsed from `s3://bucket/prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLocation {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix without surrounding slashes. May be empty.
    pub prefix: String,
}

impl UploadLocation {
    /// Returns the object key for a template.
    ///
    /// Keys are `<prefix>/<stack>-<fingerprint[..16]>.json`, so re-uploading an
    /// unchanged document reuses the same key.
    #[must_use]
    pub fn key_for(&self, stack: &str, fingerprint: &str) -> String {
        let short = fingerprint.get(..16).unwrap_or(fingerprint);
        if self.prefix.is_empty() {
            format!("{stack}-{short}.json")
        } else {
            format!("{}/{stack}-{short}.json", self.prefix)
        }
    }
}

impl FromStr for UploadLocation {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InputError::new(format!("Invalid upload location '{s}' (expected s3://bucket/prefix)"));
        let url = Url::parse(s).map_err(|_| invalid())?;
        if url.scheme() != "s3" {
            return Err(invalid());
        }
        let bucket = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        Ok(Self {
            bucket: bucket.to_string(),
            prefix: url.path().trim_matches('/').to_string(),
        })
    }
}

/// Settings passed through to the provider on converge.
///
/// Create-only settings (`on_failure`, `timeout_minutes`) are dropped when
/// the run ends up updating; update-only ones (`stack_policy_during_update`)
/// are dropped on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergeOptions {
    /// Create a change-set instead of updating immediately.
    pub change_set: Option<ChangeSetOptions>,
    /// Stack policy to install.
    pub stack_policy: Option<StackPolicy>,
    /// Temporary policy while an update runs.
    pub stack_policy_during_update: Option<StackPolicy>,
    /// Failure action for creates.
    pub on_failure: Option<OnFailure>,
    /// Creation timeout.
    pub timeout_minutes: Option<u32>,
    /// Notification topics.
    pub notification_arns: Vec<String>,
    /// Service role for the provider.
    pub role_arn: Option<String>,
    /// Upload destination for large templates.
    pub upload_location: Option<UploadLocation>,
    /// Upload even when the body fits inline.
    pub force_upload: bool,
}

impl ConvergeOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a change-set.
    #[must_use]
    pub fn with_change_set(mut self, change_set: ChangeSetOptions) -> Self {
        self.change_set = Some(change_set);
        self
    }

    /// Sets the stack policy.
    #[must_use]
    pub fn with_stack_policy(mut self, policy: StackPolicy) -> Self {
        self.stack_policy = Some(policy);
        self
    }

    /// Sets the temporary update policy.
    #[must_use]
    pub fn with_stack_policy_during_update(mut self, policy: StackPolicy) -> Self {
        self.stack_policy_during_update = Some(policy);
        self
    }

    /// Sets the failure action.
    #[must_use]
    pub fn with_on_failure(mut self, on_failure: OnFailure) -> Self {
        self.on_failure = Some(on_failure);
        self
    }

    /// Sets the creation timeout.
    #[must_use]
    pub fn with_timeout_minutes(mut self, minutes: u32) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }

    /// Adds a notification topic.
    #[must_use]
    pub fn with_notification_arn(mut self, arn: impl Into<String>) -> Self {
        self.notification_arns.push(arn.into());
        self
    }

    /// Sets the service role.
    #[must_use]
    pub fn with_role_arn(mut self, arn: impl Into<String>) -> Self {
        self.role_arn = Some(arn.into());
        self
    }

    /// Sets the upload location.
    #[must_use]
    pub fn with_upload_location(mut self, location: UploadLocation) -> Self {
        self.upload_location = Some(location);
        self
    }

    /// Forces upload regardless of size.
    #[must_use]
    pub fn with_force_upload(mut self, force: bool) -> Self {
        self.force_upload = force;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_location_parse() {
        let loc: UploadLocation = "s3://deploy-bucket/templates/prod/".parse().unwrap();
        assert_eq!(loc.bucket, "deploy-bucket");
        assert_eq!(loc.prefix, "templates/prod");

        let bare: UploadLocation = "s3://deploy-bucket".parse().unwrap();
        assert_eq!(bare.prefix, "");
    }

    #[test]
    fn test_upload_location_rejects_other_schemes() {
        assert!("https://deploy-bucket/x".parse::<UploadLocation>().is_err());
        assert!("deploy-bucket/x".parse::<UploadLocation>().is_err());
    }

    #[test]
    fn test_key_for() {
        let loc: UploadLocation = "s3://b/cfn".parse().unwrap();
        assert_eq!(
            loc.key_for("web", "0123456789abcdef0123456789abcdef"),
            "cfn/web-0123456789abcdef.json"
        );
        let bare: UploadLocation = "s3://b".parse().unwrap();
        assert_eq!(bare.key_for("web", "abc"), "web-abc.json");
    }
}
