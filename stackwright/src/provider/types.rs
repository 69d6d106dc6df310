//! Data exchanged with the provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::document::ParameterDeclaration;
use crate::errors::InputError;
use crate::parameters::ResolvedParameter;

/// How the template reaches the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateSource {
    /// Inline body.
    Body(String),
    /// URL of a previously uploaded body.
    Url(String),
}

/// Provider response to template validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateValidation {
    /// Declared parameters, in template order.
    pub parameters: Vec<ParameterDeclaration>,
    /// Capabilities the template requires (e.g. `CAPABILITY_IAM`).
    pub capabilities: Vec<String>,
    /// Template description.
    pub description: Option<String>,
}

/// A stack policy, either inline or by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StackPolicy {
    /// Policy document body.
    Body(String),
    /// URL of the policy document.
    Url(String),
}

/// What the provider should do when stack creation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnFailure {
    /// Leave the failed resources in place.
    DoNothing,
    /// Roll back the created resources.
    Rollback,
    /// Delete the stack.
    Delete,
}

impl OnFailure {
    /// Returns the provider's wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DoNothing => "DO_NOTHING",
            Self::Rollback => "ROLLBACK",
            Self::Delete => "DELETE",
        }
    }
}

impl FromStr for OnFailure {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "DO_NOTHING" => Ok(Self::DoNothing),
            "ROLLBACK" => Ok(Self::Rollback),
            "DELETE" => Ok(Self::Delete),
            other => Err(InputError::new(format!(
                "Unknown on-failure action '{other}' (expected DO_NOTHING, ROLLBACK or DELETE)"
            ))),
        }
    }
}

/// Everything needed to create or update a stack.
///
/// One value is built per converge and reused verbatim for whichever of
/// create, update or change-set ends up being submitted. Fields that only
/// apply to one of those calls are ignored by the others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackMutation {
    /// Target stack.
    pub stack_name: String,
    /// Template body or URL.
    pub template: TemplateSource,
    /// Resolved parameters.
    pub parameters: Vec<ResolvedParameter>,
    /// Capabilities acknowledged on the caller's behalf.
    pub capabilities: Vec<String>,
    /// Stack policy to install.
    pub stack_policy: Option<StackPolicy>,
    /// Temporary policy for the duration of an update (update only).
    pub stack_policy_during_update: Option<StackPolicy>,
    /// Failure action (create only).
    pub on_failure: Option<OnFailure>,
    /// Creation timeout in minutes (create only).
    pub timeout_minutes: Option<u32>,
    /// Notification topic ARNs.
    pub notification_arns: Vec<String>,
    /// Service role the provider should assume.
    pub role_arn: Option<String>,
    /// Token correlating the events of this request.
    pub client_request_token: Option<String>,
}

impl StackMutation {
    /// Creates a mutation with only the required fields set.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, template: TemplateSource) -> Self {
        Self {
            stack_name: stack_name.into(),
            template,
            parameters: Vec::new(),
            capabilities: Vec::new(),
            stack_policy: None,
            stack_policy_during_update: None,
            on_failure: None,
            timeout_minutes: None,
            notification_arns: Vec::new(),
            role_arn: None,
            client_request_token: None,
        }
    }
}

/// A named change-set request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetRequest {
    /// The proposed update.
    pub mutation: StackMutation,
    /// Change-set name.
    pub name: String,
    /// Optional description shown to reviewers.
    pub description: Option<String>,
}

/// Identifier returned by create/update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackHandle {
    /// Provider-assigned stack id.
    pub stack_id: String,
}

/// Identifier returned by change-set creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetHandle {
    /// Provider-assigned change-set id.
    pub id: String,
    /// Stack the change-set belongs to.
    pub stack_id: Option<String>,
}

/// Snapshot of a remote stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteStackSnapshot {
    /// Stack name.
    pub stack_name: String,
    /// Provider-assigned id.
    pub stack_id: Option<String>,
    /// Current status, e.g. `UPDATE_COMPLETE`.
    pub status: String,
    /// Current parameter values.
    pub parameters: BTreeMap<String, String>,
    /// Current outputs.
    pub outputs: BTreeMap<String, String>,
    /// Template metadata.
    pub metadata: Map<String, Value>,
}

impl RemoteStackSnapshot {
    /// Creates an empty snapshot with a status.
    #[must_use]
    pub fn new(stack_name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            status: status.into(),
            ..Self::default()
        }
    }

    /// Adds a parameter value.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Adds an output value.
    #[must_use]
    pub fn with_output(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.outputs.insert(key.into(), value.into());
        self
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Provider-assigned id. Only compared for equality.
    pub id: String,
    /// Event time.
    pub timestamp: DateTime<Utc>,
    /// Resource type, e.g. `AWS::S3::Bucket`.
    pub resource_type: String,
    /// Logical resource id.
    pub logical_id: String,
    /// Resource status.
    pub status: String,
    /// Status reason, if any.
    pub status_reason: Option<String>,
}

/// How far back an event listing must reach.
///
/// Providers page newest first and stop once the query is satisfied, so a
/// listing always reaches either `after` or `limit` events when the stack
/// has that much history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    /// Read until this event id has been listed.
    pub after: Option<String>,
    /// Read until at least this many events have been listed.
    pub limit: Option<usize>,
}

impl EventQuery {
    /// The newest `count` events. At least one is always requested so the
    /// caller learns the newest id.
    #[must_use]
    pub fn newest(count: usize) -> Self {
        Self {
            after: None,
            limit: Some(count.max(1)),
        }
    }

    /// Every event newer than `mark`; all history when `mark` is `None`.
    #[must_use]
    pub fn since(mark: Option<&str>) -> Self {
        Self {
            after: mark.map(str::to_string),
            limit: None,
        }
    }

    /// Returns true once `listed` (newest first) reaches far enough back.
    #[must_use]
    pub fn is_satisfied_by(&self, listed: &[EventRecord]) -> bool {
        if let Some(mark) = self.after.as_deref() {
            if listed.iter().any(|event| event.id == mark) {
                return true;
            }
        }
        self.limit.is_some_and(|limit| listed.len() >= limit)
    }
}

/// One page of an event listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventPage {
    /// Events on this page, newest first.
    pub events: Vec<EventRecord>,
    /// Token for the next (older) page.
    pub next_token: Option<String>,
}

/// Template metadata for a deployed stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateSummary {
    /// The template's `Metadata` section.
    pub metadata: Map<String, Value>,
    /// Declared parameters.
    pub parameters: Vec<ParameterDeclaration>,
    /// Required capabilities.
    pub capabilities: Vec<String>,
}
