//! Create-or-update orchestration.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::options::{ConvergeOptions, UploadLocation};
use super::upload::TemplateUploader;
use crate::config::EngineConfig;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::document::StackDocument;
use crate::errors::{InputError, ProviderError, Result, StackwrightError};
use crate::parameters::{ParameterResolver, ResolvedParameter};
use crate::provider::{
    ChangeSetHandle, ChangeSetRequest, ObjectStore, RemoteStackSnapshot, StackHandle,
    StackMutation, StackProvider, TemplateSource, TemplateValidation,
};
use crate::state::RemoteStateCache;

/// What a converge run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvergeOutcome {
    /// The stack did not exist and was created.
    Created(StackHandle),
    /// The stack existed and an update was submitted.
    Updated(StackHandle),
    /// The stack existed and a change-set was recorded.
    ChangeSetCreated(ChangeSetHandle),
}

impl ConvergeOutcome {
    /// Returns true if the provider is now changing the stack.
    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, Self::ChangeSetCreated(_))
    }

    /// Past-tense description, e.g. `"created"`.
    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::ChangeSetCreated(_) => "change-set created",
        }
    }
}

/// A deployed stack together with its template metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackDescription {
    /// Current state.
    #[serde(flatten)]
    pub snapshot: RemoteStackSnapshot,
    /// The template's `Metadata` section.
    pub template_metadata: Map<String, Value>,
}

/// Reconciles named stacks with rendered documents.
pub struct Orchestrator {
    provider: Arc<dyn StackProvider>,
    uploader: Option<TemplateUploader>,
    cache: Arc<RemoteStateCache>,
    resolver: ParameterResolver,
    sink: Arc<dyn DiagnosticSink>,
    config: EngineConfig,
}

impl Orchestrator {
    /// Creates an orchestrator. Template uploads are unavailable until an
    /// object store is attached.
    #[must_use]
    pub fn new(
        provider: Arc<dyn StackProvider>,
        cache: Arc<RemoteStateCache>,
        sink: Arc<dyn DiagnosticSink>,
        config: EngineConfig,
    ) -> Self {
        let resolver = ParameterResolver::new(cache.clone(), sink.clone());
        Self {
            provider,
            uploader: None,
            cache,
            resolver,
            sink,
            config,
        }
    }

    /// Attaches the store used for oversized templates.
    #[must_use]
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.uploader = Some(TemplateUploader::new(store, self.sink.clone()));
        self
    }

    /// The snapshot cache shared with the resolver.
    #[must_use]
    pub fn cache(&self) -> &Arc<RemoteStateCache> {
        &self.cache
    }

    /// Creates `stack` from `document`, or updates it if it already exists.
    ///
    /// The provider's validation response decides which parameters exist.
    /// A rejected template fails before any mutation. When the create call
    /// reports that the stack exists, the same resolved parameters are sent
    /// as an update, or as a change-set if one was requested.
    pub async fn converge(
        &self,
        stack: &str,
        document: &StackDocument,
        inputs: &BTreeMap<String, String>,
        options: &ConvergeOptions,
    ) -> Result<ConvergeOutcome> {
        document.validate_structure()?;

        let template = self.template_source(stack, document, options).await?;
        let validation = self.validate(stack, &template).await?;

        let previous = self.cache.find_snapshot(stack).await?;
        let parameters = self
            .resolver
            .resolve(stack, &validation.parameters, inputs, previous.as_deref())
            .await?;

        let mutation = Self::mutation(stack, template, parameters, &validation, options);
        let outcome = match self.provider.create_stack(&mutation.for_create()).await {
            Ok(handle) => ConvergeOutcome::Created(handle),
            Err(ProviderError::AlreadyExists) => {
                self.sink.emit(
                    DiagnosticEvent::debug("converge.exists", "Stack exists; switching to update").with_stack(stack),
                );
                self.update(mutation.for_update(), options).await?
            }
            Err(err) => return Err(StackwrightError::from_provider(stack, err)),
        };

        self.cache.invalidate(stack);
        self.sink.emit(
            DiagnosticEvent::info("converge.submitted", format!("Stack {stack} {}", outcome.verb()))
                .with_stack(stack),
        );
        Ok(outcome)
    }

    /// Describes a deployed stack. A missing stack is an error.
    pub async fn describe(&self, stack: &str) -> Result<StackDescription> {
        let snapshot = self.cache.fetch_snapshot(stack).await?;
        let summary = self
            .provider
            .get_template_summary(stack)
            .await
            .map_err(|e| StackwrightError::from_provider(stack, e))?;

        Ok(StackDescription {
            snapshot: (*snapshot).clone(),
            template_metadata: summary.metadata,
        })
    }

    /// Deletes `stack`.
    pub async fn delete(&self, stack: &str) -> Result<()> {
        self.provider
            .delete_stack(stack)
            .await
            .map_err(|e| StackwrightError::from_provider(stack, e))?;
        self.cache.invalidate(stack);
        self.sink.emit(
            DiagnosticEvent::info("converge.delete", format!("Deletion of stack {stack} requested"))
                .with_stack(stack),
        );
        Ok(())
    }

    /// Returns a cost calculator URL for `document` with `inputs`.
    ///
    /// Parameters are resolved as for a first-time create. Oversized
    /// templates are uploaded to `upload_location` under the `estimate` name.
    pub async fn estimate(
        &self,
        document: &StackDocument,
        inputs: &BTreeMap<String, String>,
        upload_location: Option<UploadLocation>,
    ) -> Result<String> {
        const LABEL: &str = "estimate";
        document.validate_structure()?;

        let options = ConvergeOptions {
            upload_location,
            ..ConvergeOptions::default()
        };
        let template = self.template_source(LABEL, document, &options).await?;
        let validation = self.validate(LABEL, &template).await?;
        let parameters = self
            .resolver
            .resolve(LABEL, &validation.parameters, inputs, None)
            .await?;

        self.provider
            .estimate_template_cost(&template, &parameters)
            .await
            .map_err(|e| StackwrightError::from_provider(LABEL, e))
    }

    async fn template_source(
        &self,
        stack: &str,
        document: &StackDocument,
        options: &ConvergeOptions,
    ) -> Result<TemplateSource> {
        let oversized = document.size() > self.config.inline_template_limit;
        if !oversized && !options.force_upload {
            return Ok(TemplateSource::Body(document.body().to_string()));
        }

        let Some(location) = options.upload_location.as_ref() else {
            if options.force_upload {
                return Err(InputError::new(format!(
                    "Upload of the template for stack '{stack}' was forced but no upload location is set"
                ))
                .into());
            }
            return Err(InputError::new(format!(
                "Template for stack '{stack}' is {} bytes (inline limit {}); an upload location is required",
                document.size(),
                self.config.inline_template_limit
            ))
            .into());
        };
        let Some(uploader) = self.uploader.as_ref() else {
            return Err(InputError::new("No object store is configured for template uploads").into());
        };
        uploader.upload(stack, document, location).await
    }

    async fn validate(&self, stack: &str, template: &TemplateSource) -> Result<TemplateValidation> {
        let validation = self
            .provider
            .validate_template(template)
            .await
            .map_err(|e| StackwrightError::from_provider(stack, e))?;
        if !validation.capabilities.is_empty() {
            self.sink.emit(
                DiagnosticEvent::debug(
                    "converge.capabilities",
                    format!("Template requires {}", validation.capabilities.join(", ")),
                )
                .with_stack(stack),
            );
        }
        Ok(validation)
    }

    fn mutation(
        stack: &str,
        template: TemplateSource,
        parameters: Vec<ResolvedParameter>,
        validation: &TemplateValidation,
        options: &ConvergeOptions,
    ) -> StackMutation {
        StackMutation {
            parameters,
            capabilities: validation.capabilities.clone(),
            stack_policy: options.stack_policy.clone(),
            stack_policy_during_update: options.stack_policy_during_update.clone(),
            on_failure: options.on_failure,
            timeout_minutes: options.timeout_minutes,
            notification_arns: options.notification_arns.clone(),
            role_arn: options.role_arn.clone(),
            ..StackMutation::new(stack, template)
        }
    }

    async fn update(&self, mutation: StackMutation, options: &ConvergeOptions) -> Result<ConvergeOutcome> {
        let stack = mutation.stack_name.clone();
        match &options.change_set {
            Some(change_set) => {
                let request = ChangeSetRequest {
                    mutation,
                    name: change_set.name.clone(),
                    description: change_set.description.clone(),
                };
                self.provider
                    .create_change_set(&request)
                    .await
                    .map(ConvergeOutcome::ChangeSetCreated)
                    .map_err(|e| StackwrightError::from_provider(&stack, e))
            }
            None => self
                .provider
                .update_stack(&mutation)
                .await
                .map(ConvergeOutcome::Updated)
                .map_err(|e| StackwrightError::from_provider(&stack, e)),
        }
    }
}

impl StackMutation {
    /// The mutation as sent to `create_stack`, with a fresh request token.
    #[must_use]
    pub fn for_create(&self) -> Self {
        Self {
            stack_policy_during_update: None,
            client_request_token: Some(Uuid::new_v4().to_string()),
            ..self.clone()
        }
    }

    /// The mutation as sent to `update_stack` or `create_change_set`, with a
    /// fresh request token.
    #[must_use]
    pub fn for_update(&self) -> Self {
        Self {
            on_failure: None,
            timeout_minutes: None,
            client_request_token: Some(Uuid::new_v4().to_string()),
            ..self.clone()
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache", &self.cache)
            .field("uploads", &self.uploader.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{OnFailure, StackPolicy};

    #[test]
    fn test_create_drops_update_only_fields() {
        let mut mutation = StackMutation::new("web", TemplateSource::Body("{}".into()));
        mutation.stack_policy_during_update = Some(StackPolicy::Body("{}".into()));
        mutation.on_failure = Some(OnFailure::Delete);

        let create = mutation.for_create();
        assert!(create.stack_policy_during_update.is_none());
        assert_eq!(create.on_failure, Some(OnFailure::Delete));
        assert!(create.client_request_token.is_some());
    }

    #[test]
    fn test_update_drops_create_only_fields() {
        let mut mutation = StackMutation::new("web", TemplateSource::Body("{}".into()));
        mutation.on_failure = Some(OnFailure::Rollback);
        mutation.timeout_minutes = Some(30);
        mutation.stack_policy_during_update = Some(StackPolicy::Url("https://x".into()));

        let update = mutation.for_update();
        assert!(update.on_failure.is_none());
        assert!(update.timeout_minutes.is_none());
        assert!(update.stack_policy_during_update.is_some());
        assert_ne!(update.client_request_token, mutation.for_create().client_request_token);
    }

    #[test]
    fn test_outcome_verbs() {
        let handle = StackHandle { stack_id: "id".into() };
        assert_eq!(ConvergeOutcome::Created(handle.clone()).verb(), "created");
        assert!(ConvergeOutcome::Updated(handle).is_in_progress());
        let cs = ConvergeOutcome::ChangeSetCreated(ChangeSetHandle {
            id: "cs".into(),
            stack_id: None,
        });
        assert!(!cs.is_in_progress());
    }
}
