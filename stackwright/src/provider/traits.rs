//! Provider and object store traits.

use async_trait::async_trait;

use super::types::{
    ChangeSetHandle, ChangeSetRequest, EventQuery, EventRecord, RemoteStackSnapshot, StackHandle,
    StackMutation, TemplateSource, TemplateSummary, TemplateValidation,
};
use crate::errors::ProviderError;
use crate::parameters::ResolvedParameter;

/// Result type returned by provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Remote operations consumed by the engine.
///
/// Implementations must classify failures into [`ProviderError`]:
/// `AlreadyExists` from `create_stack` drives the update branch, `NotFound`
/// from `describe_stack` means "no previous generation", and `Throttling`
/// is retried by the event tailer.
#[async_trait]
pub trait StackProvider: Send + Sync {
    /// Validates a template and returns its authoritative parameter list.
    async fn validate_template(&self, template: &TemplateSource) -> ProviderResult<TemplateValidation>;

    /// Creates a stack.
    async fn create_stack(&self, mutation: &StackMutation) -> ProviderResult<StackHandle>;

    /// Updates an existing stack.
    async fn update_stack(&self, mutation: &StackMutation) -> ProviderResult<StackHandle>;

    /// Records a proposed update without applying it.
    async fn create_change_set(&self, request: &ChangeSetRequest) -> ProviderResult<ChangeSetHandle>;

    /// Describes a stack's current status, parameters and outputs.
    async fn describe_stack(&self, stack_name: &str) -> ProviderResult<RemoteStackSnapshot>;

    /// Lists a stack's events, newest first, reading as many pages as
    /// `query` needs.
    async fn describe_stack_events(&self, stack_name: &str, query: &EventQuery) -> ProviderResult<Vec<EventRecord>>;

    /// Returns template-level metadata for a deployed stack.
    async fn get_template_summary(&self, stack_name: &str) -> ProviderResult<TemplateSummary>;

    /// Deletes a stack.
    async fn delete_stack(&self, stack_name: &str) -> ProviderResult<()>;

    /// Returns a cost calculator URL for a template.
    async fn estimate_template_cost(
        &self,
        template: &TemplateSource,
        parameters: &[ResolvedParameter],
    ) -> ProviderResult<String>;
}

/// Object storage used for templates too large to submit inline.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores `body` under `bucket/key` and returns a URL the provider can read.
    ///
    /// `content_md5` is the base64 MD5 digest of `body`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_md5: &str,
    ) -> ProviderResult<String>;
}
