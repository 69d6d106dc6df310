//! AWS-backed provider, object store and role assumer.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetType, OnFailure as CfnOnFailure, Parameter, StackEvent, TemplateParameter,
};
use aws_sdk_cloudformation::Client as CfnClient;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::time::SystemTime;
use tracing::debug;

use super::paging::collect_event_pages;
use super::traits::{ObjectStore, ProviderResult, StackProvider};
use super::types::{
    ChangeSetHandle, ChangeSetRequest, EventPage, EventQuery, EventRecord, RemoteStackSnapshot, StackHandle,
    StackMutation, StackPolicy, TemplateSource, TemplateSummary, TemplateValidation,
};
use crate::credentials::{AssumeRoleRequest, CredentialSession, RoleAssumer};
use crate::document::ParameterDeclaration;
use crate::errors::{CredentialError, ProviderError, Result};
use crate::parameters::{ParameterValue, ResolvedParameter};

const CREDENTIALS_SOURCE: &str = "stackwright";
const STS_FALLBACK_REGION: &str = "us-east-1";

/// Normalizes SDK getters that return either `&T` or `Option<&T>`.
trait Field<'a> {
    type Target: ?Sized;
    fn field(self) -> Option<&'a Self::Target>;
}

impl<'a, T: ?Sized> Field<'a> for &'a T {
    type Target = T;
    fn field(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T: ?Sized> Field<'a> for Option<&'a T> {
    type Target = T;
    fn field(self) -> Option<&'a T> {
        self
    }
}

fn text<'a>(value: impl Field<'a, Target = str>) -> String {
    value.field().unwrap_or_default().to_string()
}

/// Maps a provider error code and message onto [`ProviderError`].
#[must_use]
pub fn classify_error(code: Option<&str>, message: Option<&str>) -> ProviderError {
    let message = message.unwrap_or_default().to_string();
    match code {
        Some("AlreadyExistsException") => ProviderError::AlreadyExists,
        Some("Throttling" | "ThrottlingException" | "RequestLimitExceeded") => {
            ProviderError::Throttling { message }
        }
        Some("ValidationError") if message.contains("does not exist") && message.starts_with("Stack") => {
            ProviderError::NotFound
        }
        Some("ValidationError") => ProviderError::Validation { message },
        Some(code) => ProviderError::other(code, message),
        None => ProviderError::other("Unknown", message),
    }
}

fn classify<E, R>(err: &SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => classify_error(Some(code), err.message()),
        None => ProviderError::other("Dispatch", DisplayErrorContext(err).to_string()),
    }
}

/// Builds SDK configuration that signs with `session`.
pub async fn sdk_config(session: &CredentialSession, region: Option<&str>) -> SdkConfig {
    let credentials = Credentials::new(
        &session.access_key_id,
        &session.secret_access_key,
        session.session_token.clone(),
        session.expires_at.map(SystemTime::from),
        CREDENTIALS_SOURCE,
    );
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).credentials_provider(credentials);
    if let Some(region) = region {
        loader = loader.region(Region::new(region.to_string()));
    }
    loader.load().await
}

fn parameters(resolved: &[ResolvedParameter]) -> Vec<Parameter> {
    resolved
        .iter()
        .map(|p| match &p.value {
            ParameterValue::Explicit(value) => Parameter::builder()
                .parameter_key(&p.key)
                .parameter_value(value)
                .use_previous_value(false)
                .build(),
            ParameterValue::UsePrevious => Parameter::builder()
                .parameter_key(&p.key)
                .use_previous_value(true)
                .build(),
        })
        .collect()
}

fn capabilities(names: &[String]) -> Vec<Capability> {
    names.iter().map(|c| Capability::from(c.as_str())).collect()
}

fn timestamp(value: &aws_sdk_cloudformation::primitives::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos()).unwrap_or_default()
}

fn declaration(param: &TemplateParameter) -> ParameterDeclaration {
    let mut decl = ParameterDeclaration::new(text(param.parameter_key()));
    decl.default = param.default_value().field().map(str::to_string);
    decl.sensitive = param.no_echo().unwrap_or(false);
    decl.description = param.description().field().map(str::to_string);
    decl
}

fn event_record(event: &StackEvent) -> EventRecord {
    EventRecord {
        id: text(event.event_id()),
        timestamp: event.timestamp().field().map(timestamp).unwrap_or_default(),
        resource_type: text(event.resource_type()),
        logical_id: text(event.logical_resource_id()),
        status: event
            .resource_status()
            .field()
            .map(|s| s.as_str().to_string())
            .unwrap_or_default(),
        status_reason: event.resource_status_reason().field().map(str::to_string),
    }
}

/// [`StackProvider`] backed by CloudFormation.
#[derive(Debug, Clone)]
pub struct CloudFormationProvider {
    client: CfnClient,
}

impl CloudFormationProvider {
    /// Creates a provider from SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: CfnClient::new(config),
        }
    }
}

#[async_trait]
impl StackProvider for CloudFormationProvider {
    async fn validate_template(&self, template: &TemplateSource) -> ProviderResult<TemplateValidation> {
        let request = match template {
            TemplateSource::Body(body) => self.client.validate_template().template_body(body),
            TemplateSource::Url(url) => self.client.validate_template().template_url(url),
        };
        let output = request.send().await.map_err(|e| classify(&e))?;

        Ok(TemplateValidation {
            parameters: output.parameters().iter().map(declaration).collect(),
            capabilities: output.capabilities().iter().map(|c| c.as_str().to_string()).collect(),
            description: output.description().map(str::to_string),
        })
    }

    async fn create_stack(&self, mutation: &StackMutation) -> ProviderResult<StackHandle> {
        debug!(stack = %mutation.stack_name, "CreateStack");
        let mut request = self
            .client
            .create_stack()
            .stack_name(&mutation.stack_name)
            .set_parameters(Some(parameters(&mutation.parameters)))
            .set_capabilities(Some(capabilities(&mutation.capabilities)))
            .set_notification_arns(Some(mutation.notification_arns.clone()))
            .set_role_arn(mutation.role_arn.clone())
            .set_client_request_token(mutation.client_request_token.clone())
            .set_on_failure(mutation.on_failure.map(|f| CfnOnFailure::from(f.as_str())))
            .set_timeout_in_minutes(mutation.timeout_minutes.and_then(|m| i32::try_from(m).ok()));
        request = match &mutation.template {
            TemplateSource::Body(body) => request.template_body(body),
            TemplateSource::Url(url) => request.template_url(url),
        };
        request = match &mutation.stack_policy {
            Some(StackPolicy::Body(body)) => request.stack_policy_body(body),
            Some(StackPolicy::Url(url)) => request.stack_policy_url(url),
            None => request,
        };

        let output = request.send().await.map_err(|e| classify(&e))?;
        Ok(StackHandle {
            stack_id: output.stack_id().unwrap_or(mutation.stack_name.as_str()).to_string(),
        })
    }

    async fn update_stack(&self, mutation: &StackMutation) -> ProviderResult<StackHandle> {
        debug!(stack = %mutation.stack_name, "UpdateStack");
        let mut request = self
            .client
            .update_stack()
            .stack_name(&mutation.stack_name)
            .set_parameters(Some(parameters(&mutation.parameters)))
            .set_capabilities(Some(capabilities(&mutation.capabilities)))
            .set_notification_arns(Some(mutation.notification_arns.clone()))
            .set_role_arn(mutation.role_arn.clone())
            .set_client_request_token(mutation.client_request_token.clone());
        request = match &mutation.template {
            TemplateSource::Body(body) => request.template_body(body),
            TemplateSource::Url(url) => request.template_url(url),
        };
        request = match &mutation.stack_policy {
            Some(StackPolicy::Body(body)) => request.stack_policy_body(body),
            Some(StackPolicy::Url(url)) => request.stack_policy_url(url),
            None => request,
        };
        request = match &mutation.stack_policy_during_update {
            Some(StackPolicy::Body(body)) => request.stack_policy_during_update_body(body),
            Some(StackPolicy::Url(url)) => request.stack_policy_during_update_url(url),
            None => request,
        };

        let output = request.send().await.map_err(|e| classify(&e))?;
        Ok(StackHandle {
            stack_id: output.stack_id().unwrap_or(mutation.stack_name.as_str()).to_string(),
        })
    }

    async fn create_change_set(&self, change_set: &ChangeSetRequest) -> ProviderResult<ChangeSetHandle> {
        let mutation = &change_set.mutation;
        debug!(stack = %mutation.stack_name, change_set = %change_set.name, "CreateChangeSet");
        let mut request = self
            .client
            .create_change_set()
            .stack_name(&mutation.stack_name)
            .change_set_name(&change_set.name)
            .set_description(change_set.description.clone())
            .change_set_type(ChangeSetType::Update)
            .set_parameters(Some(parameters(&mutation.parameters)))
            .set_capabilities(Some(capabilities(&mutation.capabilities)))
            .set_notification_arns(Some(mutation.notification_arns.clone()))
            .set_role_arn(mutation.role_arn.clone())
            .set_client_token(mutation.client_request_token.clone());
        request = match &mutation.template {
            TemplateSource::Body(body) => request.template_body(body),
            TemplateSource::Url(url) => request.template_url(url),
        };

        let output = request.send().await.map_err(|e| classify(&e))?;
        Ok(ChangeSetHandle {
            id: output.id().unwrap_or(change_set.name.as_str()).to_string(),
            stack_id: output.stack_id().map(str::to_string),
        })
    }

    async fn describe_stack(&self, stack_name: &str) -> ProviderResult<RemoteStackSnapshot> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| classify(&e))?;
        let stack = output.stacks().first().ok_or(ProviderError::NotFound)?;

        Ok(RemoteStackSnapshot {
            stack_name: text(stack.stack_name()),
            stack_id: stack.stack_id().field().map(str::to_string),
            status: stack
                .stack_status()
                .field()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            parameters: stack
                .parameters()
                .iter()
                .filter_map(|p| Some((p.parameter_key()?.to_string(), p.parameter_value()?.to_string())))
                .collect(),
            outputs: stack
                .outputs()
                .iter()
                .filter_map(|o| Some((o.output_key()?.to_string(), o.output_value()?.to_string())))
                .collect(),
            metadata: Map::new(),
        })
    }

    async fn describe_stack_events(&self, stack_name: &str, query: &EventQuery) -> ProviderResult<Vec<EventRecord>> {
        collect_event_pages(query, |token| async move {
            let output = self
                .client
                .describe_stack_events()
                .stack_name(stack_name)
                .set_next_token(token)
                .send()
                .await
                .map_err(|e| classify(&e))?;
            debug!(stack = %stack_name, events = output.stack_events().len(), "Read event page");
            Ok(EventPage {
                events: output.stack_events().iter().map(event_record).collect(),
                next_token: output.next_token().map(str::to_string),
            })
        })
        .await
    }

    async fn get_template_summary(&self, stack_name: &str) -> ProviderResult<TemplateSummary> {
        let output = self
            .client
            .get_template_summary()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| classify(&e))?;

        let metadata = match output.metadata() {
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(map)) => map,
                _ => Map::new(),
            },
            None => Map::new(),
        };
        Ok(TemplateSummary {
            metadata,
            parameters: output
                .parameters()
                .iter()
                .map(|p| {
                    let mut decl = ParameterDeclaration::new(text(p.parameter_key()));
                    decl.default = p.default_value().map(str::to_string);
                    decl.sensitive = p.no_echo().unwrap_or(false);
                    if let Some(param_type) = p.parameter_type() {
                        decl.param_type = param_type.to_string();
                    }
                    decl
                })
                .collect(),
            capabilities: output.capabilities().iter().map(|c| c.as_str().to_string()).collect(),
        })
    }

    async fn delete_stack(&self, stack_name: &str) -> ProviderResult<()> {
        debug!(stack = %stack_name, "DeleteStack");
        self.client
            .delete_stack()
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| classify(&e))?;
        Ok(())
    }

    async fn estimate_template_cost(
        &self,
        template: &TemplateSource,
        resolved: &[ResolvedParameter],
    ) -> ProviderResult<String> {
        let request = self
            .client
            .estimate_template_cost()
            .set_parameters(Some(parameters(resolved)));
        let request = match template {
            TemplateSource::Body(body) => request.template_body(body),
            TemplateSource::Url(url) => request.template_url(url),
        };
        let output = request.send().await.map_err(|e| classify(&e))?;
        output
            .url()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::other("EmptyResponse", "no calculator URL returned"))
    }
}

/// [`ObjectStore`] backed by S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
    region: Option<String>,
}

impl S3ObjectStore {
    /// Creates a store from SDK configuration.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
            region: config.region().map(ToString::to_string),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_md5: &str,
    ) -> ProviderResult<String> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type("application/json")
            .content_md5(content_md5)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify(&e))?;

        Ok(match &self.region {
            Some(region) => format!("https://{bucket}.s3.{region}.amazonaws.com/{key}"),
            None => format!("https://{bucket}.s3.amazonaws.com/{key}"),
        })
    }
}

/// [`RoleAssumer`] backed by STS.
#[derive(Debug, Clone, Default)]
pub struct StsRoleAssumer {
    region: Option<String>,
}

impl StsRoleAssumer {
    /// Creates an assumer that calls STS in `region`.
    #[must_use]
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }
}

#[async_trait]
impl RoleAssumer for StsRoleAssumer {
    async fn assume_role(
        &self,
        base: &CredentialSession,
        request: &AssumeRoleRequest,
    ) -> Result<CredentialSession> {
        let region = self.region.clone().unwrap_or_else(|| STS_FALLBACK_REGION.to_string());
        let config = aws_sdk_sts::Config::builder()
            .behavior_version(aws_sdk_sts::config::BehaviorVersion::latest())
            .region(aws_sdk_sts::config::Region::new(region))
            .credentials_provider(Credentials::new(
                &base.access_key_id,
                &base.secret_access_key,
                base.session_token.clone(),
                None,
                CREDENTIALS_SOURCE,
            ))
            .build();
        let client = aws_sdk_sts::Client::from_conf(config);

        let output = client
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&request.session_name)
            .set_serial_number(request.mfa_serial.clone())
            .set_token_code(request.token_code.clone())
            .send()
            .await
            .map_err(|e| CredentialError::new(&request.role_arn, classify(&e).to_string()))?;

        let credentials = output
            .credentials()
            .ok_or_else(|| CredentialError::new(&request.role_arn, "AssumeRole returned no credentials"))?;
        Ok(CredentialSession {
            access_key_id: text(credentials.access_key_id()),
            secret_access_key: text(credentials.secret_access_key()),
            session_token: credentials.session_token().field().map(str::to_string),
            expires_at: credentials
                .expiration()
                .field()
                .map(|e| DateTime::from_timestamp(e.secs(), e.subsec_nanos()).unwrap_or_default()),
        })
    }
}
