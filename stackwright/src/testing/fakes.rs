//! Scripted in-memory provider and object store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::Duration;

use crate::document::StackDocument;
use crate::errors::ProviderError;
use crate::parameters::{ParameterValue, ResolvedParameter};
use crate::provider::{
    collect_event_pages, paginate, ChangeSetHandle, ChangeSetRequest, EventQuery, EventRecord, ObjectStore, ProviderResult,
    RemoteStackSnapshot, StackHandle, StackMutation, StackProvider, TemplateSource,
    TemplateSummary, TemplateValidation,
};

/// One recorded provider call.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    /// `validate_template`.
    ValidateTemplate(TemplateSource),
    /// `create_stack`.
    CreateStack(StackMutation),
    /// `update_stack`.
    UpdateStack(StackMutation),
    /// `create_change_set`.
    CreateChangeSet(ChangeSetRequest),
    /// `describe_stack`.
    DescribeStack(String),
    /// `describe_stack_events`.
    DescribeStackEvents(String),
    /// `get_template_summary`.
    GetTemplateSummary(String),
    /// `delete_stack`.
    DeleteStack(String),
    /// `estimate_template_cost`.
    EstimateTemplateCost(TemplateSource),
}

impl ProviderCall {
    /// Returns true for calls that change remote state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::CreateStack(_) | Self::UpdateStack(_) | Self::CreateChangeSet(_) | Self::DeleteStack(_)
        )
    }
}

#[derive(Default)]
struct EventScript {
    pages: VecDeque<ProviderResult<Vec<EventRecord>>>,
    last: Vec<EventRecord>,
}

/// An in-memory [`StackProvider`].
///
/// Stacks live in a map. `create_stack` fails with `AlreadyExists` for a
/// known name, `update_stack` with `NotFound` for an unknown one. Status and
/// event responses can be scripted per stack; scripted entries are consumed
/// one per call and the last event page repeats once the script runs out.
/// With an event page size set, each listing is served in pages of that
/// size and read the way the cloud provider's paginated listing is.
#[derive(Default)]
pub struct FakeProvider {
    stacks: Mutex<BTreeMap<String, RemoteStackSnapshot>>,
    statuses: Mutex<HashMap<String, VecDeque<ProviderResult<String>>>>,
    events: Mutex<HashMap<String, EventScript>>,
    failures: Mutex<HashMap<&'static str, VecDeque<ProviderError>>>,
    validation: Mutex<Option<TemplateValidation>>,
    calls: Mutex<Vec<ProviderCall>>,
    describe_delay: Option<Duration>,
    event_page_size: Option<usize>,
    event_page_reads: Mutex<usize>,
    next_id: Mutex<u64>,
}

impl FakeProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every `describe_stack` call.
    #[must_use]
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    /// Serves event listings in pages of `size`.
    #[must_use]
    pub fn with_event_page_size(mut self, size: usize) -> Self {
        self.event_page_size = Some(size.max(1));
        self
    }

    /// Number of event pages read so far.
    #[must_use]
    pub fn event_page_reads(&self) -> usize {
        *self.event_page_reads.lock()
    }

    /// Overrides the `validate_template` response.
    ///
    /// Without an override, inline bodies are parsed and their `Parameters`
    /// section is returned.
    #[must_use]
    pub fn with_validation(self, validation: TemplateValidation) -> Self {
        *self.validation.lock() = Some(validation);
        self
    }

    /// Adds or replaces a stack.
    pub fn put_stack(&self, snapshot: RemoteStackSnapshot) {
        self.stacks.lock().insert(snapshot.stack_name.clone(), snapshot);
    }

    /// Returns the current state of a stack.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<RemoteStackSnapshot> {
        self.stacks.lock().get(name).cloned()
    }

    /// Queues statuses for successive `describe_stack` calls.
    pub fn script_statuses<I, S>(&self, stack: &str, statuses: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.statuses
            .lock()
            .entry(stack.to_string())
            .or_default()
            .extend(statuses.into_iter().map(|s| Ok(s.into())));
    }

    /// Queues an error for the next unscripted `describe_stack` slot.
    pub fn script_status_error(&self, stack: &str, error: ProviderError) {
        self.statuses
            .lock()
            .entry(stack.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Queues an event page (newest first) for `describe_stack_events`.
    pub fn push_event_page(&self, stack: &str, page: Vec<EventRecord>) {
        self.events
            .lock()
            .entry(stack.to_string())
            .or_default()
            .pages
            .push_back(Ok(page));
    }

    /// Queues an error for `describe_stack_events`.
    pub fn push_event_error(&self, stack: &str, error: ProviderError) {
        self.events
            .lock()
            .entry(stack.to_string())
            .or_default()
            .pages
            .push_back(Err(error));
    }

    /// Makes the next call to `operation` fail with `error`.
    ///
    /// `operation` is the trait method name, e.g. `"create_stack"`.
    pub fn fail_next(&self, operation: &'static str, error: ProviderError) {
        self.failures
            .lock()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Every call made so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    /// Number of `describe_stack` calls for `stack`.
    #[must_use]
    pub fn describe_calls(&self, stack: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ProviderCall::DescribeStack(name) if name == stack))
            .count()
    }

    /// Mutations submitted through `create_stack`.
    #[must_use]
    pub fn created(&self) -> Vec<StackMutation> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ProviderCall::CreateStack(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Mutations submitted through `update_stack`.
    #[must_use]
    pub fn updated(&self) -> Vec<StackMutation> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ProviderCall::UpdateStack(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    /// Requests submitted through `create_change_set`.
    #[must_use]
    pub fn change_sets(&self) -> Vec<ChangeSetRequest> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                ProviderCall::CreateChangeSet(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().push(call);
    }

    fn injected(&self, operation: &'static str) -> ProviderResult<()> {
        match self.failures.lock().get_mut(operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_stack_id(&self, stack: &str) -> String {
        let mut next = self.next_id.lock();
        *next += 1;
        format!("arn:aws:cloudformation:us-east-1:123456789012:stack/{stack}/fake-{next}")
    }

    fn apply_parameters(
        previous: &BTreeMap<String, String>,
        parameters: &[ResolvedParameter],
    ) -> BTreeMap<String, String> {
        parameters
            .iter()
            .filter_map(|p| match &p.value {
                ParameterValue::Explicit(v) => Some((p.key.clone(), v.clone())),
                ParameterValue::UsePrevious => previous.get(&p.key).map(|v| (p.key.clone(), v.clone())),
            })
            .collect()
    }
}

impl std::fmt::Debug for FakeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeProvider")
            .field("stacks", &self.stacks.lock().keys().collect::<Vec<_>>())
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StackProvider for FakeProvider {
    async fn validate_template(&self, template: &TemplateSource) -> ProviderResult<TemplateValidation> {
        self.record(ProviderCall::ValidateTemplate(template.clone()));
        self.injected("validate_template")?;

        if let Some(validation) = self.validation.lock().clone() {
            return Ok(validation);
        }
        match template {
            TemplateSource::Body(body) => {
                let document = StackDocument::from_json_str(body).map_err(|e| ProviderError::Validation {
                    message: format!("Template format error: {e}"),
                })?;
                Ok(TemplateValidation {
                    parameters: document.declared_parameters(),
                    capabilities: Vec::new(),
                    description: document
                        .root()
                        .get("Description")
                        .and_then(|d| d.as_str())
                        .map(str::to_string),
                })
            }
            TemplateSource::Url(_) => Ok(TemplateValidation::default()),
        }
    }

    async fn create_stack(&self, mutation: &StackMutation) -> ProviderResult<StackHandle> {
        self.record(ProviderCall::CreateStack(mutation.clone()));
        self.injected("create_stack")?;

        let mut stacks = self.stacks.lock();
        if stacks.contains_key(&mutation.stack_name) {
            return Err(ProviderError::AlreadyExists);
        }
        let stack_id = self.next_stack_id(&mutation.stack_name);
        let mut snapshot = RemoteStackSnapshot::new(&mutation.stack_name, "CREATE_COMPLETE");
        snapshot.stack_id = Some(stack_id.clone());
        snapshot.parameters = Self::apply_parameters(&BTreeMap::new(), &mutation.parameters);
        stacks.insert(mutation.stack_name.clone(), snapshot);
        Ok(StackHandle { stack_id })
    }

    async fn update_stack(&self, mutation: &StackMutation) -> ProviderResult<StackHandle> {
        self.record(ProviderCall::UpdateStack(mutation.clone()));
        self.injected("update_stack")?;

        let mut stacks = self.stacks.lock();
        let snapshot = stacks.get_mut(&mutation.stack_name).ok_or(ProviderError::NotFound)?;
        snapshot.parameters = Self::apply_parameters(&snapshot.parameters, &mutation.parameters);
        snapshot.status = "UPDATE_COMPLETE".to_string();
        let stack_id = snapshot
            .stack_id
            .clone()
            .unwrap_or_else(|| mutation.stack_name.clone());
        Ok(StackHandle { stack_id })
    }

    async fn create_change_set(&self, request: &ChangeSetRequest) -> ProviderResult<ChangeSetHandle> {
        self.record(ProviderCall::CreateChangeSet(request.clone()));
        self.injected("create_change_set")?;

        let stacks = self.stacks.lock();
        let snapshot = stacks.get(&request.mutation.stack_name).ok_or(ProviderError::NotFound)?;
        Ok(ChangeSetHandle {
            id: format!(
                "arn:aws:cloudformation:us-east-1:123456789012:changeSet/{}/fake",
                request.name
            ),
            stack_id: snapshot.stack_id.clone(),
        })
    }

    async fn describe_stack(&self, stack_name: &str) -> ProviderResult<RemoteStackSnapshot> {
        self.record(ProviderCall::DescribeStack(stack_name.to_string()));
        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }
        self.injected("describe_stack")?;

        let scripted = self
            .statuses
            .lock()
            .get_mut(stack_name)
            .and_then(VecDeque::pop_front);
        let mut snapshot = match self.stacks.lock().get(stack_name) {
            Some(snapshot) => snapshot.clone(),
            None if scripted.is_some() => RemoteStackSnapshot::new(stack_name, ""),
            None => return Err(ProviderError::NotFound),
        };
        if let Some(status) = scripted {
            snapshot.status = status?;
        }
        Ok(snapshot)
    }

    async fn describe_stack_events(&self, stack_name: &str, query: &EventQuery) -> ProviderResult<Vec<EventRecord>> {
        self.record(ProviderCall::DescribeStackEvents(stack_name.to_string()));
        self.injected("describe_stack_events")?;

        let listing = {
            let mut events = self.events.lock();
            match events.get_mut(stack_name) {
                None if self.stacks.lock().contains_key(stack_name) => Vec::new(),
                None => return Err(ProviderError::NotFound),
                Some(script) => match script.pages.pop_front() {
                    Some(Ok(page)) => {
                        script.last.clone_from(&page);
                        page
                    }
                    Some(Err(err)) => return Err(err),
                    None => script.last.clone(),
                },
            }
        };

        let Some(size) = self.event_page_size else {
            return Ok(listing);
        };
        collect_event_pages(query, |token| {
            *self.event_page_reads.lock() += 1;
            std::future::ready(Ok(paginate(&listing, size, token.as_deref())))
        })
        .await
    }

    async fn get_template_summary(&self, stack_name: &str) -> ProviderResult<TemplateSummary> {
        self.record(ProviderCall::GetTemplateSummary(stack_name.to_string()));
        self.injected("get_template_summary")?;

        let stacks = self.stacks.lock();
        let snapshot = stacks.get(stack_name).ok_or(ProviderError::NotFound)?;
        Ok(TemplateSummary {
            metadata: snapshot.metadata.clone(),
            ..TemplateSummary::default()
        })
    }

    async fn delete_stack(&self, stack_name: &str) -> ProviderResult<()> {
        self.record(ProviderCall::DeleteStack(stack_name.to_string()));
        self.injected("delete_stack")?;

        self.stacks.lock().remove(stack_name);
        Ok(())
    }

    async fn estimate_template_cost(
        &self,
        template: &TemplateSource,
        parameters: &[ResolvedParameter],
    ) -> ProviderResult<String> {
        self.record(ProviderCall::EstimateTemplateCost(template.clone()));
        self.injected("estimate_template_cost")?;

        Ok(format!(
            "https://calculator.example.com/estimate?parameters={}",
            parameters.len()
        ))
    }
}

/// One object written to a [`FakeObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object body.
    pub body: Vec<u8>,
    /// Base64 MD5 digest supplied by the caller.
    pub content_md5: String,
}

/// An in-memory [`ObjectStore`].
#[derive(Debug, Default)]
pub struct FakeObjectStore {
    objects: Mutex<Vec<StoredObject>>,
}

impl FakeObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects written so far, in order.
    #[must_use]
    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().clone()
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_md5: &str,
    ) -> ProviderResult<String> {
        self.objects.lock().push(StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_md5: content_md5.to_string(),
        });
        Ok(format!("https://{bucket}.s3.amazonaws.com/{key}"))
    }
}
