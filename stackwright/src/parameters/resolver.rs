//! Resolution of declared parameters against inputs and previous state.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::lookup::OutputLookup;
use super::resolved::ResolvedParameter;
use crate::diagnostics::{mask, DiagnosticEvent, DiagnosticSink};
use crate::document::ParameterDeclaration;
use crate::errors::{MissingOutputError, Result};
use crate::provider::RemoteStackSnapshot;
use crate::state::RemoteStateCache;

/// Resolves declared parameters into the list submitted to the provider.
///
/// For each declaration, in order:
/// 1. an input value wins; `@stack.output` inputs are dereferenced through
///    the [`RemoteStateCache`];
/// 2. otherwise, if the previous generation stored the key, the provider is
///    told to keep it;
/// 3. otherwise nothing is emitted and the provider's own default applies.
///
/// Missing required values are left for the provider to reject.
pub struct ParameterResolver {
    cache: Arc<RemoteStateCache>,
    sink: Arc<dyn DiagnosticSink>,
}

impl ParameterResolver {
    /// Creates a resolver reading cross-stack outputs through `cache`.
    #[must_use]
    pub fn new(cache: Arc<RemoteStateCache>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { cache, sink }
    }

    /// Resolves `declared` for `stack_name`.
    pub async fn resolve(
        &self,
        stack_name: &str,
        declared: &[ParameterDeclaration],
        inputs: &BTreeMap<String, String>,
        previous: Option<&RemoteStackSnapshot>,
    ) -> Result<Vec<ResolvedParameter>> {
        let mut resolved = Vec::with_capacity(declared.len());

        for decl in declared {
            if let Some(raw) = inputs.get(&decl.name) {
                let value = self.resolve_value(&decl.name, raw).await?;
                self.sink.emit(
                    DiagnosticEvent::info(
                        "parameter.resolved",
                        format!("Parameter {}={}", decl.name, mask(&value, decl.sensitive)),
                    )
                    .with_stack(stack_name),
                );
                resolved.push(ResolvedParameter::explicit(&decl.name, value));
            } else if previous.is_some_and(|snap| snap.parameters.contains_key(&decl.name)) {
                self.sink.emit(
                    DiagnosticEvent::info(
                        "parameter.previous",
                        format!("Parameter {} keeps its previous value", decl.name),
                    )
                    .with_stack(stack_name),
                );
                resolved.push(ResolvedParameter::use_previous(&decl.name));
            } else {
                self.sink.emit(
                    DiagnosticEvent::debug(
                        "parameter.unset",
                        format!("Parameter {} not supplied; the template default applies", decl.name),
                    )
                    .with_stack(stack_name),
                );
            }
        }

        for key in inputs.keys() {
            if !declared.iter().any(|d| &d.name == key) {
                self.sink.emit(
                    DiagnosticEvent::warn(
                        "parameter.undeclared",
                        format!("Ignoring parameter {key}: the template does not declare it"),
                    )
                    .with_stack(stack_name),
                );
            }
        }

        Ok(resolved)
    }

    /// Dereferences `raw` if it is a `@stack.output` lookup.
    pub async fn resolve_value(&self, parameter: &str, raw: &str) -> Result<String> {
        let Some(lookup) = OutputLookup::parse(raw) else {
            return Ok(raw.to_string());
        };

        let snapshot = self.cache.fetch_snapshot(&lookup.stack).await?;
        let value = snapshot
            .outputs
            .get(&lookup.output)
            .cloned()
            .ok_or_else(|| MissingOutputError::new(&lookup.stack, &lookup.output, parameter))?;

        self.sink.emit(
            DiagnosticEvent::debug(
                "parameter.lookup",
                format!("Resolved {lookup} for parameter {parameter}"),
            )
            .with_stack(&lookup.stack),
        );
        Ok(value)
    }
}

impl std::fmt::Debug for ParameterResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
