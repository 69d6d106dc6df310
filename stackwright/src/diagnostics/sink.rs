//! Diagnostic sink trait and implementations.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Replacement text for sensitive values.
pub const MASKED_VALUE: &str = "*****";

/// Returns `value`, or [`MASKED_VALUE`] when `sensitive` is set.
#[must_use]
pub fn mask(value: &str, sensitive: bool) -> &str {
    if sensitive {
        MASKED_VALUE
    } else {
        value
    }
}

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    /// Detail useful when troubleshooting.
    Debug,
    /// Normal progress.
    Info,
    /// Something unexpected that did not stop the operation.
    Warn,
}

/// A single diagnostic event emitted by an engine component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    /// Severity.
    pub level: DiagnosticLevel,
    /// Dotted event type, e.g. `parameter.resolved`.
    pub kind: String,
    /// Stack the event concerns, if any.
    pub stack: Option<String>,
    /// Human readable message. Sensitive values are already masked.
    pub message: String,
}

impl DiagnosticEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(level: DiagnosticLevel, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            kind: kind.into(),
            stack: None,
            message: message.into(),
        }
    }

    /// Creates a debug-level event.
    #[must_use]
    pub fn debug(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Debug, kind, message)
    }

    /// Creates an info-level event.
    #[must_use]
    pub fn info(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, kind, message)
    }

    /// Creates a warn-level event.
    #[must_use]
    pub fn warn(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warn, kind, message)
    }

    /// Sets the stack name.
    #[must_use]
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }
}

/// Receives diagnostic events from engine components.
pub trait DiagnosticSink: Send + Sync {
    /// Emits an event. Must never fail or panic.
    fn emit(&self, event: DiagnosticEvent);
}

/// A sink that discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl DiagnosticSink for NoOpSink {
    fn emit(&self, _event: DiagnosticEvent) {}
}

/// A sink that forwards events to the `tracing` framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, event: DiagnosticEvent) {
        let stack = event.stack.as_deref().unwrap_or("-");
        match event.level {
            DiagnosticLevel::Debug => {
                debug!(kind = %event.kind, stack = %stack, "{}", event.message);
            }
            DiagnosticLevel::Info => {
                info!(kind = %event.kind, stack = %stack, "{}", event.message);
            }
            DiagnosticLevel::Warn => {
                warn!(kind = %event.kind, stack = %stack, "{}", event.message);
            }
        }
    }
}

/// A collecting sink for tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: parking_lot::RwLock<Vec<DiagnosticEvent>>,
}

impl CollectingSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.read().clone()
    }

    /// Returns the messages of all events whose kind starts with `prefix`.
    #[must_use]
    pub fn messages_of_kind(&self, prefix: &str) -> Vec<String> {
        self.events
            .read()
            .iter()
            .filter(|e| e.kind.starts_with(prefix))
            .map(|e| e.message.clone())
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, event: DiagnosticEvent) {
        self.events.write().push(event);
    }
}
