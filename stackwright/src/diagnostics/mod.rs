//! Explicit diagnostic logging for engine components.
//!
//! Components never log through process-wide state; each one receives an
//! `Arc<dyn DiagnosticSink>` at construction. The CLI wires a
//! [`TracingSink`], tests wire a [`CollectingSink`] to inspect what would
//! have been printed.

mod sink;

pub use sink::{
    mask, CollectingSink, DiagnosticEvent, DiagnosticLevel, DiagnosticSink, NoOpSink, TracingSink,
    MASKED_VALUE,
};
