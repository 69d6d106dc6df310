//! # Stackwright
//!
//! A convergence engine for declarative cloud stacks.
//!
//! Given a rendered stack document and a map of input parameters, stackwright
//! reconciles a named remote stack with the document:
//!
//! - **Parameter resolution**: inputs, previous values and `@stack.output`
//!   cross-stack lookups
//! - **Convergence**: create when absent, update (or record a change-set)
//!   when present
//! - **Event tailing**: resumable polling with back-off and cancellation
//! - **Credentials**: profile loading and cached role assumption
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackwright::prelude::*;
//!
//! let cache = Arc::new(RemoteStateCache::new(provider.clone(), sink.clone()));
//! let orchestrator = Orchestrator::new(provider, cache, sink, EngineConfig::from_env());
//!
//! let document = StackDocument::from_path(Path::new("web.json"))?;
//! let outcome = orchestrator
//!     .converge("web", &document, inputs.values(), &ConvergeOptions::default())
//!     .await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod converge;
pub mod credentials;
pub mod diagnostics;
pub mod document;
pub mod errors;
pub mod parameters;
pub mod provider;
pub mod state;
pub mod tail;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::EngineConfig;
    pub use crate::converge::{ChangeSetOptions, ConvergeOptions, ConvergeOutcome, Orchestrator};
    pub use crate::credentials::{CredentialManager, CredentialSession, MfaPrompt, SessionCache};
    pub use crate::diagnostics::{DiagnosticEvent, DiagnosticSink, NoOpSink, TracingSink};
    pub use crate::document::StackDocument;
    pub use crate::errors::{Result, StackwrightError};
    pub use crate::parameters::{ParameterInputs, ParameterResolver, ResolvedParameter};
    pub use crate::provider::{ObjectStore, StackPolicy, StackProvider, TemplateSource};
    pub use crate::state::RemoteStateCache;
    pub use crate::tail::{BackoffConfig, EventTailer, TailOptions, TailOutcome};
}
