//! Stack convergence.
//!
//! This module provides:
//! - [`ConvergeOptions`] and its parts, the knobs passed through to the provider
//! - Stack policy input detection
//! - Template upload for bodies too large to send inline
//! - [`Orchestrator`], which validates, resolves and submits a create,
//!   update or change-set

mod options;
mod orchestrator;
mod policy;
mod upload;


pub use options::{ChangeSetOptions, ConvergeOptions, UploadLocation};
pub use orchestrator::{ConvergeOutcome, Orchestrator, StackDescription};
pub use upload::{content_md5, TemplateUploader};
