//! Progress event tailing.
//!
//! This module provides:
//! - [`PollBackoff`] / [`BackoffConfig`], the sleep schedule between polls
//! - [`EventTailer`], which delivers a stack's events in order, exactly once,
//!   until the stack reaches a terminal status

mod backoff;
mod tailer;

pub use backoff::{BackoffConfig, PollBackoff};
pub use tailer::{is_terminal_status, select_new_events, EventTailer, TailOptions, TailOutcome};
