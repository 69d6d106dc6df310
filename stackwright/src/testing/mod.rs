//! Testing utilities for code built on stackwright.
//!
//! This module provides:
//! - [`FakeProvider`] and [`FakeObjectStore`], scripted in-memory seams
//! - Fixtures for events and documents
//! - Assertions over recorded provider calls

mod assertions;
mod fakes;
mod fixtures;

pub use assertions::{assert_no_mutations, assert_parameters, single};
pub use fakes::{FakeObjectStore, FakeProvider, ProviderCall, StoredObject};
pub use fixtures::{event, event_page, web_document};
