//! The remote provider seam.
//!
//! The engine never talks to a cloud API directly. Everything it needs is
//! expressed by the [`StackProvider`] and [`ObjectStore`] traits; the `aws`
//! feature supplies implementations backed by the AWS SDK, and
//! [`crate::testing`] supplies scripted in-memory ones.

#[cfg(feature = "aws")]
pub mod aws;
mod paging;
mod traits;
mod types;

pub(crate) use paging::paginate;
pub use paging::collect_event_pages;
pub use traits::{ObjectStore, ProviderResult, StackProvider};
pub use types::{
    ChangeSetHandle, ChangeSetRequest, EventPage, EventQuery, EventRecord, OnFailure, RemoteStackSnapshot,
    StackHandle, StackMutation, StackPolicy, TemplateSource, TemplateSummary, TemplateValidation,
};
