//! Per-invocation memo of remote stack state.

mod cache;

pub use cache::RemoteStateCache;
