//! Remote stack snapshot cache with single-flight fetches.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::errors::{Result, StackwrightError};
use crate::provider::{RemoteStackSnapshot, StackProvider};

type Slot = Arc<OnceCell<Arc<RemoteStackSnapshot>>>;

/// Memoizes one [`RemoteStackSnapshot`] per stack name.
///
/// Lives for a single CLI invocation. Concurrent callers asking for the same
/// stack share one describe call: the first caller runs it while the others
/// wait on the same slot. Failed fetches are not memoized, so the next caller
/// retries.
pub struct RemoteStateCache {
    provider: Arc<dyn StackProvider>,
    sink: Arc<dyn DiagnosticSink>,
    slots: DashMap<String, Slot>,
}

impl RemoteStateCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(provider: Arc<dyn StackProvider>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            provider,
            sink,
            slots: DashMap::new(),
        }
    }

    /// Returns the snapshot for `stack_name`, describing the stack on a miss.
    ///
    /// A missing stack yields [`StackwrightError::StackNotFound`].
    pub async fn fetch_snapshot(&self, stack_name: &str) -> Result<Arc<RemoteStackSnapshot>> {
        // Clone the slot out so no map shard lock is held across the await.
        let slot: Slot = self.slots.entry(stack_name.to_string()).or_default().clone();

        slot.get_or_try_init(|| async {
            self.sink.emit(
                DiagnosticEvent::debug("state.describe", format!("Describing stack {stack_name}"))
                    .with_stack(stack_name),
            );
            self.provider
                .describe_stack(stack_name)
                .await
                .map(Arc::new)
                .map_err(|e| StackwrightError::from_provider(stack_name, e))
        })
        .await
        .cloned()
    }

    /// Like [`fetch_snapshot`](Self::fetch_snapshot) but maps "not found" to `None`.
    ///
    /// Used when asking whether a previous generation exists.
    pub async fn find_snapshot(&self, stack_name: &str) -> Result<Option<Arc<RemoteStackSnapshot>>> {
        match self.fetch_snapshot(stack_name).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) if e.is_not_found() => {
                self.sink.emit(
                    DiagnosticEvent::debug(
                        "state.absent",
                        format!("Stack {stack_name} does not exist yet; no previous parameters"),
                    )
                    .with_stack(stack_name),
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Drops the cached snapshot for `stack_name`.
    pub fn invalidate(&self, stack_name: &str) {
        if self.slots.remove(stack_name).is_some() {
            self.sink.emit(
                DiagnosticEvent::debug("state.invalidated", format!("Invalidated cached state for {stack_name}"))
                    .with_stack(stack_name),
            );
        }
    }

    /// Returns true if a snapshot is currently memoized for `stack_name`.
    #[must_use]
    pub fn is_cached(&self, stack_name: &str) -> bool {
        self.slots
            .get(stack_name)
            .is_some_and(|slot| slot.initialized())
    }
}

impl std::fmt::Debug for RemoteStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStateCache")
            .field("stacks", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoOpSink;
    use crate::testing::FakeProvider;

    fn cache_with(provider: &Arc<FakeProvider>) -> RemoteStateCache {
        RemoteStateCache::new(provider.clone(), Arc::new(NoOpSink))
    }

    #[tokio::test]
    async fn test_second_fetch_uses_cache() {
        let provider = Arc::new(FakeProvider::new());
        provider.put_stack(RemoteStackSnapshot::new("net", "CREATE_COMPLETE").with_output("VpcId", "vpc-1"));
        let cache = cache_with(&provider);

        let first = cache.fetch_snapshot("net").await.unwrap();
        let second = cache.fetch_snapshot("net").await.unwrap();

        assert_eq!(first.outputs["VpcId"], "vpc-1");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(provider.describe_calls("net"), 1);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let provider = Arc::new(FakeProvider::new());
        provider.put_stack(RemoteStackSnapshot::new("net", "CREATE_COMPLETE"));
        let cache = cache_with(&provider);

        cache.fetch_snapshot("net").await.unwrap();
        assert!(cache.is_cached("net"));
        cache.invalidate("net");
        assert!(!cache.is_cached("net"));
        cache.fetch_snapshot("net").await.unwrap();

        assert_eq!(provider.describe_calls("net"), 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_call() {
        let provider = Arc::new(FakeProvider::new().with_describe_delay(std::time::Duration::from_millis(20)));
        provider.put_stack(RemoteStackSnapshot::new("net", "CREATE_COMPLETE"));
        let cache = Arc::new(cache_with(&provider));

        let fetches = (0..8).map(|_| {
            let cache = cache.clone();
            async move { cache.fetch_snapshot("net").await }
        });
        let results = futures::future::join_all(fetches).await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(provider.describe_calls("net"), 1);
    }

    #[tokio::test]
    async fn test_missing_stack() {
        let provider = Arc::new(FakeProvider::new());
        let cache = cache_with(&provider);

        let err = cache.fetch_snapshot("ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.find_snapshot("ghost").await.unwrap().is_none());
    }
}
