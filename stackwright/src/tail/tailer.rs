//! Resumable event polling.

use std::sync::Arc;

use super::backoff::{BackoffConfig, PollBackoff};
use crate::cancellation::CancellationToken;
use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::errors::{ProviderError, Result, StackwrightError};
use crate::provider::{EventQuery, EventRecord, StackProvider};

/// Returns true once a stack status can no longer change on its own.
#[must_use]
pub fn is_terminal_status(status: &str) -> bool {
    status.ends_with("_COMPLETE") || status.ends_with("_FAILED")
}

/// Picks the events newer than `high_water` from a newest-first listing.
///
/// Walks from the newest event until the mark is found (exclusive) and
/// returns the collected events oldest first. With no mark, every event is
/// new.
#[must_use]
pub fn select_new_events<'a>(events: &'a [EventRecord], high_water: Option<&str>) -> Vec<&'a EventRecord> {
    let mut fresh: Vec<&EventRecord> = events
        .iter()
        .take_while(|event| Some(event.id.as_str()) != high_water)
        .collect();
    fresh.reverse();
    fresh
}

/// Options for one tail run.
#[derive(Debug, Clone, Default)]
pub struct TailOptions {
    /// How many of the most recent existing events to deliver first.
    pub initial_count: usize,
    /// Keep polling until the stack reaches a terminal status.
    pub follow: bool,
    /// Skip back-off sleeps.
    pub no_sleep: bool,
    /// Poll schedule.
    pub backoff: BackoffConfig,
}

impl TailOptions {
    /// Creates options that deliver `initial_count` events and stop.
    #[must_use]
    pub fn new(initial_count: usize) -> Self {
        Self {
            initial_count,
            ..Self::default()
        }
    }

    /// Keeps polling until the stack settles.
    #[must_use]
    pub fn following(mut self) -> Self {
        self.follow = true;
        self
    }

    /// Disables sleeping between polls.
    #[must_use]
    pub fn without_sleep(mut self) -> Self {
        self.no_sleep = true;
        self
    }

    /// Sets the poll schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// How a tail run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailOutcome {
    /// Initial events delivered; following was not requested.
    Snapshot,
    /// The stack reached a terminal status.
    Settled {
        /// The terminal status.
        status: String,
    },
    /// The stack disappeared while polling.
    StackGone,
    /// The cancellation token fired.
    Cancelled,
}

/// Streams a stack's progress events.
pub struct EventTailer {
    provider: Arc<dyn StackProvider>,
    sink: Arc<dyn DiagnosticSink>,
}

impl EventTailer {
    /// Creates a tailer.
    #[must_use]
    pub fn new(provider: Arc<dyn StackProvider>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { provider, sink }
    }

    /// Delivers events for `stack` to `on_event`.
    ///
    /// Events arrive oldest first and each id is delivered at most once.
    /// Throttled reads are retried after the next sleep without moving the
    /// mark. Cancellation is checked before every read and raced against
    /// every sleep.
    pub async fn tail<F>(
        &self,
        stack: &str,
        options: &TailOptions,
        cancel: &CancellationToken,
        mut on_event: F,
    ) -> Result<TailOutcome>
    where
        F: FnMut(&EventRecord) + Send,
    {
        let mut backoff = PollBackoff::new(options.backoff.clone());
        let query = EventQuery::newest(options.initial_count);
        let existing = loop {
            if cancel.is_cancelled() {
                return Ok(TailOutcome::Cancelled);
            }
            match self.provider.describe_stack_events(stack, &query).await {
                Ok(listing) => break listing,
                Err(ProviderError::Throttling { message }) => self.throttled(stack, &message),
                Err(err) => return Err(StackwrightError::from_provider(stack, err)),
            }
            if !self.pause(options, &mut backoff, cancel).await {
                return Ok(TailOutcome::Cancelled);
            }
        };
        backoff.reset();

        let initial: Vec<&EventRecord> = existing.iter().take(options.initial_count).rev().collect();
        for event in &initial {
            on_event(event);
        }
        // Events older than the mark are never delivered, so start from the
        // newest existing event even when none were requested.
        let mut high_water = existing.first().map(|e| e.id.clone());
        self.sink.emit(
            DiagnosticEvent::debug("tail.initial", format!("Delivered {} initial event(s)", initial.len()))
                .with_stack(stack),
        );

        if !options.follow {
            return Ok(TailOutcome::Snapshot);
        }

        loop {
            if cancel.is_cancelled() {
                return Ok(TailOutcome::Cancelled);
            }

            match self.poll(stack, high_water.as_deref()).await {
                Ok(Poll::Gone) => {
                    self.sink.emit(
                        DiagnosticEvent::info("tail.gone", format!("Stack {stack} no longer exists"))
                            .with_stack(stack),
                    );
                    return Ok(TailOutcome::StackGone);
                }
                Ok(Poll::Progress { status, events }) => {
                    for event in &events {
                        on_event(event);
                    }
                    if let Some(newest) = events.last() {
                        high_water = Some(newest.id.clone());
                        backoff.reset();
                    }
                    if is_terminal_status(&status) {
                        self.sink.emit(
                            DiagnosticEvent::debug("tail.settled", format!("Stack settled at {status}"))
                                .with_stack(stack),
                        );
                        return Ok(TailOutcome::Settled { status });
                    }
                }
                Err(ProviderError::Throttling { message }) => self.throttled(stack, &message),
                Err(err) => return Err(StackwrightError::from_provider(stack, err)),
            }

            if !self.pause(options, &mut backoff, cancel).await {
                return Ok(TailOutcome::Cancelled);
            }
        }
    }

    fn throttled(&self, stack: &str, message: &str) {
        self.sink.emit(
            DiagnosticEvent::warn("tail.throttled", format!("Throttled while reading events: {message}"))
                .with_stack(stack),
        );
    }

    /// Sleeps for the current back-off interval. Returns false if the token
    /// fired first.
    async fn pause(&self, options: &TailOptions, backoff: &mut PollBackoff, cancel: &CancellationToken) -> bool {
        if options.no_sleep {
            return true;
        }
        let wait = backoff.current();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            () = tokio::time::sleep(wait) => {}
        }
        backoff.advance();
        true
    }

    async fn poll(&self, stack: &str, high_water: Option<&str>) -> std::result::Result<Poll, ProviderError> {
        let status = match self.provider.describe_stack(stack).await {
            Ok(snapshot) => snapshot.status,
            Err(ProviderError::NotFound) => return Ok(Poll::Gone),
            Err(err) => return Err(err),
        };
        let query = EventQuery::since(high_water);
        let listing = match self.provider.describe_stack_events(stack, &query).await {
            Ok(listing) => listing,
            Err(ProviderError::NotFound) => return Ok(Poll::Gone),
            Err(err) => return Err(err),
        };
        let events = select_new_events(&listing, high_water)
            .into_iter()
            .cloned()
            .collect();
        Ok(Poll::Progress { status, events })
    }
}

enum Poll {
    Gone,
    Progress { status: String, events: Vec<EventRecord> },
}

impl std::fmt::Debug for EventTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTailer").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, NoOpSink};
    use crate::provider::RemoteStackSnapshot;
    use crate::testing::{event, event_page, FakeProvider};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn tailer(provider: &Arc<FakeProvider>) -> EventTailer {
        EventTailer::new(provider.clone(), Arc::new(NoOpSink))
    }

    async fn collect(tailer: &EventTailer, stack: &str, options: &TailOptions) -> (Vec<String>, TailOutcome) {
        let mut seen = Vec::new();
        let outcome = tailer
            .tail(stack, options, &CancellationToken::new(), |e| seen.push(e.id.clone()))
            .await
            .unwrap();
        (seen, outcome)
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(is_terminal_status("CREATE_COMPLETE"));
        assert!(is_terminal_status("UPDATE_ROLLBACK_COMPLETE"));
        assert!(is_terminal_status("DELETE_FAILED"));
        assert!(!is_terminal_status("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS"));
        assert!(!is_terminal_status("CREATE_IN_PROGRESS"));
    }

    #[test]
    fn test_select_new_events_stops_at_mark() {
        let page = event_page("web", 1, 5);
        let ids: Vec<_> = select_new_events(&page, Some("e3")).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e4", "e5"]);

        let all: Vec<_> = select_new_events(&page, None).iter().map(|e| e.id.as_str()).collect();
        assert_eq!(all, vec!["e1", "e2", "e3", "e4", "e5"]);
        assert!(select_new_events(&page, Some("e5")).is_empty());
    }

    #[tokio::test]
    async fn test_initial_then_follow_delivers_each_event_once() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", event_page("web", 1, 2));
        provider.push_event_page("web", event_page("web", 1, 4));
        provider.push_event_page("web", event_page("web", 1, 6));
        provider.script_statuses("web", ["UPDATE_IN_PROGRESS", "UPDATE_COMPLETE"]);

        let options = TailOptions::new(1).following().without_sleep();
        let (seen, outcome) = collect(&tailer(&provider), "web", &options).await;

        assert_eq!(seen, vec!["e2", "e3", "e4", "e5", "e6"]);
        assert_eq!(
            outcome,
            TailOutcome::Settled {
                status: "UPDATE_COMPLETE".into()
            }
        );
    }

    #[tokio::test]
    async fn test_initial_count_zero_skips_history() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", event_page("web", 1, 3));
        provider.push_event_page("web", event_page("web", 1, 4));
        provider.script_statuses("web", ["UPDATE_COMPLETE"]);

        let options = TailOptions::new(0).following().without_sleep();
        let (seen, _) = collect(&tailer(&provider), "web", &options).await;

        assert_eq!(seen, vec!["e4"]);
    }

    #[tokio::test]
    async fn test_snapshot_without_follow() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", event_page("web", 1, 5));

        let (seen, outcome) = collect(&tailer(&provider), "web", &TailOptions::new(3)).await;

        assert_eq!(seen, vec!["e3", "e4", "e5"]);
        assert_eq!(outcome, TailOutcome::Snapshot);
        assert_eq!(provider.describe_calls("web"), 0);
    }

    #[tokio::test]
    async fn test_throttling_is_swallowed() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", event_page("web", 1, 1));
        provider.push_event_error("web", ProviderError::throttling("Rate exceeded"));
        provider.push_event_page("web", event_page("web", 1, 3));
        provider.script_statuses("web", ["CREATE_IN_PROGRESS", "CREATE_COMPLETE"]);

        let options = TailOptions::new(1).following().without_sleep();
        let (seen, outcome) = collect(&tailer(&provider), "web", &options).await;

        assert_eq!(seen, vec!["e1", "e2", "e3"]);
        assert!(matches!(outcome, TailOutcome::Settled { .. }));
    }

    #[tokio::test]
    async fn test_throttled_initial_read_is_retried() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_error("web", ProviderError::throttling("Rate exceeded"));
        provider.push_event_error("web", ProviderError::throttling("Rate exceeded"));
        provider.push_event_page("web", event_page("web", 1, 3));
        let sink = Arc::new(CollectingSink::new());

        let mut seen = Vec::new();
        let outcome = EventTailer::new(provider.clone(), sink.clone())
            .tail(
                "web",
                &TailOptions::new(2).without_sleep(),
                &CancellationToken::new(),
                |e| seen.push(e.id.clone()),
            )
            .await
            .unwrap();

        assert_eq!(outcome, TailOutcome::Snapshot);
        assert_eq!(seen, vec!["e2", "e3"]);
        assert_eq!(sink.messages_of_kind("tail.throttled").len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_initial_read_backs_off() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_error("web", ProviderError::throttling("Rate exceeded"));
        provider.push_event_page("web", event_page("web", 1, 1));

        let start = tokio::time::Instant::now();
        let (seen, outcome) = collect(&tailer(&provider), "web", &TailOptions::new(1)).await;

        assert_eq!(seen, vec!["e1"]);
        assert_eq!(outcome, TailOutcome::Snapshot);
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_follow_reads_back_to_the_mark_across_pages() {
        let provider = Arc::new(FakeProvider::new().with_event_page_size(100));
        provider.push_event_page("web", event_page("web", 1, 10));
        provider.push_event_page("web", event_page("web", 1, 160));
        provider.script_statuses("web", ["UPDATE_COMPLETE"]);

        let options = TailOptions::new(0).following().without_sleep();
        let (seen, _) = collect(&tailer(&provider), "web", &options).await;

        let expected: Vec<String> = (11..=160).map(|seq| format!("e{seq}")).collect();
        assert_eq!(seen, expected);
        assert_eq!(provider.event_page_reads(), 3);
    }

    #[tokio::test]
    async fn test_initial_count_reads_enough_pages() {
        let provider = Arc::new(FakeProvider::new().with_event_page_size(100));
        provider.push_event_page("web", event_page("web", 1, 300));

        let (seen, _) = collect(&tailer(&provider), "web", &TailOptions::new(150)).await;

        assert_eq!(seen.len(), 150);
        assert_eq!(seen.first().map(String::as_str), Some("e151"));
        assert_eq!(seen.last().map(String::as_str), Some("e300"));
        assert_eq!(provider.event_page_reads(), 2);
    }

    #[tokio::test]
    async fn test_deleted_stack_ends_cleanly() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", event_page("web", 1, 2));
        provider.script_statuses("web", ["DELETE_IN_PROGRESS"]);
        provider.script_status_error("web", ProviderError::NotFound);
        let sink = Arc::new(CollectingSink::new());

        let mut seen = Vec::new();
        let outcome = EventTailer::new(provider.clone(), sink.clone())
            .tail(
                "web",
                &TailOptions::new(2).following().without_sleep(),
                &CancellationToken::new(),
                |e| seen.push(e.id.clone()),
            )
            .await
            .unwrap();

        assert_eq!(outcome, TailOutcome::StackGone);
        assert_eq!(seen, vec!["e1", "e2"]);
        assert_eq!(sink.messages_of_kind("tail.gone").len(), 1);
    }

    #[tokio::test]
    async fn test_other_errors_are_fatal() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", Vec::new());
        provider.script_status_error("web", ProviderError::other("AccessDenied", "no"));

        let err = tailer(&provider)
            .tail(
                "web",
                &TailOptions::new(0).following().without_sleep(),
                &CancellationToken::new(),
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StackwrightError::Provider { ref code, .. } if code == "AccessDenied"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let provider = Arc::new(FakeProvider::new());
        provider.put_stack(RemoteStackSnapshot::new("web", "UPDATE_IN_PROGRESS"));
        provider.push_event_page("web", event_page("web", 1, 1));
        let token = Arc::new(CancellationToken::new());

        let canceller = {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                token.cancel("interrupted");
            })
        };
        let options = TailOptions::new(0)
            .following()
            .with_backoff(BackoffConfig::new().with_base_interval_ms(60_000).with_max_wait_ms(60_000));
        let outcome = tokio::time::timeout(
            Duration::from_secs(5),
            tailer(&provider).tail("web", &options, &token, |_| {}),
        )
        .await
        .unwrap()
        .unwrap();

        canceller.await.unwrap();
        assert_eq!(outcome, TailOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_polls_back_off() {
        let provider = Arc::new(FakeProvider::new());
        provider.push_event_page("web", vec![event(1, "web", "CREATE_IN_PROGRESS")]);
        provider.script_statuses(
            "web",
            ["CREATE_IN_PROGRESS", "CREATE_IN_PROGRESS", "CREATE_IN_PROGRESS", "CREATE_COMPLETE"],
        );

        let start = tokio::time::Instant::now();
        let options = TailOptions::new(1).following();
        tailer(&provider)
            .tail("web", &options, &CancellationToken::new(), |_| {})
            .await
            .unwrap();

        // 1s + 2s + 4s between the four polls.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(7) && elapsed < Duration::from_secs(8), "{elapsed:?}");
    }
}
