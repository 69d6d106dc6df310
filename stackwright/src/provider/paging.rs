//! Paged event listings.

use std::future::Future;

use super::traits::ProviderResult;
use super::types::{EventPage, EventQuery, EventRecord};

/// Reads event pages, newest first, until `query` is satisfied or the
/// listing runs out.
///
/// `fetch` receives the continuation token of the previous page (`None` for
/// the first).
pub async fn collect_event_pages<F, Fut>(query: &EventQuery, mut fetch: F) -> ProviderResult<Vec<EventRecord>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<EventPage>>,
{
    let mut listed = Vec::new();
    let mut token = None;
    loop {
        let page = fetch(token.take()).await?;
        listed.extend(page.events);
        if query.is_satisfied_by(&listed) {
            return Ok(listed);
        }
        match page.next_token {
            Some(next) if !next.is_empty() => token = Some(next),
            _ => return Ok(listed),
        }
    }
}

/// Splits a newest-first listing into pages of `size` events.
pub(crate) fn paginate(listing: &[EventRecord], size: usize, token: Option<&str>) -> EventPage {
    let start = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
    let end = (start + size.max(1)).min(listing.len());
    EventPage {
        events: listing.get(start..end).map(<[EventRecord]>::to_vec).unwrap_or_default(),
        next_token: (end < listing.len()).then(|| end.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::tail::select_new_events;
    use crate::testing::event_page;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    async fn listed(listing: &[EventRecord], page_size: usize, query: &EventQuery) -> (Vec<EventRecord>, usize) {
        let fetches = Mutex::new(0);
        let events = collect_event_pages(query, |token| {
            *fetches.lock() += 1;
            let page = paginate(listing, page_size, token.as_deref());
            async move { Ok(page) }
        })
        .await
        .unwrap();
        let fetches = *fetches.lock();
        (events, fetches)
    }

    #[tokio::test]
    async fn test_reads_back_to_the_mark_across_pages() {
        let listing = event_page("web", 1, 160);

        let (events, fetches) = listed(&listing, 100, &EventQuery::since(Some("e10"))).await;
        let fresh = select_new_events(&events, Some("e10"));

        assert_eq!(fetches, 2);
        assert_eq!(fresh.len(), 150);
        assert_eq!(fresh.first().map(|e| e.id.as_str()), Some("e11"));
        assert_eq!(fresh.last().map(|e| e.id.as_str()), Some("e160"));
    }

    #[tokio::test]
    async fn test_stops_on_first_page_when_mark_is_there() {
        let listing = event_page("web", 1, 160);
        let (_, fetches) = listed(&listing, 100, &EventQuery::since(Some("e150"))).await;
        assert_eq!(fetches, 1);
    }

    #[tokio::test]
    async fn test_newest_reads_enough_pages_for_the_count() {
        let listing = event_page("web", 1, 250);

        let (events, fetches) = listed(&listing, 100, &EventQuery::newest(150)).await;
        assert_eq!(fetches, 2);
        assert_eq!(events.len(), 200);

        let (events, fetches) = listed(&listing, 100, &EventQuery::newest(0)).await;
        assert_eq!(fetches, 1);
        assert_eq!(events[0].id, "e250");
    }

    #[tokio::test]
    async fn test_no_mark_reads_whole_history() {
        let listing = event_page("web", 1, 230);
        let (events, fetches) = listed(&listing, 100, &EventQuery::since(None)).await;
        assert_eq!(fetches, 3);
        assert_eq!(events.len(), 230);
    }

    #[tokio::test]
    async fn test_page_errors_propagate() {
        let err = collect_event_pages(&EventQuery::newest(1), |_| async {
            Err::<EventPage, _>(ProviderError::throttling("Rate exceeded"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::Throttling { .. }));
    }
}
