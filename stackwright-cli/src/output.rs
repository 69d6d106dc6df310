//! Terminal rendering of engine results.

use stackwright::provider::EventRecord;

/// Renders one stack event as a single line.
pub fn format_event(event: &EventRecord) -> String {
    let mut line = format!(
        "{} {:<44} {:<40} {}",
        event.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        event.status,
        event.resource_type,
        event.logical_id,
    );
    if let Some(reason) = event.status_reason.as_deref().filter(|r| !r.is_empty()) {
        line.push_str(": ");
        line.push_str(reason);
    }
    line
}

/// Whether a settled status means the change did not apply.
pub fn is_failed_status(status: &str) -> bool {
    status.ends_with("_FAILED") || status.contains("ROLLBACK")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stackwright::testing::event;

    #[test]
    fn test_format_event_without_reason() {
        let line = format_event(&event(3, "web", "CREATE_IN_PROGRESS"));
        assert!(line.starts_with("2024-"));
        assert!(line.contains("CREATE_IN_PROGRESS"));
        assert!(line.ends_with(" web"));
    }

    #[test]
    fn test_format_event_appends_reason() {
        let mut record = event(4, "Db", "CREATE_FAILED");
        record.status_reason = Some("Resource creation cancelled".into());
        let line = format_event(&record);
        assert_eq!(line.rsplit_once(": ").map(|(_, r)| r), Some("Resource creation cancelled"));
    }

    #[test]
    fn test_failed_statuses() {
        assert!(is_failed_status("CREATE_FAILED"));
        assert!(is_failed_status("UPDATE_ROLLBACK_COMPLETE"));
        assert!(!is_failed_status("UPDATE_COMPLETE"));
        assert!(!is_failed_status("DELETE_COMPLETE"));
    }
}
