use chrono::{DateTime, Utc};

use crate::models::{RefreshState, RefreshStatus};

/// Whether a topic should be refreshed now.
///
/// No row means never refreshed. A row in progress is never due; otherwise
/// the topic is due once `next_refresh` has passed (or was never set).
pub fn is_due(status: Option<&RefreshStatus>, now: DateTime<Utc>) -> bool {
    match status {
        None => true,
        Some(s) if s.status == RefreshState::InProgress => false,
        Some(s) => s.next_refresh.map_or(true, |next| next <= now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn status(state: RefreshState, next: Option<DateTime<Utc>>) -> RefreshStatus {
        RefreshStatus {
            topic_id: 1,
            last_refresh: None,
            next_refresh: next,
            status: state,
            error_message: None,
        }
    }

    #[test]
    fn test_missing_row_is_due() {
        assert!(is_due(None, Utc::now()));
    }

    #[test]
    fn test_in_progress_is_never_due() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        assert!(!is_due(Some(&status(RefreshState::InProgress, past)), now));
        assert!(!is_due(Some(&status(RefreshState::InProgress, None)), now));
    }

    #[test]
    fn test_next_refresh_decides() {
        let now = Utc::now();
        for state in [RefreshState::Pending, RefreshState::Completed, RefreshState::Failed] {
            assert!(is_due(Some(&status(state, Some(now - Duration::seconds(1)))), now));
            assert!(is_due(Some(&status(state, Some(now))), now));
            assert!(!is_due(Some(&status(state, Some(now + Duration::minutes(5)))), now));
            assert!(is_due(Some(&status(state, None)), now));
        }
    }
}
