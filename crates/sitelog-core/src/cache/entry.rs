use chrono::{DateTime, Utc};
use serde_json::Value;

/// Fetch state of one cache entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchStatus {
    #[default]
    Idle,
    Fetching,
    Success,
    Error(String),
}

/// Where the current value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    /// Returned by a real fetch.
    Server,
    /// Written locally; provisional until the next fetch replaces it.
    Local,
}

/// Last known value for one query key plus its fetch state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    pub value: Option<Value>,
    pub origin: Option<ValueOrigin>,
    pub status: FetchStatus,
    pub updated_at: Option<DateTime<Utc>>,
    /// Set by invalidation; the next fetch ignores freshness.
    pub invalidated: bool,
}

impl CacheEntry {
    pub fn is_provisional(&self) -> bool {
        self.origin == Some(ValueOrigin::Local)
    }

    pub fn age_minutes(&self) -> Option<i64> {
        self.updated_at.map(|at| (Utc::now() - at).num_minutes())
    }

    pub fn age_display(&self) -> String {
        let Some(minutes) = self.age_minutes() else {
            return "never".to_string();
        };
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_age_display() {
        let mut entry = CacheEntry::default();
        assert_eq!(entry.age_display(), "never");

        entry.updated_at = Some(Utc::now());
        assert_eq!(entry.age_display(), "just now");

        entry.updated_at = Some(Utc::now() - Duration::minutes(5));
        assert_eq!(entry.age_display(), "5m ago");

        entry.updated_at = Some(Utc::now() - Duration::minutes(95));
        assert_eq!(entry.age_display(), "2h ago");

        entry.updated_at = Some(Utc::now() - Duration::days(3));
        assert_eq!(entry.age_display(), "3d ago");
    }

    #[test]
    fn test_provisional() {
        let entry = CacheEntry {
            origin: Some(ValueOrigin::Local),
            ..Default::default()
        };
        assert!(entry.is_provisional());
        assert!(!CacheEntry::default().is_provisional());
    }
}
