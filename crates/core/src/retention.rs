use chrono::{DateTime, Duration, Utc};

use crate::domain::item::Item;

pub const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Window after which an item whose `last_used` timestamp has not moved is
/// considered forgotten. The scan is read-only: it never refreshes
/// `last_used`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub window_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { window_days: DEFAULT_RETENTION_DAYS }
    }
}

impl RetentionPolicy {
    /// Items with `last_used` strictly before this instant are stale.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::days(self.window_days)
    }
}

/// One `• name (location)` line per stale item, in store-scan order.
pub fn stale_report_lines(items: &[Item]) -> Vec<String> {
    items.iter().map(|item| format!("• {} ({})", item.name, item.location)).collect()
}
