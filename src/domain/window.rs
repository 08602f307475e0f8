//! Time-window primitives shared by announcement visibility.

use chrono::{DateTime, Duration, Utc};

/// How far ahead of its start an announcement is surfaced as "upcoming".
pub const LOOKAHEAD_HOURS: i64 = 24;

/// Upper bound on the number of announcements returned to a dashboard.
pub const MAX_VISIBLE_ANNOUNCEMENTS: usize = 10;

/// Number of history entries retained per announcement.
pub const HISTORY_CAPACITY: usize = 10;

/// `start <= now <= end`, inclusive on both ends.
pub fn is_within_window(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    start <= now && now <= end
}

/// `now < start <= now + LOOKAHEAD_HOURS`.
pub fn is_upcoming(now: DateTime<Utc>, start: DateTime<Utc>) -> bool {
    now < start && start <= now + lookahead()
}

pub fn lookahead() -> Duration {
    Duration::hours(LOOKAHEAD_HOURS)
}
