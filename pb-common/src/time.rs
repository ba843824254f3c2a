//! Timestamp utilities

use chrono::{DateTime, SubsecRound, Utc};

/// Current UTC timestamp, truncated to microseconds.
///
/// Storage backends persist microsecond precision, so records compare the
/// same whether they come back from SQLite or from memory.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Format a timestamp as a short display date, e.g. `Oct 19, 2026`
pub fn display_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%b %-d, %Y").to_string()
}
