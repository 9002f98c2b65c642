//! Timestamp utilities for run keys.

use chrono::{DateTime, SubsecRound, Utc};

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Drops the sub-second part of `ts`.
#[must_use]
pub fn truncate_to_seconds(ts: Timestamp) -> Timestamp {
    ts.trunc_subsecs(0)
}

/// The current UTC time truncated to whole seconds.
///
/// Run rows are keyed by this value, so two runs of the same table within
/// one second share a key.
#[must_use]
pub fn run_started_at() -> Timestamp {
    truncate_to_seconds(Utc::now())
}

/// Formats a timestamp as ISO 8601 string.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}
