//! Identifier and timestamp helpers shared by run bookkeeping.

pub mod timestamps;

pub use timestamps::{format_iso8601, run_started_at, truncate_to_seconds, Timestamp};

use uuid::Uuid;

/// Generates a time-ordered run identifier.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}
