//! ---
//! sh_section: "03-configuration"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Shared primitives and utilities for the scenario runtime."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Convert a duration into whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Milliseconds between two wall-clock instants, clamped at zero when the
/// clock stepped backwards.
pub fn elapsed_millis(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}
