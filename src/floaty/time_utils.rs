//! Time utilities for safe timestamp handling.
//!
//! Entries keep their validity windows as Unix timestamps in milliseconds.
//! These helpers avoid the panics that direct `SystemTime` arithmetic invites.

use crate::floaty::error::FloatyError;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get current timestamp in milliseconds since Unix epoch.
///
/// In the extremely rare case where system time is before Unix epoch,
/// it returns an error instead of panicking.
pub(crate) fn current_timestamp_ms() -> Result<u64, FloatyError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_ms)
        .map_err(|_| FloatyError::Clock("System time is before Unix epoch".to_string()))
}

/// Converts a window length to whole milliseconds, saturating at `u64::MAX`.
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Computes the end of a validity window starting at `issued_at`.
pub(crate) fn expiry(issued_at: u64, window_ms: u64) -> u64 {
    issued_at.saturating_add(window_ms)
}
