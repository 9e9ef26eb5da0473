//! Domain model for study groups and their meetings.
//!
//! # Responsibility
//! - Define canonical records shared by repositories and services.
//! - Own field-level validation so every write path applies the same rules.
//!
//! # Invariants
//! - Every group and meeting is identified by a stable UUID.
//! - Group deletion is represented by `is_active = false`, not hard delete.
//! - Timestamps are Unix epoch milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod group;
pub mod meeting;

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
