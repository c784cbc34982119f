//! Garden domain model: notes, growth stages, visibility and circles.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep every stage rule in one exhaustive table (`stage`).
//!
//! # Invariants
//! - Every note and circle is identified by a stable, non-nil UUID.
//! - Timestamps carry millisecond precision so they round-trip through
//!   storage without loss.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub mod circle;
pub mod note;
pub mod stage;
pub mod visibility;

/// Stable identifier for a note.
pub type NoteId = Uuid;

/// Stable identifier for a circle.
pub type CircleId = Uuid;

/// Opaque user identifier issued by the external auth collaborator.
pub type UserId = String;

/// Returns the current UTC time truncated to millisecond precision.
pub fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Drops sub-millisecond precision from a timestamp.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    let sub_millis = i64::from(value.timestamp_subsec_nanos() % 1_000_000);
    value - Duration::nanoseconds(sub_millis)
}
