//! Derived, read-only views over note snapshots.
//!
//! # Responsibility
//! - Temporal heuristics (`temporal`, `quiet_hours`) and aggregate
//!   analytics (`harvest`).
//!
//! # Invariants
//! - Nothing here touches storage or keeps state between calls.

pub mod harvest;
pub mod quiet_hours;
pub mod temporal;
