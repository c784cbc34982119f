//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Check stage rules, ownership and visibility before storage commits.
//!
//! # Invariants
//! - Services never open nested transactions; each repository call owns
//!   its own atomic unit.

pub mod circle_service;
pub mod graph_service;
pub mod note_service;
pub mod stage_engine;
pub mod visibility;
