//! Core domain logic for the garden: note growth stages, visibility,
//! the connection graph and derived temporal/harvest views.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod insight;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{load_config, ConfigError, GardenConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use error::{GardenError, GardenResult};
pub use insight::harvest::{harvest, Harvest};
pub use insight::quiet_hours::{is_quiet_time, ClockTime, QuietHoursSchedule};
pub use insight::temporal::{season, sort_notes, warmth, Season, SortStrategy, Warmth};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::circle::Circle;
pub use model::note::{Note, NoteVersion};
pub use model::stage::Stage;
pub use model::visibility::Visibility;
pub use model::{CircleId, NoteId, UserId};
pub use repo::circle_repo::{CircleRepository, SqliteCircleRepository};
pub use repo::graph_repo::{GraphRepository, SqliteGraphRepository};
pub use repo::note_repo::{NoteListQuery, NoteRepository, SqliteNoteRepository};
pub use repo::{RepoError, RepoResult};
pub use service::circle_service::CirclesRegistry;
pub use service::graph_service::ConnectionGraph;
pub use service::note_service::{NoteEdit, NoteService};
pub use service::visibility::VisibilityGate;

/// Minimal health-check API for host probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
