//! Caller-facing error taxonomy for garden use-cases.
//!
//! # Invariants
//! - Every variant is a local, recoverable condition except `Repo` and
//!   `GraphIntegrity`, which report storage or data-integrity failures.
//! - No variant implies silent recovery was attempted.

use crate::model::note::NoteValidationError;
use crate::model::stage::Stage;
use crate::model::visibility::Visibility;
use crate::model::{CircleId, NoteId, UserId};
use crate::repo::RepoError;
use crate::service::stage_engine::StageError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type GardenResult<T> = Result<T, GardenError>;

/// Service error for garden use-cases.
#[derive(Debug)]
pub enum GardenError {
    NoteNotFound(NoteId),
    CircleNotFound(CircleId),
    /// Preconditions for a stage move are not met.
    StageTransitionDenied {
        from: Stage,
        to: Option<Stage>,
        reason: String,
    },
    /// Edit would exceed the active stage's character budget.
    ContentLimitExceeded {
        stage: Stage,
        limit: usize,
        actual: usize,
    },
    /// Requested visibility is incompatible with the note's stage.
    VisibilityDenied {
        stage: Stage,
        requested: Visibility,
    },
    /// Self-edge or edge touching a note that cannot hold edges.
    InvalidEdge(String),
    CircleFull {
        circle_id: CircleId,
        max_members: u32,
    },
    AlreadyMember {
        circle_id: CircleId,
        user_id: UserId,
    },
    /// Caller is not allowed to perform the mutation.
    Forbidden(String),
    /// Caller-supplied value is blank or out of range.
    InvalidInput(String),
    /// Stored graph relations contradict each other.
    GraphIntegrity(String),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl Display for GardenError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::CircleNotFound(id) => write!(f, "circle not found: {id}"),
            Self::StageTransitionDenied { from, to, reason } => match to {
                Some(to) => write!(
                    f,
                    "stage transition {} -> {} denied: {reason}",
                    from.as_str(),
                    to.as_str()
                ),
                None => write!(f, "stage transition from {} denied: {reason}", from.as_str()),
            },
            Self::ContentLimitExceeded {
                stage,
                limit,
                actual,
            } => write!(
                f,
                "{} notes allow {limit} characters, edit has {actual}",
                stage.as_str()
            ),
            Self::VisibilityDenied { stage, requested } => write!(
                f,
                "{} notes cannot be made {}",
                stage.as_str(),
                requested.as_str()
            ),
            Self::InvalidEdge(reason) => write!(f, "invalid edge: {reason}"),
            Self::CircleFull {
                circle_id,
                max_members,
            } => write!(f, "circle {circle_id} is full ({max_members} members)"),
            Self::AlreadyMember { circle_id, user_id } => {
                write!(f, "user {user_id} is already a member of circle {circle_id}")
            }
            Self::Forbidden(reason) => write!(f, "forbidden: {reason}"),
            Self::InvalidInput(reason) => write!(f, "invalid input: {reason}"),
            Self::GraphIntegrity(reason) => write!(f, "graph integrity violation: {reason}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for GardenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for GardenError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NoteNotFound(id) => Self::NoteNotFound(id),
            RepoError::CircleNotFound(id) => Self::CircleNotFound(id),
            RepoError::Integrity(reason) => Self::GraphIntegrity(reason),
            RepoError::Validation(NoteValidationError::BodyTooLong {
                stage,
                limit,
                actual,
            }) => Self::ContentLimitExceeded {
                stage,
                limit,
                actual,
            },
            RepoError::Validation(NoteValidationError::VisibilityNotAllowed {
                stage,
                visibility,
            }) => Self::VisibilityDenied {
                stage,
                requested: visibility,
            },
            RepoError::Validation(NoteValidationError::EmptyCircleScope) => {
                Self::InvalidInput("circle visibility needs at least one circle".into())
            }
            other => Self::Repo(other),
        }
    }
}

impl From<StageError> for GardenError {
    fn from(value: StageError) -> Self {
        match value {
            StageError::TransitionDenied { from, to, reason } => {
                Self::StageTransitionDenied { from, to, reason }
            }
            StageError::ContentLimitExceeded {
                stage,
                limit,
                actual,
            } => Self::ContentLimitExceeded {
                stage,
                limit,
                actual,
            },
            StageError::VisibilityDenied { stage, requested } => {
                Self::VisibilityDenied { stage, requested }
            }
            StageError::EdgesNotAllowed { note_id, stage } => Self::InvalidEdge(format!(
                "note {note_id} is a {} and cannot hold edges",
                stage.as_str()
            )),
        }
    }
}
