//! Stage engine: pure verdicts over the stage rules table.
//!
//! # Responsibility
//! - Decide whether an edit, visibility change, edge or stage move is
//!   allowed for a note, without touching storage.
//! - Plan demotions together with the visibility reset they require.
//!
//! # Invariants
//! - Stages only advance one step at a time, through `check_advance`.
//! - No verdict mutates or truncates input; callers get a typed refusal.

use crate::model::note::Note;
use crate::model::stage::{Stage, BLOOM_MIN_EDGES, BLOOM_MIN_TENDS};
use crate::model::visibility::Visibility;
use crate::model::NoteId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Typed refusal produced by the stage engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    TransitionDenied {
        from: Stage,
        to: Option<Stage>,
        reason: String,
    },
    ContentLimitExceeded {
        stage: Stage,
        limit: usize,
        actual: usize,
    },
    VisibilityDenied {
        stage: Stage,
        requested: Visibility,
    },
    EdgesNotAllowed {
        note_id: NoteId,
        stage: Stage,
    },
}

impl Display for StageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransitionDenied { from, reason, .. } => {
                write!(f, "{} transition denied: {reason}", from.as_str())
            }
            Self::ContentLimitExceeded {
                stage,
                limit,
                actual,
            } => write!(f, "{} limit {limit} exceeded by {actual}", stage.as_str()),
            Self::VisibilityDenied { stage, requested } => {
                write!(f, "{} cannot be {}", stage.as_str(), requested.as_str())
            }
            Self::EdgesNotAllowed { note_id, stage } => {
                write!(f, "{} note {note_id} cannot hold edges", stage.as_str())
            }
        }
    }
}

impl Error for StageError {}

/// Demotion plan: the lower stage plus any visibility reset it forces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Demotion {
    pub stage: Stage,
    pub visibility: Option<Visibility>,
}

/// Checks a body against the stage's character budget.
pub fn check_content(stage: Stage, content: &str) -> Result<(), StageError> {
    let actual = content.chars().count();
    match stage.rules().max_body_chars {
        Some(limit) if actual > limit => Err(StageError::ContentLimitExceeded {
            stage,
            limit,
            actual,
        }),
        _ => Ok(()),
    }
}

/// Checks that the stage may take the requested visibility.
pub fn check_visibility(stage: Stage, requested: Visibility) -> Result<(), StageError> {
    if stage.allows_visibility(requested) {
        Ok(())
    } else {
        Err(StageError::VisibilityDenied { stage, requested })
    }
}

/// Checks that the note's stage may appear in a graph edge.
pub fn check_holds_edges(note: &Note) -> Result<(), StageError> {
    if note.stage.rules().holds_edges {
        Ok(())
    } else {
        Err(StageError::EdgesNotAllowed {
            note_id: note.id,
            stage: note.stage,
        })
    }
}

/// Returns the stage the note may advance to.
///
/// - `seed -> sprout` requires a non-empty body.
/// - `sprout -> bloom` requires `edge_count >= 3` and at least one tend
///   from another user.
/// - `bloom` is terminal.
pub fn check_advance(note: &Note, edge_count: usize) -> Result<Stage, StageError> {
    let from = note.stage;
    let Some(to) = from.next() else {
        return Err(StageError::TransitionDenied {
            from,
            to: None,
            reason: "bloom is the final stage".to_string(),
        });
    };

    match to {
        Stage::Sprout if note.content.is_empty() => Err(StageError::TransitionDenied {
            from,
            to: Some(to),
            reason: "seed body is empty".to_string(),
        }),
        Stage::Bloom => {
            let tends = note.tends_from_others();
            if edge_count < BLOOM_MIN_EDGES || tends < BLOOM_MIN_TENDS {
                return Err(StageError::TransitionDenied {
                    from,
                    to: Some(to),
                    reason: format!(
                        "needs {BLOOM_MIN_EDGES} connections and {BLOOM_MIN_TENDS} tend from another gardener, has {edge_count} and {tends}"
                    ),
                });
            }
            Ok(to)
        }
        _ => Ok(to),
    }
}

/// Plans a one-step demotion.
///
/// - `bloom -> sprout`: `garden` falls back to `private`. A garden note
///   carries no circle scope, so there is nothing to narrow back to.
/// - `sprout -> seed`: `circle` falls back to `private`; denied while the
///   body exceeds the seed budget or the note still holds edges.
pub fn plan_demotion(note: &Note, edge_count: usize) -> Result<Demotion, StageError> {
    let from = note.stage;
    let Some(to) = from.previous() else {
        return Err(StageError::TransitionDenied {
            from,
            to: None,
            reason: "seed is the first stage".to_string(),
        });
    };

    if let Err(StageError::ContentLimitExceeded { limit, actual, .. }) =
        check_content(to, &note.content)
    {
        return Err(StageError::TransitionDenied {
            from,
            to: Some(to),
            reason: format!("body has {actual} characters, {} allows {limit}", to.as_str()),
        });
    }
    if !to.rules().holds_edges && edge_count > 0 {
        return Err(StageError::TransitionDenied {
            from,
            to: Some(to),
            reason: format!("note still holds {edge_count} connection(s)"),
        });
    }

    let visibility = if to.allows_visibility(note.visibility) {
        None
    } else {
        Some(Visibility::Private)
    };

    Ok(Demotion {
        stage: to,
        visibility,
    })
}
