//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its social/graph projections.
//! - Provide invariant checks used before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `visibility == Garden` implies `stage == Bloom`.
//! - The body never exceeds the active stage's character budget.
//! - `grows_from`, `grows_into`, `grafted_to` are materialized views of
//!   storage relations; writing them on a `Note` value persists nothing.

use crate::model::stage::Stage;
use crate::model::visibility::Visibility;
use crate::model::{now_millis, CircleId, NoteId, UserId};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup tag regex"));

/// One act of another user spending attention on a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TendRecord {
    pub user_id: UserId,
    pub tended_at: DateTime<Utc>,
}

/// Provenance of a grafted note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraftSource {
    /// Note this one was derived from. May no longer exist.
    pub note_id: NoteId,
    /// Owner of the source note at graft time.
    pub user_id: UserId,
    pub grafted_at: DateTime<Utc>,
}

/// One visibility change in a note's transplant log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transplant {
    pub from: Visibility,
    pub to: Visibility,
    pub moved_at: DateTime<Utc>,
}

/// Append-only body snapshot, stored apart from the note row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteVersion {
    pub note_id: NoteId,
    /// 1-based, strictly increasing per note.
    pub seq: u32,
    /// Body as it was before the edit that produced this entry.
    pub content: String,
    pub saved_at: DateTime<Utc>,
}

/// Canonical garden note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Owning user; the only user allowed to mutate the note.
    pub user_id: UserId,
    pub title: String,
    /// Rich-text body, opaque to the engine apart from its length.
    pub content: String,
    pub stage: Stage,
    /// Normalized (trimmed, lowercase), unique, sorted.
    pub tags: Vec<String>,
    pub visibility: Visibility,
    /// Meaningful only when `visibility == Circle`.
    pub shared_with_circles: Vec<CircleId>,
    /// Notes this one descends from.
    pub grows_from: Vec<NoteId>,
    /// Notes that descend from this one.
    pub grows_into: Vec<NoteId>,
    pub word_count: u32,
    /// Incremented on every accepted edit; never decreases.
    pub revisit_count: u32,
    pub last_tended_at: DateTime<Utc>,
    pub revisit_on: Option<DateTime<Utc>>,
    pub tended_by: Vec<TendRecord>,
    pub grafted_from: Option<GraftSource>,
    pub grafted_to: Vec<NoteId>,
    pub transplant_history: Vec<Transplant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new seed note with a generated stable ID.
    ///
    /// # Invariants
    /// - Starts as `Seed` + `Private` with empty graph and social layers.
    /// - `word_count` is derived from `content`.
    pub fn new(
        user_id: impl Into<UserId>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            word_count: count_words(&content),
            content,
            stage: Stage::Seed,
            tags: Vec::new(),
            visibility: Visibility::Private,
            shared_with_circles: Vec::new(),
            grows_from: Vec::new(),
            grows_into: Vec::new(),
            revisit_count: 0,
            last_tended_at: now,
            revisit_on: None,
            tended_by: Vec::new(),
            grafted_from: None,
            grafted_to: Vec::new(),
            transplant_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Body length in characters, as measured against stage budgets.
    pub fn body_chars(&self) -> usize {
        self.content.chars().count()
    }

    /// Combined size of `grows_from` and `grows_into`.
    pub fn edge_count(&self) -> usize {
        self.grows_from.len() + self.grows_into.len()
    }

    /// Number of tend records left by users other than the owner.
    pub fn tends_from_others(&self) -> usize {
        self.tended_by
            .iter()
            .filter(|record| record.user_id != self.user_id)
            .count()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Validates persistence-level invariants.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.id.is_nil() {
            return Err(NoteValidationError::NilId);
        }
        if self.user_id.trim().is_empty() {
            return Err(NoteValidationError::BlankOwner);
        }
        check_stage_rules(
            self.stage,
            self.visibility,
            self.body_chars(),
            self.edge_count(),
        )?;
        Ok(())
    }
}

/// Checks one note state against the stage rules table.
///
/// Shared by [`Note::validate`] and the repository writes that change
/// stage, visibility or body in place.
pub fn check_stage_rules(
    stage: Stage,
    visibility: Visibility,
    body_chars: usize,
    edge_count: usize,
) -> Result<(), NoteValidationError> {
    if !stage.allows_body(body_chars) {
        return Err(NoteValidationError::BodyTooLong {
            stage,
            limit: stage.rules().max_body_chars.unwrap_or(usize::MAX),
            actual: body_chars,
        });
    }
    if !stage.allows_visibility(visibility) {
        return Err(NoteValidationError::VisibilityNotAllowed { stage, visibility });
    }
    if !stage.rules().holds_edges && edge_count > 0 {
        return Err(NoteValidationError::EdgesNotAllowed(stage));
    }
    Ok(())
}

/// Counts whitespace-separated words after stripping markup tags.
pub fn count_words(content: &str) -> u32 {
    let plain = MARKUP_TAG_RE.replace_all(content, " ");
    let words = plain.split_whitespace().count();
    u32::try_from(words).unwrap_or(u32::MAX)
}

/// Invariant violations detected by [`Note::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    NilId,
    BlankOwner,
    BodyTooLong {
        stage: Stage,
        limit: usize,
        actual: usize,
    },
    VisibilityNotAllowed {
        stage: Stage,
        visibility: Visibility,
    },
    EdgesNotAllowed(Stage),
    /// `Circle` visibility requested without any circle to scope it to.
    EmptyCircleScope,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "note id must not be nil"),
            Self::BlankOwner => write!(f, "note owner must not be blank"),
            Self::BodyTooLong {
                stage,
                limit,
                actual,
            } => write!(
                f,
                "{} body allows {limit} characters, got {actual}",
                stage.as_str()
            ),
            Self::VisibilityNotAllowed { stage, visibility } => write!(
                f,
                "{} notes cannot be {}",
                stage.as_str(),
                visibility.as_str()
            ),
            Self::EdgesNotAllowed(stage) => {
                write!(f, "{} notes cannot hold graph edges", stage.as_str())
            }
            Self::EmptyCircleScope => write!(f, "circle visibility needs at least one circle"),
        }
    }
}

impl Error for NoteValidationError {}

#[cfg(test)]
mod tests {
    use super::{count_words, Note, NoteValidationError};
    use crate::model::stage::Stage;
    use crate::model::visibility::Visibility;
    use uuid::Uuid;

    #[test]
    fn new_note_starts_as_private_seed() {
        let note = Note::new("ada", "first", "hello garden");
        assert!(!note.id.is_nil());
        assert_eq!(note.stage, Stage::Seed);
        assert_eq!(note.visibility, Visibility::Private);
        assert_eq!(note.word_count, 2);
        assert_eq!(note.revisit_count, 0);
        assert_eq!(note.created_at, note.updated_at);
        assert!(note.validate().is_ok());
    }

    #[test]
    fn count_words_ignores_markup() {
        assert_eq!(count_words("<p>two <b>words</b></p>"), 2);
        assert_eq!(count_words("   "), 0);
        assert_eq!(count_words("<p></p>"), 0);
    }

    #[test]
    fn validate_rejects_garden_seed() {
        let mut note = Note::new("ada", "t", "body");
        note.visibility = Visibility::Garden;
        assert_eq!(
            note.validate().unwrap_err(),
            NoteValidationError::VisibilityNotAllowed {
                stage: Stage::Seed,
                visibility: Visibility::Garden,
            }
        );
    }

    #[test]
    fn validate_rejects_oversized_seed_body() {
        let note = Note::new("ada", "t", "x".repeat(501));
        assert!(matches!(
            note.validate().unwrap_err(),
            NoteValidationError::BodyTooLong { limit: 500, actual: 501, .. }
        ));
    }

    #[test]
    fn validate_rejects_seed_edges() {
        let mut note = Note::new("ada", "t", "body");
        note.grows_into.push(Uuid::new_v4());
        assert_eq!(
            note.validate().unwrap_err(),
            NoteValidationError::EdgesNotAllowed(Stage::Seed)
        );
    }

    #[test]
    fn tends_from_owner_do_not_count() {
        let mut note = Note::new("ada", "t", "body");
        note.tended_by.push(super::TendRecord {
            user_id: "ada".to_string(),
            tended_at: note.created_at,
        });
        note.tended_by.push(super::TendRecord {
            user_id: "grace".to_string(),
            tended_at: note.created_at,
        });
        assert_eq!(note.tends_from_others(), 1);
    }
}
