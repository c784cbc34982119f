//! Note use-case service (the note store facade).
//!
//! # Responsibility
//! - Create, edit, read, list and delete notes on behalf of one actor.
//! - Route every stage move and visibility change through the stage
//!   engine before storage accepts it.
//! - Record social actions: tends, grafts and scheduled revisits.
//!
//! # Invariants
//! - Only the owner mutates a note; other actors get `Forbidden`.
//! - Edits never truncate: an over-budget body fails with
//!   `ContentLimitExceeded` and storage is left untouched.
//! - Each accepted edit increments `revisit_count` exactly once.
//!
//! # See also
//! - `stage_engine` for the rules table verdicts.
//! - `graph_service` for edge mutation.

use crate::error::{GardenError, GardenResult};
use crate::model::note::{count_words, GraftSource, Note, NoteVersion, TendRecord};
use crate::model::stage::Stage;
use crate::model::visibility::Visibility;
use crate::model::{now_millis, truncate_to_millis, CircleId, NoteId};
use crate::repo::circle_repo::CircleRepository;
use crate::repo::graph_repo::GraphRepository;
use crate::repo::note_repo::{
    normalize_tag, normalize_tags, NoteListQuery, NoteRepository, NoteWrite, StageChange,
};
use crate::service::stage_engine::{self, StageError};
use crate::service::visibility::VisibilityGate;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

/// Partial edit; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    /// Replaces the whole tag set when present.
    pub tags: Option<Vec<String>>,
}

impl NoteEdit {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Some(tags.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

/// Note service facade over note and graph repositories.
pub struct NoteService<N: NoteRepository, G: GraphRepository> {
    notes: N,
    graph: G,
}

impl<N: NoteRepository, G: GraphRepository> NoteService<N, G> {
    pub fn new(notes: N, graph: G) -> Self {
        Self { notes, graph }
    }

    /// Creates a private seed owned by `owner`.
    pub fn create_note(
        &self,
        owner: &str,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> GardenResult<Note> {
        if owner.trim().is_empty() {
            return Err(GardenError::InvalidInput("note owner must not be blank".into()));
        }
        let content = content.into();
        if let Err(err) = stage_engine::check_content(Stage::Seed, &content) {
            log_content_denied("note_create", None, &err);
            return Err(err.into());
        }

        let note = Note::new(owner, title, content);
        let id = self.notes.create_note(&note)?;
        info!(
            "event=note_create module=note status=ok note_id={} word_count={}",
            id, note.word_count
        );
        self.load(id)
    }

    pub fn get_note(&self, id: NoteId) -> GardenResult<Note> {
        self.load(id)
    }

    /// Gets one note as seen by `viewer`; hidden notes read as missing.
    pub fn get_note_for<C: CircleRepository>(
        &self,
        id: NoteId,
        viewer: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<Note> {
        let note = self.load(id)?;
        if gate.can_view(&note, viewer)? {
            Ok(note)
        } else {
            Err(GardenError::NoteNotFound(id))
        }
    }

    /// Lists notes ordered by `updated_at DESC, id ASC`.
    pub fn list_notes(&self, query: &NoteListQuery) -> GardenResult<Vec<Note>> {
        let mut query = query.clone();
        query.tag = query.tag.as_deref().and_then(normalize_tag);
        Ok(self.notes.list_notes(&query)?)
    }

    /// Lists notes and drops those `viewer` may not see.
    pub fn list_visible<C: CircleRepository>(
        &self,
        query: &NoteListQuery,
        viewer: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<Vec<Note>> {
        let notes = self.list_notes(query)?;
        gate.filter_visible(notes, viewer)
    }

    /// Applies a partial edit under the active stage's budget.
    pub fn update_note(&self, id: NoteId, actor: &str, edit: NoteEdit) -> GardenResult<Note> {
        let note = self.load_owned(id, actor, "note_update")?;
        let content = edit.content.unwrap_or_else(|| note.content.clone());
        if let Err(err) = stage_engine::check_content(note.stage, &content) {
            log_content_denied("note_update", Some(id), &err);
            return Err(err.into());
        }

        let tags = match edit.tags {
            Some(tags) => {
                if let Some(blank) = tags.iter().find(|tag| tag.trim().is_empty()) {
                    return Err(GardenError::InvalidInput(format!("invalid tag: `{blank}`")));
                }
                normalize_tags(&tags)
            }
            None => note.tags.clone(),
        };

        let write = NoteWrite {
            title: edit.title.unwrap_or(note.title),
            word_count: count_words(&content),
            content,
            tags,
            at: now_millis(),
        };
        self.notes.update_note(id, &write)?;
        info!(
            "event=note_update module=note status=ok note_id={} stage={} word_count={}",
            id,
            note.stage.as_str(),
            write.word_count
        );
        self.load(id)
    }

    /// Advances the note one stage forward.
    pub fn advance_stage(&self, id: NoteId, actor: &str) -> GardenResult<Note> {
        let note = self.load_owned(id, actor, "note_advance")?;
        let edge_count = self.graph.edge_count(id)?;
        let target = match stage_engine::check_advance(&note, edge_count) {
            Ok(target) => target,
            Err(err) => {
                log_transition_denied("note_advance", id, &err);
                return Err(err.into());
            }
        };

        self.notes.change_stage(
            id,
            &StageChange {
                stage: target,
                visibility: None,
                at: now_millis(),
            },
        )?;
        info!(
            "event=note_advance module=note status=ok note_id={} from={} to={} edge_count={}",
            id,
            note.stage.as_str(),
            target.as_str(),
            edge_count
        );
        self.load(id)
    }

    /// Moves the note one stage back, resetting visibility it no longer
    /// qualifies for.
    pub fn demote_stage(&self, id: NoteId, actor: &str) -> GardenResult<Note> {
        let note = self.load_owned(id, actor, "note_demote")?;
        let edge_count = self.graph.edge_count(id)?;
        let plan = match stage_engine::plan_demotion(&note, edge_count) {
            Ok(plan) => plan,
            Err(err) => {
                log_transition_denied("note_demote", id, &err);
                return Err(err.into());
            }
        };

        self.notes.change_stage(
            id,
            &StageChange {
                stage: plan.stage,
                visibility: plan.visibility,
                at: now_millis(),
            },
        )?;
        info!(
            "event=note_demote module=note status=ok note_id={} from={} to={} visibility={}",
            id,
            note.stage.as_str(),
            plan.stage.as_str(),
            plan.visibility.unwrap_or(note.visibility).as_str()
        );
        self.load(id)
    }

    /// Changes visibility (a transplant) after the stage check.
    ///
    /// `circles` must name at least one existing circle when `visibility`
    /// is `Circle` and is ignored otherwise.
    pub fn set_visibility<C: CircleRepository>(
        &self,
        id: NoteId,
        actor: &str,
        visibility: Visibility,
        circles: &[CircleId],
        registry: &C,
    ) -> GardenResult<Note> {
        let note = self.load_owned(id, actor, "note_transplant")?;
        if let Err(err) = stage_engine::check_visibility(note.stage, visibility) {
            warn!(
                "event=note_transplant module=note status=denied note_id={} stage={} requested={}",
                id,
                note.stage.as_str(),
                visibility.as_str()
            );
            return Err(err.into());
        }

        let mut scope: Vec<CircleId> = Vec::new();
        if visibility == Visibility::Circle {
            if circles.is_empty() {
                return Err(GardenError::InvalidInput(
                    "circle visibility needs at least one circle".into(),
                ));
            }
            for circle_id in circles {
                if registry.get_circle(*circle_id)?.is_none() {
                    return Err(GardenError::CircleNotFound(*circle_id));
                }
                if !scope.contains(circle_id) {
                    scope.push(*circle_id);
                }
            }
        }

        self.notes.set_visibility(id, visibility, &scope, now_millis())?;
        info!(
            "event=note_transplant module=note status=ok note_id={} from={} to={} circles={}",
            id,
            note.visibility.as_str(),
            visibility.as_str(),
            scope.len()
        );
        self.load(id)
    }

    /// Records `tender` spending attention on someone else's note.
    pub fn tend<C: CircleRepository>(
        &self,
        id: NoteId,
        tender: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<Note> {
        let note = self.load(id)?;
        if note.is_owned_by(tender) {
            return Err(GardenError::Forbidden(format!(
                "owners cannot tend their own note {id}"
            )));
        }
        if !gate.can_view(&note, tender)? {
            warn!("event=note_tend module=note status=denied reason=not_visible note_id={id}");
            return Err(GardenError::Forbidden(format!("note {id} is not visible to tender")));
        }

        self.notes.add_tend(
            id,
            &TendRecord {
                user_id: tender.to_string(),
                tended_at: now_millis(),
            },
        )?;
        info!(
            "event=note_tend module=note status=ok note_id={} tends={}",
            id,
            note.tended_by.len() + 1
        );
        self.load(id)
    }

    /// Derives a new seed for `grafter` from someone else's note.
    ///
    /// The graft carries the source title and an empty body; the source's
    /// `grafted_to` picks it up on the next read.
    pub fn graft<C: CircleRepository>(
        &self,
        source_id: NoteId,
        grafter: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<Note> {
        if grafter.trim().is_empty() {
            return Err(GardenError::InvalidInput("grafter must not be blank".into()));
        }
        let source = self.load(source_id)?;
        if source.is_owned_by(grafter) {
            return Err(GardenError::Forbidden(format!(
                "owners cannot graft their own note {source_id}"
            )));
        }
        if !gate.can_view(&source, grafter)? {
            warn!(
                "event=note_graft module=note status=denied reason=not_visible note_id={source_id}"
            );
            return Err(GardenError::Forbidden(format!(
                "note {source_id} is not visible to grafter"
            )));
        }

        let mut graft = Note::new(grafter, source.title.clone(), "");
        graft.grafted_from = Some(GraftSource {
            note_id: source.id,
            user_id: source.user_id.clone(),
            grafted_at: graft.created_at,
        });
        let id = self.notes.create_note(&graft)?;
        info!("event=note_graft module=note status=ok note_id={id} source_id={source_id}");
        self.load(id)
    }

    /// Sets or clears the date the owner wants to return to the note.
    pub fn schedule_revisit(
        &self,
        id: NoteId,
        actor: &str,
        revisit_on: Option<DateTime<Utc>>,
    ) -> GardenResult<Note> {
        self.load_owned(id, actor, "note_schedule")?;
        self.notes
            .set_revisit_on(id, revisit_on.map(truncate_to_millis))?;
        debug!(
            "event=note_schedule module=note status=ok note_id={} scheduled={}",
            id,
            revisit_on.is_some()
        );
        self.load(id)
    }

    /// Returns the owner's version history, oldest first.
    pub fn list_versions(&self, id: NoteId, actor: &str) -> GardenResult<Vec<NoteVersion>> {
        self.load_owned(id, actor, "note_versions")?;
        Ok(self.notes.list_versions(id)?)
    }

    /// Deletes the note and every edge touching it.
    pub fn delete_note(&self, id: NoteId, actor: &str) -> GardenResult<()> {
        self.load_owned(id, actor, "note_delete")?;
        self.graph.remove_node(id)?;
        info!("event=note_delete module=note status=ok note_id={id}");
        Ok(())
    }

    fn load(&self, id: NoteId) -> GardenResult<Note> {
        self.notes
            .get_note(id)?
            .ok_or(GardenError::NoteNotFound(id))
    }

    fn load_owned(&self, id: NoteId, actor: &str, event: &str) -> GardenResult<Note> {
        let note = self.load(id)?;
        if !note.is_owned_by(actor) {
            warn!("event={event} module=note status=denied reason=not_owner note_id={id}");
            return Err(GardenError::Forbidden(format!(
                "user `{actor}` does not own note {id}"
            )));
        }
        Ok(note)
    }
}

fn log_content_denied(event: &str, id: Option<NoteId>, err: &StageError) {
    if let StageError::ContentLimitExceeded {
        stage,
        limit,
        actual,
    } = err
    {
        let note_id = id.map(|id| id.to_string()).unwrap_or_else(|| "new".into());
        warn!(
            "event={event} module=note status=denied error_code=content_limit note_id={note_id} stage={} limit={limit} actual={actual}",
            stage.as_str()
        );
    }
}

fn log_transition_denied(event: &str, id: NoteId, err: &StageError) {
    info!("event={event} module=note status=denied note_id={id} reason=\"{err}\"");
}
