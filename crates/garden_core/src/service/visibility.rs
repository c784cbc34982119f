//! Visibility gate: who may view a note.
//!
//! # Responsibility
//! - Answer `can_view(note, viewer)` from the note's visibility setting and,
//!   for circle-scoped notes, the viewer's circle memberships.
//! - Filter note batches while loading memberships only once per batch.
//!
//! # Invariants
//! - Owners always see their own notes.
//! - The gate never mutates notes or circles.

use crate::error::GardenResult;
use crate::model::note::Note;
use crate::model::visibility::Visibility;
use crate::model::CircleId;
use crate::repo::circle_repo::CircleRepository;
use std::collections::BTreeSet;

/// Pure visibility predicate over pre-loaded viewer memberships.
pub fn can_view_with(note: &Note, viewer: &str, viewer_circles: &BTreeSet<CircleId>) -> bool {
    if note.is_owned_by(viewer) {
        return true;
    }
    match note.visibility {
        Visibility::Private => false,
        Visibility::Circle => note
            .shared_with_circles
            .iter()
            .any(|circle_id| viewer_circles.contains(circle_id)),
        Visibility::Garden => true,
    }
}

/// Read-side access checks backed by circle membership storage.
pub struct VisibilityGate<C: CircleRepository> {
    circles: C,
}

impl<C: CircleRepository> VisibilityGate<C> {
    pub fn new(circles: C) -> Self {
        Self { circles }
    }

    /// Ids of every circle the viewer belongs to.
    pub fn viewer_circles(&self, viewer: &str) -> GardenResult<BTreeSet<CircleId>> {
        Ok(self
            .circles
            .circles_containing(viewer)?
            .into_iter()
            .map(|circle| circle.id)
            .collect())
    }

    pub fn can_view(&self, note: &Note, viewer: &str) -> GardenResult<bool> {
        match note.visibility {
            Visibility::Circle if !note.is_owned_by(viewer) => {
                let memberships = self.viewer_circles(viewer)?;
                Ok(can_view_with(note, viewer, &memberships))
            }
            _ => Ok(can_view_with(note, viewer, &BTreeSet::new())),
        }
    }

    /// Keeps only the notes the viewer may see, preserving order.
    pub fn filter_visible(&self, notes: Vec<Note>, viewer: &str) -> GardenResult<Vec<Note>> {
        let memberships = self.viewer_circles(viewer)?;
        Ok(notes
            .into_iter()
            .filter(|note| can_view_with(note, viewer, &memberships))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::can_view_with;
    use crate::model::note::Note;
    use crate::model::stage::Stage;
    use crate::model::visibility::Visibility;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    #[test]
    fn owner_always_sees_private_note() {
        let note = Note::new("ada", "t", "body");
        assert!(can_view_with(&note, "ada", &BTreeSet::new()));
        assert!(!can_view_with(&note, "grace", &BTreeSet::new()));
    }

    #[test]
    fn circle_note_needs_shared_membership() {
        let circle = Uuid::new_v4();
        let mut note = Note::new("ada", "t", "body");
        note.stage = Stage::Sprout;
        note.visibility = Visibility::Circle;
        note.shared_with_circles.push(circle);

        let outsider: BTreeSet<_> = [Uuid::new_v4()].into_iter().collect();
        let member: BTreeSet<_> = [circle].into_iter().collect();
        assert!(!can_view_with(&note, "grace", &outsider));
        assert!(can_view_with(&note, "grace", &member));
    }

    #[test]
    fn garden_note_is_public() {
        let mut note = Note::new("ada", "t", "body");
        note.stage = Stage::Bloom;
        note.visibility = Visibility::Garden;
        assert!(can_view_with(&note, "anyone", &BTreeSet::new()));
    }
}
