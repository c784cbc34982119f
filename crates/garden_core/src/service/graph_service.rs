//! Connection graph use-cases: edges between notes and local discovery.
//!
//! # Responsibility
//! - Validate and authorize edge mutations before the graph repository
//!   applies them atomically.
//! - Serve `connected_notes`: direct neighbours only, filtered for the
//!   reader. There is no transitive expansion.
//!
//! # Invariants
//! - Self-edges, edges to missing notes and edges touching seeds are
//!   rejected with `InvalidEdge`.
//! - An actor must own one endpoint and be able to view the other.

use crate::error::{GardenError, GardenResult};
use crate::model::note::Note;
use crate::model::{now_millis, NoteId};
use crate::repo::circle_repo::CircleRepository;
use crate::repo::graph_repo::GraphRepository;
use crate::repo::note_repo::NoteRepository;
use crate::service::stage_engine;
use crate::service::visibility::VisibilityGate;
use log::{debug, error, info, warn};

/// Graph facade over note and edge repositories.
pub struct ConnectionGraph<N: NoteRepository, G: GraphRepository> {
    notes: N,
    graph: G,
}

impl<N: NoteRepository, G: GraphRepository> ConnectionGraph<N, G> {
    pub fn new(notes: N, graph: G) -> Self {
        Self { notes, graph }
    }

    /// Records that `to` grows from `from`.
    ///
    /// Returns `false` when the edge already existed.
    pub fn add_edge<C: CircleRepository>(
        &self,
        from: NoteId,
        to: NoteId,
        actor: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<bool> {
        if from == to {
            warn!(
                "event=graph_add_edge module=graph status=denied reason=self_edge note_id={from}"
            );
            return Err(GardenError::InvalidEdge(format!(
                "note {from} cannot grow from itself"
            )));
        }
        let from_note = self.load_endpoint(from)?;
        let to_note = self.load_endpoint(to)?;
        for note in [&from_note, &to_note] {
            if let Err(err) = stage_engine::check_holds_edges(note) {
                warn!(
                    "event=graph_add_edge module=graph status=denied reason=stage note_id={} stage={}",
                    note.id,
                    note.stage.as_str()
                );
                return Err(err.into());
            }
        }
        authorize(&from_note, &to_note, actor, gate, "graph_add_edge")?;

        let added = self.graph.add_edge(from, to, now_millis())?;
        info!(
            "event=graph_add_edge module=graph status=ok from_id={} to_id={} added={}",
            from, to, added
        );
        Ok(added)
    }

    /// Removes one edge. Returns `false` when it did not exist.
    pub fn remove_edge<C: CircleRepository>(
        &self,
        from: NoteId,
        to: NoteId,
        actor: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<bool> {
        let from_note = self.load(from)?;
        let to_note = self.load(to)?;
        authorize(&from_note, &to_note, actor, gate, "graph_remove_edge")?;

        let removed = self.graph.remove_edge(from, to)?;
        info!(
            "event=graph_remove_edge module=graph status=ok from_id={} to_id={} removed={}",
            from, to, removed
        );
        Ok(removed)
    }

    /// Deletes the note and strips it from every peer.
    ///
    /// A dangling edge aborts the removal with `GraphIntegrity`.
    pub fn remove_node(&self, id: NoteId) -> GardenResult<()> {
        match self.graph.remove_node(id) {
            Ok(()) => {
                info!("event=graph_remove_node module=graph status=ok note_id={id}");
                Ok(())
            }
            Err(err) => {
                let err = GardenError::from(err);
                if matches!(err, GardenError::GraphIntegrity(_)) {
                    error!(
                        "event=graph_remove_node module=graph status=error note_id={id} rolled_back=true"
                    );
                }
                Err(err)
            }
        }
    }

    /// Direct neighbours of `id` in both directions that `viewer` may see.
    ///
    /// A hidden origin reads as missing so its existence is not leaked.
    pub fn connected_notes<C: CircleRepository>(
        &self,
        id: NoteId,
        viewer: &str,
        gate: &VisibilityGate<C>,
    ) -> GardenResult<Vec<Note>> {
        let origin = self.load(id)?;
        if !gate.can_view(&origin, viewer)? {
            return Err(GardenError::NoteNotFound(id));
        }

        let peer_ids = self.graph.neighbors(id)?;
        let mut peers = Vec::with_capacity(peer_ids.len());
        for peer_id in peer_ids {
            match self.notes.get_note(peer_id)? {
                Some(peer) => peers.push(peer),
                None => {
                    error!(
                        "event=graph_neighbors module=graph status=error error_code=dangling_edge note_id={id} peer_id={peer_id}"
                    );
                    return Err(GardenError::GraphIntegrity(format!(
                        "note {id} links to missing note {peer_id}"
                    )));
                }
            }
        }

        let total = peers.len();
        let visible = gate.filter_visible(peers, viewer)?;
        debug!(
            "event=graph_neighbors module=graph status=ok note_id={} neighbours={} visible={}",
            id,
            total,
            visible.len()
        );
        Ok(visible)
    }

    /// Combined `grows_from + grows_into` size.
    pub fn edge_count(&self, id: NoteId) -> GardenResult<usize> {
        self.load(id)?;
        Ok(self.graph.edge_count(id)?)
    }

    fn load_endpoint(&self, id: NoteId) -> GardenResult<Note> {
        match self.notes.get_note(id)? {
            Some(note) => Ok(note),
            None => {
                warn!(
                    "event=graph_add_edge module=graph status=denied reason=missing_note note_id={id}"
                );
                Err(GardenError::InvalidEdge(format!("note {id} does not exist")))
            }
        }
    }

    fn load(&self, id: NoteId) -> GardenResult<Note> {
        self.notes
            .get_note(id)?
            .ok_or(GardenError::NoteNotFound(id))
    }
}

fn authorize<C: CircleRepository>(
    from: &Note,
    to: &Note,
    actor: &str,
    gate: &VisibilityGate<C>,
    event: &str,
) -> GardenResult<()> {
    let other = if from.is_owned_by(actor) {
        to
    } else if to.is_owned_by(actor) {
        from
    } else {
        warn!(
            "event={event} module=graph status=denied reason=not_owner from_id={} to_id={}",
            from.id, to.id
        );
        return Err(GardenError::Forbidden(format!(
            "user `{actor}` owns neither {} nor {}",
            from.id, to.id
        )));
    };
    if !gate.can_view(other, actor)? {
        warn!(
            "event={event} module=graph status=denied reason=not_visible note_id={}",
            other.id
        );
        return Err(GardenError::Forbidden(format!(
            "note {} is not visible to user `{actor}`",
            other.id
        )));
    }
    Ok(())
}
