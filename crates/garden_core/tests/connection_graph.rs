use garden_core::db::open_db_in_memory;
use garden_core::{
    CirclesRegistry, ConnectionGraph, GardenError, Note, NoteEdit, NoteService,
    SqliteCircleRepository, SqliteGraphRepository, SqliteNoteRepository, Visibility,
    VisibilityGate,
};
use rusqlite::Connection;

struct Garden<'c> {
    notes: NoteService<SqliteNoteRepository<'c>, SqliteGraphRepository<'c>>,
    graph: ConnectionGraph<SqliteNoteRepository<'c>, SqliteGraphRepository<'c>>,
    circles: CirclesRegistry<SqliteCircleRepository<'c>>,
    circle_repo: SqliteCircleRepository<'c>,
    gate: VisibilityGate<SqliteCircleRepository<'c>>,
}

impl<'c> Garden<'c> {
    fn new(conn: &'c Connection) -> Self {
        let notes = SqliteNoteRepository::new(conn);
        let graph = SqliteGraphRepository::new(conn);
        let circle_repo = SqliteCircleRepository::new(conn);
        Self {
            notes: NoteService::new(notes, graph),
            graph: ConnectionGraph::new(notes, graph),
            circles: CirclesRegistry::new(circle_repo),
            circle_repo,
            gate: VisibilityGate::new(circle_repo),
        }
    }

    fn sprout(&self, owner: &str, title: &str) -> Note {
        let seed = self.notes.create_note(owner, title, "growing").unwrap();
        self.notes.advance_stage(seed.id, owner).unwrap()
    }

    fn reload(&self, note: &Note) -> Note {
        self.notes.get_note(note.id).unwrap()
    }
}

#[test]
fn add_edge_updates_both_sides() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let a = garden.sprout("ada", "a");
    let b = garden.sprout("ada", "b");

    assert!(garden.graph.add_edge(a.id, b.id, "ada", &garden.gate).unwrap());
    assert!(!garden.graph.add_edge(a.id, b.id, "ada", &garden.gate).unwrap());

    let a = garden.reload(&a);
    let b = garden.reload(&b);
    assert_eq!(a.grows_into, vec![b.id]);
    assert!(a.grows_from.is_empty());
    assert_eq!(b.grows_from, vec![a.id]);
    assert_eq!(garden.graph.edge_count(a.id).unwrap(), 1);
    assert_eq!(garden.graph.edge_count(b.id).unwrap(), 1);
}

#[test]
fn invalid_edges_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let a = garden.sprout("ada", "a");
    let seed = garden.notes.create_note("ada", "seed", "tiny").unwrap();

    assert!(matches!(
        garden.graph.add_edge(a.id, a.id, "ada", &garden.gate),
        Err(GardenError::InvalidEdge(_))
    ));
    assert!(matches!(
        garden.graph.add_edge(a.id, seed.id, "ada", &garden.gate),
        Err(GardenError::InvalidEdge(_))
    ));
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        garden.graph.add_edge(a.id, missing, "ada", &garden.gate),
        Err(GardenError::InvalidEdge(_))
    ));
    assert_eq!(garden.graph.edge_count(a.id).unwrap(), 0);
}

#[test]
fn linking_requires_ownership_and_visibility() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let ada_one = garden.sprout("ada", "one");
    let ada_two = garden.sprout("ada", "two");
    let grace_note = garden.sprout("grace", "reply");

    assert!(matches!(
        garden.graph.add_edge(ada_one.id, ada_two.id, "grace", &garden.gate),
        Err(GardenError::Forbidden(_))
    ));
    assert!(matches!(
        garden.graph.add_edge(ada_one.id, grace_note.id, "grace", &garden.gate),
        Err(GardenError::Forbidden(_))
    ));

    let circle = garden.circles.create("pair", "", "ada", None).unwrap();
    garden.circles.add_member(circle.id, "grace").unwrap();
    garden
        .notes
        .set_visibility(
            ada_one.id,
            "ada",
            Visibility::Circle,
            &[circle.id],
            &garden.circle_repo,
        )
        .unwrap();

    assert!(garden
        .graph
        .add_edge(ada_one.id, grace_note.id, "grace", &garden.gate)
        .unwrap());
    assert!(garden
        .graph
        .remove_edge(ada_one.id, grace_note.id, "grace", &garden.gate)
        .unwrap());
    assert!(!garden
        .graph
        .remove_edge(ada_one.id, grace_note.id, "grace", &garden.gate)
        .unwrap());
}

#[test]
fn remove_node_strips_every_peer() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let hub = garden.sprout("ada", "hub");
    let parent = garden.sprout("ada", "parent");
    let child = garden.sprout("ada", "child");
    garden.graph.add_edge(parent.id, hub.id, "ada", &garden.gate).unwrap();
    garden.graph.add_edge(hub.id, child.id, "ada", &garden.gate).unwrap();
    garden.graph.add_edge(parent.id, child.id, "ada", &garden.gate).unwrap();

    garden.graph.remove_node(hub.id).unwrap();

    assert!(matches!(
        garden.notes.get_note(hub.id),
        Err(GardenError::NoteNotFound(_))
    ));
    let parent = garden.reload(&parent);
    let child = garden.reload(&child);
    assert_eq!(parent.grows_into, vec![child.id]);
    assert_eq!(child.grows_from, vec![parent.id]);
    for note in [&parent, &child] {
        assert!(!note.grows_from.contains(&hub.id));
        assert!(!note.grows_into.contains(&hub.id));
    }
}

#[test]
fn dangling_edge_aborts_node_removal() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let a = garden.sprout("ada", "a");
    let b = garden.sprout("ada", "b");
    garden.graph.add_edge(a.id, b.id, "ada", &garden.gate).unwrap();

    conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
    conn.execute("DELETE FROM notes WHERE id = ?1;", [b.id.to_string()])
        .unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();

    let err = garden.graph.remove_node(a.id).unwrap_err();
    assert!(matches!(err, GardenError::GraphIntegrity(_)));

    let a = garden.reload(&a);
    assert_eq!(a.grows_into, vec![b.id]);
}

#[test]
fn connected_notes_are_local_and_filtered() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let center = garden.sprout("ada", "center");
    let upstream = garden.sprout("ada", "upstream");
    let downstream = garden.sprout("ada", "downstream");
    let far = garden.sprout("ada", "far");
    garden.graph.add_edge(upstream.id, center.id, "ada", &garden.gate).unwrap();
    garden.graph.add_edge(center.id, downstream.id, "ada", &garden.gate).unwrap();
    garden.graph.add_edge(downstream.id, far.id, "ada", &garden.gate).unwrap();

    let mut ids: Vec<_> = garden
        .graph
        .connected_notes(center.id, "ada", &garden.gate)
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    ids.sort();
    let mut expected = vec![upstream.id, downstream.id];
    expected.sort();
    assert_eq!(ids, expected);

    assert!(matches!(
        garden.graph.connected_notes(center.id, "grace", &garden.gate),
        Err(GardenError::NoteNotFound(_))
    ));

    let circle = garden.circles.create("readers", "", "ada", None).unwrap();
    garden.circles.add_member(circle.id, "grace").unwrap();
    for note in [&center, &downstream] {
        garden
            .notes
            .set_visibility(
                note.id,
                "ada",
                Visibility::Circle,
                &[circle.id],
                &garden.circle_repo,
            )
            .unwrap();
    }
    let seen: Vec<_> = garden
        .graph
        .connected_notes(center.id, "grace", &garden.gate)
        .unwrap()
        .into_iter()
        .map(|note| note.id)
        .collect();
    assert_eq!(seen, vec![downstream.id]);
}

#[test]
fn demotion_to_seed_requires_no_edges() {
    let conn = open_db_in_memory().unwrap();
    let garden = Garden::new(&conn);
    let a = garden.sprout("ada", "a");
    let b = garden.sprout("ada", "b");
    garden.graph.add_edge(a.id, b.id, "ada", &garden.gate).unwrap();

    assert!(matches!(
        garden.notes.demote_stage(a.id, "ada"),
        Err(GardenError::StageTransitionDenied { .. })
    ));
    garden.graph.remove_edge(a.id, b.id, "ada", &garden.gate).unwrap();
    let seed = garden.notes.demote_stage(a.id, "ada").unwrap();
    assert_eq!(seed.stage, garden_core::Stage::Seed);

    let edit = garden
        .notes
        .update_note(seed.id, "ada", NoteEdit::content("still short"))
        .unwrap();
    assert_eq!(edit.revisit_count, 1);
}
