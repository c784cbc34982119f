use garden_core::db::open_db_in_memory;
use garden_core::{
    CirclesRegistry, GardenError, NoteService, SqliteCircleRepository, SqliteGraphRepository,
    SqliteNoteRepository, Visibility, VisibilityGate,
};

#[test]
fn creator_is_first_member_and_input_is_checked() {
    let conn = open_db_in_memory().unwrap();
    let registry = CirclesRegistry::new(SqliteCircleRepository::new(&conn));

    let circle = registry.create("  poets ", "weekly swap", "ada", None).unwrap();
    assert_eq!(circle.name, "poets");
    assert_eq!(circle.members, vec!["ada".to_string()]);
    assert_eq!(circle.max_members, 12);
    assert_eq!(circle.created_by, "ada");

    assert!(matches!(
        registry.create("   ", "", "ada", None),
        Err(GardenError::InvalidInput(_))
    ));
    assert!(matches!(
        registry.create("empty", "", "ada", Some(0)),
        Err(GardenError::InvalidInput(_))
    ));
}

#[test]
fn configured_default_capacity_applies() {
    let conn = open_db_in_memory().unwrap();
    let registry = CirclesRegistry::with_default_capacity(SqliteCircleRepository::new(&conn), 3);
    let circle = registry.create("trio", "", "ada", None).unwrap();
    assert_eq!(circle.max_members, 3);
}

#[test]
fn membership_is_bounded_and_unique() {
    let conn = open_db_in_memory().unwrap();
    let registry = CirclesRegistry::new(SqliteCircleRepository::new(&conn));
    let circle = registry.create("pair", "", "ada", Some(2)).unwrap();

    let joined = registry.add_member(circle.id, "grace").unwrap();
    assert_eq!(joined.members, vec!["ada".to_string(), "grace".to_string()]);

    match registry.add_member(circle.id, "grace") {
        Err(GardenError::AlreadyMember { circle_id, user_id }) => {
            assert_eq!(circle_id, circle.id);
            assert_eq!(user_id, "grace");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    match registry.add_member(circle.id, "linus") {
        Err(GardenError::CircleFull { max_members, .. }) => assert_eq!(max_members, 2),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(registry.members_of(circle.id).unwrap().len(), 2);

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        registry.add_member(missing, "grace"),
        Err(GardenError::CircleNotFound(id)) if id == missing
    ));
}

#[test]
fn creator_cannot_rejoin_and_single_seat_circle_starts_full() {
    let conn = open_db_in_memory().unwrap();
    let registry = CirclesRegistry::new(SqliteCircleRepository::new(&conn));

    let circle = registry.create("poets", "", "ada", None).unwrap();
    assert!(matches!(
        registry.add_member(circle.id, "ada"),
        Err(GardenError::AlreadyMember { .. })
    ));

    let solo = registry.create("solo", "", "ada", Some(1)).unwrap();
    match registry.add_member(solo.id, "grace") {
        Err(GardenError::CircleFull {
            circle_id,
            max_members,
        }) => {
            assert_eq!(circle_id, solo.id);
            assert_eq!(max_members, 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(registry.members_of(solo.id).unwrap(), vec!["ada".to_string()]);
}

#[test]
fn removal_is_idempotent_and_may_empty_circle() {
    let conn = open_db_in_memory().unwrap();
    let registry = CirclesRegistry::new(SqliteCircleRepository::new(&conn));
    let circle = registry.create("solo", "", "ada", None).unwrap();
    registry.add_member(circle.id, "grace").unwrap();

    registry.remove_member(circle.id, "grace").unwrap();
    let again = registry.remove_member(circle.id, "grace").unwrap();
    assert_eq!(again.members, vec!["ada".to_string()]);

    let empty = registry.remove_member(circle.id, "ada").unwrap();
    assert!(empty.members.is_empty());
    assert!(registry.circles_containing("ada").unwrap().is_empty());
}

#[test]
fn circles_containing_lists_memberships() {
    let conn = open_db_in_memory().unwrap();
    let registry = CirclesRegistry::new(SqliteCircleRepository::new(&conn));
    let first = registry.create("first", "", "ada", None).unwrap();
    let second = registry.create("second", "", "grace", None).unwrap();
    registry.add_member(second.id, "ada").unwrap();

    let ids: Vec<_> = registry
        .circles_containing("ada")
        .unwrap()
        .into_iter()
        .map(|circle| circle.id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&first.id));
    assert!(ids.contains(&second.id));
    assert_eq!(registry.circles_containing("grace").unwrap().len(), 1);
}

#[test]
fn circle_visibility_follows_membership() {
    let conn = open_db_in_memory().unwrap();
    let circle_repo = SqliteCircleRepository::new(&conn);
    let registry = CirclesRegistry::new(circle_repo);
    let gate = VisibilityGate::new(circle_repo);
    let notes = NoteService::new(
        SqliteNoteRepository::new(&conn),
        SqliteGraphRepository::new(&conn),
    );

    let seed = notes.create_note("ada", "circle piece", "words").unwrap();
    let note = notes.advance_stage(seed.id, "ada").unwrap();
    let circle = registry.create("readers", "", "ada", None).unwrap();
    registry.add_member(circle.id, "grace").unwrap();
    let shared = notes
        .set_visibility(note.id, "ada", Visibility::Circle, &[circle.id, circle.id], &circle_repo)
        .unwrap();
    assert_eq!(shared.shared_with_circles, vec![circle.id]);

    assert!(gate.can_view(&shared, "ada").unwrap());
    assert!(gate.can_view(&shared, "grace").unwrap());
    assert!(!gate.can_view(&shared, "linus").unwrap());

    registry.remove_member(circle.id, "grace").unwrap();
    assert!(!gate.can_view(&shared, "grace").unwrap());
}

#[test]
fn circle_visibility_needs_existing_circles() {
    let conn = open_db_in_memory().unwrap();
    let circle_repo = SqliteCircleRepository::new(&conn);
    let notes = NoteService::new(
        SqliteNoteRepository::new(&conn),
        SqliteGraphRepository::new(&conn),
    );
    let seed = notes.create_note("ada", "t", "words").unwrap();

    assert!(matches!(
        notes.set_visibility(seed.id, "ada", Visibility::Circle, &[], &circle_repo),
        Err(GardenError::VisibilityDenied { .. })
    ));

    let note = notes.advance_stage(seed.id, "ada").unwrap();
    assert!(matches!(
        notes.set_visibility(note.id, "ada", Visibility::Circle, &[], &circle_repo),
        Err(GardenError::InvalidInput(_))
    ));
    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        notes.set_visibility(note.id, "ada", Visibility::Circle, &[missing], &circle_repo),
        Err(GardenError::CircleNotFound(id)) if id == missing
    ));
    assert!(matches!(
        notes.set_visibility(note.id, "grace", Visibility::Private, &[], &circle_repo),
        Err(GardenError::Forbidden(_))
    ));
}

#[test]
fn private_visibility_clears_circle_scope() {
    let conn = open_db_in_memory().unwrap();
    let circle_repo = SqliteCircleRepository::new(&conn);
    let registry = CirclesRegistry::new(circle_repo);
    let notes = NoteService::new(
        SqliteNoteRepository::new(&conn),
        SqliteGraphRepository::new(&conn),
    );
    let seed = notes.create_note("ada", "t", "words").unwrap();
    let note = notes.advance_stage(seed.id, "ada").unwrap();
    let circle = registry.create("readers", "", "ada", None).unwrap();

    notes
        .set_visibility(note.id, "ada", Visibility::Circle, &[circle.id], &circle_repo)
        .unwrap();
    let private = notes
        .set_visibility(note.id, "ada", Visibility::Private, &[circle.id], &circle_repo)
        .unwrap();
    assert_eq!(private.visibility, Visibility::Private);
    assert!(private.shared_with_circles.is_empty());
    assert_eq!(private.transplant_history.len(), 2);
}

#[test]
fn only_creator_deletes_and_delete_unshares_notes() {
    let conn = open_db_in_memory().unwrap();
    let circle_repo = SqliteCircleRepository::new(&conn);
    let registry = CirclesRegistry::new(circle_repo);
    let notes = NoteService::new(
        SqliteNoteRepository::new(&conn),
        SqliteGraphRepository::new(&conn),
    );
    let seed = notes.create_note("ada", "t", "words").unwrap();
    let note = notes.advance_stage(seed.id, "ada").unwrap();
    let circle = registry.create("readers", "", "ada", None).unwrap();
    registry.add_member(circle.id, "grace").unwrap();
    notes
        .set_visibility(note.id, "ada", Visibility::Circle, &[circle.id], &circle_repo)
        .unwrap();

    assert!(matches!(
        registry.delete(circle.id, "grace"),
        Err(GardenError::Forbidden(_))
    ));
    registry.delete(circle.id, "ada").unwrap();
    assert!(matches!(
        registry.get(circle.id),
        Err(GardenError::CircleNotFound(_))
    ));
    assert!(notes
        .get_note(note.id)
        .unwrap()
        .shared_with_circles
        .is_empty());
}
