//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist note rows together with the relations they own: tags, shared
//!   circles, tend records, transplant log and version history.
//! - Hydrate derived views (`grows_from`, `grows_into`, `grafted_to`)
//!   from the edge table and graft back-references on every read.
//!
//! # Invariants
//! - Version history is append-only; `seq` increases by one per entry.
//! - `revisit_count` only increments; `updated_at` and `last_tended_at`
//!   never move backwards (`MAX(current, new)` on write).
//! - Tag sets are replaced atomically with the edit that carries them.
//! - In-place writes (body edit, stage move, transplant) re-check the
//!   stage rules against the stored row inside their transaction.
//!
//! # See also
//! - `graph_repo` for edge mutation and node removal.

use crate::model::note::{
    check_stage_rules, GraftSource, Note, NoteValidationError, NoteVersion, TendRecord,
    Transplant,
};
use crate::model::stage::Stage;
use crate::model::visibility::Visibility;
use crate::model::{CircleId, NoteId};
use crate::repo::{from_millis, parse_uuid, to_millis, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior,
};

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    user_id,
    title,
    content,
    stage,
    visibility,
    word_count,
    revisit_count,
    last_tended_at,
    revisit_on,
    grafted_from_id,
    grafted_from_user,
    grafted_at,
    created_at,
    updated_at
FROM notes";

/// Query options for note list use-cases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteListQuery {
    /// Restrict to one owner.
    pub owner: Option<String>,
    pub stage: Option<Stage>,
    pub visibility: Option<Visibility>,
    /// Exact match on a normalized tag.
    pub tag: Option<String>,
    /// `None` returns every matching row.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Validated content edit applied by [`NoteRepository::update_note`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteWrite {
    pub title: String,
    pub content: String,
    pub word_count: u32,
    /// Replaces the whole tag set; already normalized.
    pub tags: Vec<String>,
    pub at: DateTime<Utc>,
}

/// Stage move applied by [`NoteRepository::change_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageChange {
    pub stage: Stage,
    /// Visibility reset performed in the same transaction, if any.
    pub visibility: Option<Visibility>,
    pub at: DateTime<Utc>,
}

/// Repository interface for note persistence.
pub trait NoteRepository {
    /// Inserts one note with its owned relations and returns its id.
    fn create_note(&self, note: &Note) -> RepoResult<NoteId>;
    /// Loads one fully hydrated note.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Lists notes ordered by `updated_at DESC, id ASC`.
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>>;
    /// Applies one content edit, appending a version when the body changes.
    fn update_note(&self, id: NoteId, write: &NoteWrite) -> RepoResult<()>;
    /// Moves a note to another stage, optionally resetting visibility.
    fn change_stage(&self, id: NoteId, change: &StageChange) -> RepoResult<()>;
    /// Replaces visibility and circle scope, logging a transplant on change.
    fn set_visibility(
        &self,
        id: NoteId,
        visibility: Visibility,
        circles: &[CircleId],
        at: DateTime<Utc>,
    ) -> RepoResult<()>;
    /// Appends one tend record and refreshes `last_tended_at`.
    fn add_tend(&self, id: NoteId, record: &TendRecord) -> RepoResult<()>;
    /// Sets or clears the scheduled revisit date.
    fn set_revisit_on(&self, id: NoteId, revisit_on: Option<DateTime<Utc>>) -> RepoResult<()>;
    /// Returns version history oldest first.
    fn list_versions(&self, id: NoteId) -> RepoResult<Vec<NoteVersion>>;
}

/// SQLite-backed note repository.
#[derive(Clone, Copy)]
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, note: &Note) -> RepoResult<NoteId> {
        note.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = note.id.to_string();
        let grafted = note.grafted_from.as_ref();
        tx.execute(
            "INSERT INTO notes (
                id,
                user_id,
                title,
                content,
                stage,
                visibility,
                word_count,
                revisit_count,
                last_tended_at,
                revisit_on,
                grafted_from_id,
                grafted_from_user,
                grafted_at,
                created_at,
                updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15);",
            params![
                id_text,
                note.user_id,
                note.title,
                note.content,
                note.stage.as_str(),
                note.visibility.as_str(),
                note.word_count,
                note.revisit_count,
                to_millis(&note.last_tended_at),
                note.revisit_on.as_ref().map(to_millis),
                grafted.map(|source| source.note_id.to_string()),
                grafted.map(|source| source.user_id.as_str()),
                grafted.map(|source| to_millis(&source.grafted_at)),
                to_millis(&note.created_at),
                to_millis(&note.updated_at),
            ],
        )?;

        replace_tags(&tx, &id_text, &note.tags)?;
        replace_circles(&tx, &id_text, &note.shared_with_circles)?;
        for record in &note.tended_by {
            insert_tend(&tx, &id_text, record)?;
        }
        for transplant in &note.transplant_history {
            insert_transplant(&tx, &id_text, transplant)?;
        }

        tx.commit()?;
        Ok(note.id)
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        load_note(self.conn, id)
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<Vec<Note>> {
        let mut sql = format!("{NOTE_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(owner) = query.owner.as_ref() {
            sql.push_str(" AND user_id = ?");
            bind_values.push(Value::Text(owner.clone()));
        }
        if let Some(stage) = query.stage {
            sql.push_str(" AND stage = ?");
            bind_values.push(Value::Text(stage.as_str().to_string()));
        }
        if let Some(visibility) = query.visibility {
            sql.push_str(" AND visibility = ?");
            bind_values.push(Value::Text(visibility.as_str().to_string()));
        }
        if let Some(tag) = query.tag.as_ref() {
            sql.push_str(
                " AND EXISTS (
                    SELECT 1 FROM note_tags t
                    WHERE t.note_id = notes.id AND t.tag = ?
                )",
            );
            bind_values.push(Value::Text(tag.clone()));
        }

        sql.push_str(" ORDER BY updated_at DESC, id ASC");
        match query.limit {
            Some(limit) => {
                sql.push_str(" LIMIT ?");
                bind_values.push(Value::Integer(i64::from(limit)));
                if query.offset > 0 {
                    sql.push_str(" OFFSET ?");
                    bind_values.push(Value::Integer(i64::from(query.offset)));
                }
            }
            None if query.offset > 0 => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
            None => {}
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            notes.push(parse_note_row(row)?);
        }
        for note in &mut notes {
            attach_relations(self.conn, note)?;
        }
        Ok(notes)
    }

    fn update_note(&self, id: NoteId, write: &NoteWrite) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = id.to_string();

        let Some(stored) = stored_note(&tx, id, &id_text)? else {
            return Err(RepoError::NoteNotFound(id));
        };
        check_stage_rules(
            stored.stage,
            stored.visibility,
            write.content.chars().count(),
            count_edges(&tx, &id_text)?,
        )?;
        let previous = stored.content;

        if previous != write.content {
            tx.execute(
                "INSERT INTO note_versions (note_id, seq, content, saved_at)
                 SELECT ?1, COALESCE(MAX(seq), 0) + 1, ?2, ?3
                 FROM note_versions
                 WHERE note_id = ?1;",
                params![id_text, previous, to_millis(&write.at)],
            )?;
        }

        tx.execute(
            "UPDATE notes
             SET
                title = ?2,
                content = ?3,
                word_count = ?4,
                revisit_count = revisit_count + 1,
                last_tended_at = MAX(last_tended_at, ?5),
                updated_at = MAX(updated_at, ?5)
             WHERE id = ?1;",
            params![
                id_text,
                write.title,
                write.content,
                write.word_count,
                to_millis(&write.at),
            ],
        )?;
        replace_tags(&tx, &id_text, &write.tags)?;

        tx.commit()?;
        Ok(())
    }

    fn change_stage(&self, id: NoteId, change: &StageChange) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = id.to_string();
        let Some(stored) = stored_note(&tx, id, &id_text)? else {
            return Err(RepoError::NoteNotFound(id));
        };
        let current = stored.visibility;
        let target = change.visibility.unwrap_or(current);
        if target == Visibility::Circle && current != Visibility::Circle {
            return Err(NoteValidationError::EmptyCircleScope.into());
        }
        check_stage_rules(
            change.stage,
            target,
            stored.content.chars().count(),
            count_edges(&tx, &id_text)?,
        )?;

        tx.execute(
            "UPDATE notes
             SET
                stage = ?2,
                visibility = ?3,
                updated_at = MAX(updated_at, ?4)
             WHERE id = ?1;",
            params![
                id_text,
                change.stage.as_str(),
                target.as_str(),
                to_millis(&change.at),
            ],
        )?;

        if target != current {
            if target != Visibility::Circle {
                replace_circles(&tx, &id_text, &[])?;
            }
            insert_transplant(
                &tx,
                &id_text,
                &Transplant {
                    from: current,
                    to: target,
                    moved_at: change.at,
                },
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn set_visibility(
        &self,
        id: NoteId,
        visibility: Visibility,
        circles: &[CircleId],
        at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = id.to_string();
        let Some(stored) = stored_note(&tx, id, &id_text)? else {
            return Err(RepoError::NoteNotFound(id));
        };
        if visibility == Visibility::Circle && circles.is_empty() {
            return Err(NoteValidationError::EmptyCircleScope.into());
        }
        check_stage_rules(
            stored.stage,
            visibility,
            stored.content.chars().count(),
            count_edges(&tx, &id_text)?,
        )?;
        let current = stored.visibility;

        tx.execute(
            "UPDATE notes
             SET
                visibility = ?2,
                updated_at = MAX(updated_at, ?3)
             WHERE id = ?1;",
            params![id_text, visibility.as_str(), to_millis(&at)],
        )?;

        let scope: &[CircleId] = if visibility == Visibility::Circle {
            circles
        } else {
            &[]
        };
        replace_circles(&tx, &id_text, scope)?;

        if current != visibility {
            insert_transplant(
                &tx,
                &id_text,
                &Transplant {
                    from: current,
                    to: visibility,
                    moved_at: at,
                },
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn add_tend(&self, id: NoteId, record: &TendRecord) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = id.to_string();
        let changed = tx.execute(
            "UPDATE notes
             SET last_tended_at = MAX(last_tended_at, ?2)
             WHERE id = ?1;",
            params![id_text, to_millis(&record.tended_at)],
        )?;
        if changed == 0 {
            return Err(RepoError::NoteNotFound(id));
        }
        insert_tend(&tx, &id_text, record)?;
        tx.commit()?;
        Ok(())
    }

    fn set_revisit_on(&self, id: NoteId, revisit_on: Option<DateTime<Utc>>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes SET revisit_on = ?2 WHERE id = ?1;",
            params![id.to_string(), revisit_on.as_ref().map(to_millis)],
        )?;
        if changed == 0 {
            return Err(RepoError::NoteNotFound(id));
        }
        Ok(())
    }

    fn list_versions(&self, id: NoteId) -> RepoResult<Vec<NoteVersion>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, content, saved_at
             FROM note_versions
             WHERE note_id = ?1
             ORDER BY seq ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut versions = Vec::new();
        while let Some(row) = rows.next()? {
            versions.push(NoteVersion {
                note_id: id,
                seq: row.get("seq")?,
                content: row.get("content")?,
                saved_at: from_millis(row.get("saved_at")?, "note_versions.saved_at")?,
            });
        }
        Ok(versions)
    }
}

/// Loads one fully hydrated note by id.
pub(crate) fn load_note(conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut note = parse_note_row(row)?;
    attach_relations(conn, &mut note)?;
    Ok(Some(note))
}

/// Normalizes one tag value: trimmed and lowercased, `None` when blank.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes, deduplicates and sorts tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = tags.iter().filter_map(|tag| normalize_tag(tag)).collect();
    unique.sort();
    unique.dedup();
    unique
}

fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "notes.id")?;

    let stage_text: String = row.get("stage")?;
    let stage = Stage::parse(&stage_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid stage `{stage_text}` in notes.stage"))
    })?;

    let visibility_text: String = row.get("visibility")?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid visibility `{visibility_text}` in notes.visibility"
        ))
    })?;

    let revisit_on = match row.get::<_, Option<i64>>("revisit_on")? {
        Some(value) => Some(from_millis(value, "notes.revisit_on")?),
        None => None,
    };

    let grafted_from = match (
        row.get::<_, Option<String>>("grafted_from_id")?,
        row.get::<_, Option<String>>("grafted_from_user")?,
        row.get::<_, Option<i64>>("grafted_at")?,
    ) {
        (Some(source_id), Some(user_id), Some(grafted_at)) => Some(GraftSource {
            note_id: parse_uuid(&source_id, "notes.grafted_from_id")?,
            user_id,
            grafted_at: from_millis(grafted_at, "notes.grafted_at")?,
        }),
        (None, None, None) => None,
        _ => {
            return Err(RepoError::InvalidData(format!(
                "partial graft provenance on note {id_text}"
            )))
        }
    };

    Ok(Note {
        id,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        stage,
        tags: Vec::new(),
        visibility,
        shared_with_circles: Vec::new(),
        grows_from: Vec::new(),
        grows_into: Vec::new(),
        word_count: row.get("word_count")?,
        revisit_count: row.get("revisit_count")?,
        last_tended_at: from_millis(row.get("last_tended_at")?, "notes.last_tended_at")?,
        revisit_on,
        tended_by: Vec::new(),
        grafted_from,
        grafted_to: Vec::new(),
        transplant_history: Vec::new(),
        created_at: from_millis(row.get("created_at")?, "notes.created_at")?,
        updated_at: from_millis(row.get("updated_at")?, "notes.updated_at")?,
    })
}

fn attach_relations(conn: &Connection, note: &mut Note) -> RepoResult<()> {
    let id_text = note.id.to_string();
    note.tags = query_strings(
        conn,
        "SELECT tag FROM note_tags WHERE note_id = ?1 ORDER BY tag ASC;",
        &id_text,
    )?;
    note.shared_with_circles = query_ids(
        conn,
        "SELECT circle_id FROM note_circles WHERE note_id = ?1 ORDER BY circle_id ASC;",
        &id_text,
        "note_circles.circle_id",
    )?;
    note.grows_from = query_ids(
        conn,
        "SELECT from_id FROM note_edges WHERE to_id = ?1 ORDER BY created_at ASC, from_id ASC;",
        &id_text,
        "note_edges.from_id",
    )?;
    note.grows_into = query_ids(
        conn,
        "SELECT to_id FROM note_edges WHERE from_id = ?1 ORDER BY created_at ASC, to_id ASC;",
        &id_text,
        "note_edges.to_id",
    )?;
    note.grafted_to = query_ids(
        conn,
        "SELECT id FROM notes WHERE grafted_from_id = ?1 ORDER BY created_at ASC, id ASC;",
        &id_text,
        "notes.id",
    )?;

    let mut stmt = conn.prepare(
        "SELECT user_id, tended_at FROM note_tends WHERE note_id = ?1 ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([id_text.as_str()])?;
    note.tended_by.clear();
    while let Some(row) = rows.next()? {
        note.tended_by.push(TendRecord {
            user_id: row.get("user_id")?,
            tended_at: from_millis(row.get("tended_at")?, "note_tends.tended_at")?,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT from_visibility, to_visibility, moved_at
         FROM note_transplants
         WHERE note_id = ?1
         ORDER BY id ASC;",
    )?;
    let mut rows = stmt.query([id_text.as_str()])?;
    note.transplant_history.clear();
    while let Some(row) = rows.next()? {
        let from_text: String = row.get("from_visibility")?;
        let to_text: String = row.get("to_visibility")?;
        note.transplant_history.push(Transplant {
            from: parse_visibility(&from_text, "note_transplants.from_visibility")?,
            to: parse_visibility(&to_text, "note_transplants.to_visibility")?,
            moved_at: from_millis(row.get("moved_at")?, "note_transplants.moved_at")?,
        });
    }

    Ok(())
}

/// Stage-relevant columns of one stored note.
struct StoredNote {
    stage: Stage,
    visibility: Visibility,
    content: String,
}

fn stored_note(
    tx: &Transaction<'_>,
    id: NoteId,
    id_text: &str,
) -> RepoResult<Option<StoredNote>> {
    let row: Option<(String, String, String)> = tx
        .query_row(
            "SELECT stage, visibility, content FROM notes WHERE id = ?1;",
            [id_text],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    let Some((stage_text, visibility_text, content)) = row else {
        return Ok(None);
    };
    let stage = Stage::parse(&stage_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid stage `{stage_text}` on note {id}"))
    })?;
    let visibility = Visibility::parse(&visibility_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid visibility `{visibility_text}` on note {id}"))
    })?;
    Ok(Some(StoredNote {
        stage,
        visibility,
        content,
    }))
}

fn count_edges(tx: &Transaction<'_>, note_id: &str) -> RepoResult<usize> {
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM note_edges WHERE from_id = ?1 OR to_id = ?1;",
        [note_id],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

fn replace_tags(tx: &Transaction<'_>, note_id: &str, tags: &[String]) -> RepoResult<()> {
    tx.execute("DELETE FROM note_tags WHERE note_id = ?1;", [note_id])?;
    for tag in tags {
        tx.execute(
            "INSERT OR IGNORE INTO note_tags (note_id, tag) VALUES (?1, ?2);",
            params![note_id, tag],
        )?;
    }
    Ok(())
}

fn replace_circles(tx: &Transaction<'_>, note_id: &str, circles: &[CircleId]) -> RepoResult<()> {
    tx.execute("DELETE FROM note_circles WHERE note_id = ?1;", [note_id])?;
    for circle_id in circles {
        tx.execute(
            "INSERT OR IGNORE INTO note_circles (note_id, circle_id) VALUES (?1, ?2);",
            params![note_id, circle_id.to_string()],
        )?;
    }
    Ok(())
}

fn insert_tend(tx: &Transaction<'_>, note_id: &str, record: &TendRecord) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO note_tends (note_id, user_id, tended_at) VALUES (?1, ?2, ?3);",
        params![note_id, record.user_id, to_millis(&record.tended_at)],
    )?;
    Ok(())
}

fn insert_transplant(
    tx: &Transaction<'_>,
    note_id: &str,
    transplant: &Transplant,
) -> RepoResult<()> {
    tx.execute(
        "INSERT INTO note_transplants (note_id, from_visibility, to_visibility, moved_at)
         VALUES (?1, ?2, ?3, ?4);",
        params![
            note_id,
            transplant.from.as_str(),
            transplant.to.as_str(),
            to_millis(&transplant.moved_at),
        ],
    )?;
    Ok(())
}

fn parse_visibility(value: &str, column: &str) -> RepoResult<Visibility> {
    Visibility::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid visibility `{value}` in {column}")))
}

fn query_strings(conn: &Connection, sql: &str, note_id: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([note_id])?;
    let mut values = Vec::new();
    while let Some(row) = rows.next()? {
        values.push(row.get(0)?);
    }
    Ok(values)
}

fn query_ids(
    conn: &Connection,
    sql: &str,
    note_id: &str,
    column: &str,
) -> RepoResult<Vec<uuid::Uuid>> {
    query_strings(conn, sql, note_id)?
        .iter()
        .map(|value| parse_uuid(value, column))
        .collect()
}
