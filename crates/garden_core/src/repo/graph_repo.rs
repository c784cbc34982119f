//! Connection graph repository over the single `note_edges` collection.
//!
//! # Responsibility
//! - Insert/remove `grows_from`/`grows_into` edges as one row per edge.
//! - Remove notes together with every edge touching them.
//!
//! # Invariants
//! - One row `(from_id, to_id)` is both `from.grows_into ∋ to` and
//!   `to.grows_from ∋ from`; symmetry cannot drift because there is no
//!   second copy to update.
//! - Node removal runs in one IMMEDIATE transaction and aborts on any
//!   dangling edge row instead of deleting around it.

use crate::model::NoteId;
use crate::repo::{parse_uuid, to_millis, RepoError, RepoResult};
use chrono::{DateTime, Utc};
use log::error;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};

/// Repository interface for connection graph edges.
pub trait GraphRepository {
    /// Adds `to` to `from.grows_into` (and `from` to `to.grows_from`).
    ///
    /// Returns `false` when the edge already existed.
    fn add_edge(&self, from: NoteId, to: NoteId, at: DateTime<Utc>) -> RepoResult<bool>;
    /// Removes one edge. Returns `false` when it did not exist.
    fn remove_edge(&self, from: NoteId, to: NoteId) -> RepoResult<bool>;
    /// Combined `grows_from + grows_into` size for one note.
    fn edge_count(&self, id: NoteId) -> RepoResult<usize>;
    /// Direct neighbours in both directions, deduplicated.
    fn neighbors(&self, id: NoteId) -> RepoResult<Vec<NoteId>>;
    /// Deletes the note and strips it from every peer's edge lists.
    fn remove_node(&self, id: NoteId) -> RepoResult<()>;
}

/// SQLite-backed graph repository.
#[derive(Clone, Copy)]
pub struct SqliteGraphRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl GraphRepository for SqliteGraphRepository<'_> {
    fn add_edge(&self, from: NoteId, to: NoteId, at: DateTime<Utc>) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let from_text = from.to_string();
        let to_text = to.to_string();
        ensure_note_exists(&tx, from, &from_text)?;
        ensure_note_exists(&tx, to, &to_text)?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO note_edges (from_id, to_id, created_at) VALUES (?1, ?2, ?3);",
            params![from_text, to_text, to_millis(&at)],
        )?;
        tx.commit()?;
        Ok(inserted == 1)
    }

    fn remove_edge(&self, from: NoteId, to: NoteId) -> RepoResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM note_edges WHERE from_id = ?1 AND to_id = ?2;",
            params![from.to_string(), to.to_string()],
        )?;
        Ok(removed == 1)
    }

    fn edge_count(&self, id: NoteId) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM note_edges WHERE from_id = ?1 OR to_id = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative edge count for note {id}")))
    }

    fn neighbors(&self, id: NoteId) -> RepoResult<Vec<NoteId>> {
        let mut stmt = self.conn.prepare(
            "SELECT to_id AS peer FROM note_edges WHERE from_id = ?1
             UNION
             SELECT from_id AS peer FROM note_edges WHERE to_id = ?1
             ORDER BY peer ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut peers = Vec::new();
        while let Some(row) = rows.next()? {
            let peer: String = row.get("peer")?;
            peers.push(parse_uuid(&peer, "note_edges")?);
        }
        Ok(peers)
    }

    fn remove_node(&self, id: NoteId) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = id.to_string();
        ensure_note_exists(&tx, id, &id_text)?;

        let dangling: i64 = tx.query_row(
            "SELECT COUNT(*)
             FROM note_edges e
             WHERE (e.from_id = ?1 AND NOT EXISTS (SELECT 1 FROM notes n WHERE n.id = e.to_id))
                OR (e.to_id = ?1 AND NOT EXISTS (SELECT 1 FROM notes n WHERE n.id = e.from_id));",
            [id_text.as_str()],
            |row| row.get(0),
        )?;
        if dangling > 0 {
            error!(
                "event=graph_remove_node module=graph status=error error_code=dangling_edge note_id={} dangling_edges={}",
                id, dangling
            );
            return Err(RepoError::Integrity(format!(
                "note {id} has {dangling} edge(s) pointing at missing notes"
            )));
        }

        tx.execute(
            "DELETE FROM note_edges WHERE from_id = ?1 OR to_id = ?1;",
            [id_text.as_str()],
        )?;
        tx.execute("DELETE FROM notes WHERE id = ?1;", [id_text.as_str()])?;
        tx.commit()?;
        Ok(())
    }
}

fn ensure_note_exists(tx: &Transaction<'_>, id: NoteId, id_text: &str) -> RepoResult<()> {
    let exists: i64 = tx.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
        [id_text],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(RepoError::NoteNotFound(id))
    }
}
