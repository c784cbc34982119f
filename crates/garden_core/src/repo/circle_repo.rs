//! Circle repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist circles and their membership lists.
//! - Keep capacity checks and inserts inside one transaction so a
//!   circle can never be observed above `max_members`.
//!
//! # Invariants
//! - Members are returned in join order (`joined_seq ASC`).
//! - Deleting a circle cascades out of `circle_members` and `note_circles`.

use crate::model::circle::Circle;
use crate::model::{CircleId, UserId};
use crate::repo::{from_millis, parse_uuid, to_millis, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

const CIRCLE_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    max_members,
    created_by,
    created_at
FROM circles";

/// Outcome of a capacity-checked membership insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMemberOutcome {
    Added,
    AlreadyMember,
    Full { max_members: u32 },
}

/// Repository interface for circle persistence.
pub trait CircleRepository {
    /// Inserts a circle and its initial members.
    fn create_circle(&self, circle: &Circle) -> RepoResult<CircleId>;
    fn get_circle(&self, id: CircleId) -> RepoResult<Option<Circle>>;
    /// Adds one member unless present or at capacity.
    fn add_member(&self, id: CircleId, user_id: &str) -> RepoResult<AddMemberOutcome>;
    /// Removes one member. Returns `false` when the user was not a member.
    fn remove_member(&self, id: CircleId, user_id: &str) -> RepoResult<bool>;
    /// Lists every circle the user belongs to, oldest first.
    fn circles_containing(&self, user_id: &str) -> RepoResult<Vec<Circle>>;
    fn delete_circle(&self, id: CircleId) -> RepoResult<()>;
}

/// SQLite-backed circle repository.
#[derive(Clone, Copy)]
pub struct SqliteCircleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCircleRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CircleRepository for SqliteCircleRepository<'_> {
    fn create_circle(&self, circle: &Circle) -> RepoResult<CircleId> {
        if circle.members.len() > circle.max_members as usize {
            return Err(RepoError::InvalidData(format!(
                "circle {} has {} members but allows {}",
                circle.id,
                circle.members.len(),
                circle.max_members
            )));
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = circle.id.to_string();
        tx.execute(
            "INSERT INTO circles (id, name, description, max_members, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                id_text,
                circle.name,
                circle.description,
                circle.max_members,
                circle.created_by,
                to_millis(&circle.created_at),
            ],
        )?;
        for (seq, member) in circle.members.iter().enumerate() {
            tx.execute(
                "INSERT OR IGNORE INTO circle_members (circle_id, user_id, joined_seq)
                 VALUES (?1, ?2, ?3);",
                params![id_text, member, seq as i64],
            )?;
        }
        tx.commit()?;
        Ok(circle.id)
    }

    fn get_circle(&self, id: CircleId) -> RepoResult<Option<Circle>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{CIRCLE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let mut circle = parse_circle_row(row)?;
        circle.members = load_members(self.conn, &circle.id.to_string())?;
        Ok(Some(circle))
    }

    fn add_member(&self, id: CircleId, user_id: &str) -> RepoResult<AddMemberOutcome> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let id_text = id.to_string();
        let max_members: Option<u32> = tx
            .query_row(
                "SELECT max_members FROM circles WHERE id = ?1;",
                [id_text.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(max_members) = max_members else {
            return Err(RepoError::CircleNotFound(id));
        };

        let (count, present): (i64, i64) = tx.query_row(
            "SELECT COUNT(*), COALESCE(SUM(user_id = ?2), 0)
             FROM circle_members
             WHERE circle_id = ?1;",
            params![id_text, user_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        if present > 0 {
            return Ok(AddMemberOutcome::AlreadyMember);
        }
        if count >= i64::from(max_members) {
            return Ok(AddMemberOutcome::Full { max_members });
        }

        tx.execute(
            "INSERT INTO circle_members (circle_id, user_id, joined_seq)
             SELECT ?1, ?2, COALESCE(MAX(joined_seq), -1) + 1
             FROM circle_members
             WHERE circle_id = ?1;",
            params![id_text, user_id],
        )?;
        tx.commit()?;
        Ok(AddMemberOutcome::Added)
    }

    fn remove_member(&self, id: CircleId, user_id: &str) -> RepoResult<bool> {
        if self.get_circle(id)?.is_none() {
            return Err(RepoError::CircleNotFound(id));
        }
        let removed = self.conn.execute(
            "DELETE FROM circle_members WHERE circle_id = ?1 AND user_id = ?2;",
            params![id.to_string(), user_id],
        )?;
        Ok(removed == 1)
    }

    fn circles_containing(&self, user_id: &str) -> RepoResult<Vec<Circle>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CIRCLE_SELECT_SQL}
             WHERE EXISTS (
                SELECT 1 FROM circle_members m
                WHERE m.circle_id = circles.id AND m.user_id = ?1
             )
             ORDER BY created_at ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([user_id])?;
        let mut circles = Vec::new();
        while let Some(row) = rows.next()? {
            circles.push(parse_circle_row(row)?);
        }
        for circle in &mut circles {
            circle.members = load_members(self.conn, &circle.id.to_string())?;
        }
        Ok(circles)
    }

    fn delete_circle(&self, id: CircleId) -> RepoResult<()> {
        let removed = self
            .conn
            .execute("DELETE FROM circles WHERE id = ?1;", [id.to_string()])?;
        if removed == 0 {
            return Err(RepoError::CircleNotFound(id));
        }
        Ok(())
    }
}

fn parse_circle_row(row: &Row<'_>) -> RepoResult<Circle> {
    let id_text: String = row.get("id")?;
    Ok(Circle {
        id: parse_uuid(&id_text, "circles.id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        members: Vec::new(),
        max_members: row.get("max_members")?,
        created_by: row.get("created_by")?,
        created_at: from_millis(row.get("created_at")?, "circles.created_at")?,
    })
}

fn load_members(conn: &Connection, circle_id: &str) -> RepoResult<Vec<UserId>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM circle_members WHERE circle_id = ?1 ORDER BY joined_seq ASC;",
    )?;
    let mut rows = stmt.query([circle_id])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        members.push(row.get(0)?);
    }
    Ok(members)
}
