//! Circle membership group model.
//!
//! # Invariants
//! - The creator is the sole member right after creation.
//! - `members.len()` never exceeds `max_members`.

use crate::model::{now_millis, CircleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default capacity for new circles.
pub const DEFAULT_CIRCLE_MAX_MEMBERS: u32 = 12;

/// Bounded membership group used to scope `circle` visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circle {
    pub id: CircleId,
    pub name: String,
    pub description: String,
    /// Members in join order.
    pub members: Vec<UserId>,
    pub max_members: u32,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

impl Circle {
    /// Creates a circle whose only member is its creator.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        created_by: impl Into<UserId>,
        max_members: u32,
    ) -> Self {
        let created_by = created_by.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            members: vec![created_by.clone()],
            max_members,
            created_by,
            created_at: now_millis(),
        }
    }

    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|member| member == user_id)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_members as usize
    }
}
