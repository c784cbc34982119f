//! Circles registry: bounded membership groups.
//!
//! # Responsibility
//! - Create and delete circles, add and remove members.
//! - Map storage outcomes onto `CircleFull` / `AlreadyMember`.
//!
//! # Invariants
//! - Membership never exceeds `max_members`; the repository checks
//!   capacity and inserts in one transaction.
//! - Removal is idempotent and may leave a circle empty.

use crate::error::{GardenError, GardenResult};
use crate::model::circle::{Circle, DEFAULT_CIRCLE_MAX_MEMBERS};
use crate::model::{CircleId, UserId};
use crate::repo::circle_repo::{AddMemberOutcome, CircleRepository};
use log::{info, warn};

/// Registry facade over circle repositories.
pub struct CirclesRegistry<C: CircleRepository> {
    repo: C,
    default_max_members: u32,
}

impl<C: CircleRepository> CirclesRegistry<C> {
    pub fn new(repo: C) -> Self {
        Self::with_default_capacity(repo, DEFAULT_CIRCLE_MAX_MEMBERS)
    }

    /// Uses `default_max_members` for circles created without a capacity.
    pub fn with_default_capacity(repo: C, default_max_members: u32) -> Self {
        Self {
            repo,
            default_max_members,
        }
    }

    /// Creates a circle with the creator as its only member.
    pub fn create(
        &self,
        name: &str,
        description: &str,
        creator: &str,
        max_members: Option<u32>,
    ) -> GardenResult<Circle> {
        let name = name.trim();
        if name.is_empty() {
            return Err(GardenError::InvalidInput("circle name must not be blank".into()));
        }
        if creator.trim().is_empty() {
            return Err(GardenError::InvalidInput("circle creator must not be blank".into()));
        }
        let max_members = max_members.unwrap_or(self.default_max_members);
        if max_members == 0 {
            return Err(GardenError::InvalidInput(
                "circle capacity must be at least 1".into(),
            ));
        }

        let circle = Circle::new(name, description, creator, max_members);
        let id = self.repo.create_circle(&circle)?;
        info!(
            "event=circle_create module=circles status=ok circle_id={id} max_members={max_members}"
        );
        self.get(id)
    }

    pub fn get(&self, circle_id: CircleId) -> GardenResult<Circle> {
        self.repo
            .get_circle(circle_id)?
            .ok_or(GardenError::CircleNotFound(circle_id))
    }

    /// Adds a member.
    ///
    /// The loaded circle answers the common refusals; the repository
    /// repeats the capacity check inside its transaction.
    pub fn add_member(&self, circle_id: CircleId, user_id: &str) -> GardenResult<Circle> {
        if user_id.trim().is_empty() {
            return Err(GardenError::InvalidInput("member id must not be blank".into()));
        }
        let circle = self.get(circle_id)?;
        if circle.is_member(user_id) {
            return Err(already_member(circle_id, user_id));
        }
        if circle.is_full() {
            return Err(circle_full(circle_id, circle.max_members));
        }

        match self.repo.add_member(circle_id, user_id)? {
            AddMemberOutcome::Added => {
                info!("event=circle_add_member module=circles status=ok circle_id={circle_id}");
                self.get(circle_id)
            }
            AddMemberOutcome::AlreadyMember => Err(already_member(circle_id, user_id)),
            AddMemberOutcome::Full { max_members } => Err(circle_full(circle_id, max_members)),
        }
    }

    /// Removes a member if present. Removing the creator is allowed.
    pub fn remove_member(&self, circle_id: CircleId, user_id: &str) -> GardenResult<Circle> {
        let removed = self.repo.remove_member(circle_id, user_id)?;
        info!(
            "event=circle_remove_member module=circles status=ok circle_id={circle_id} removed={removed}"
        );
        self.get(circle_id)
    }

    /// Members in join order.
    pub fn members_of(&self, circle_id: CircleId) -> GardenResult<Vec<UserId>> {
        Ok(self.get(circle_id)?.members)
    }

    pub fn circles_containing(&self, user_id: &str) -> GardenResult<Vec<Circle>> {
        Ok(self.repo.circles_containing(user_id)?)
    }

    /// Deletes a circle; only its creator may do so.
    pub fn delete(&self, circle_id: CircleId, actor: &str) -> GardenResult<()> {
        let circle = self.get(circle_id)?;
        if circle.created_by != actor {
            warn!(
                "event=circle_delete module=circles status=denied reason=not_creator circle_id={circle_id}"
            );
            return Err(GardenError::Forbidden(format!(
                "only the creator may delete circle {circle_id}"
            )));
        }
        self.repo.delete_circle(circle_id)?;
        info!("event=circle_delete module=circles status=ok circle_id={circle_id}");
        Ok(())
    }
}

fn already_member(circle_id: CircleId, user_id: &str) -> GardenError {
    GardenError::AlreadyMember {
        circle_id,
        user_id: user_id.to_string(),
    }
}

fn circle_full(circle_id: CircleId, max_members: u32) -> GardenError {
    warn!(
        "event=circle_add_member module=circles status=denied error_code=circle_full circle_id={circle_id} max_members={max_members}"
    );
    GardenError::CircleFull {
        circle_id,
        max_members,
    }
}
