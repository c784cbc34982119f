//! Growth stage state machine table.
//!
//! # Responsibility
//! - Hold every per-stage constraint in one place (`Stage::rules`).
//! - Describe the forward/backward neighbours of each stage.
//!
//! # Invariants
//! - Stages are totally ordered `seed < sprout < bloom`.
//! - Each stage's rights are a superset of the previous stage's rights.

use crate::model::visibility::Visibility;
use serde::{Deserialize, Serialize};

/// Maximum body length (in characters) while a note is a seed.
pub const SEED_MAX_BODY_CHARS: usize = 500;
/// Maximum body length (in characters) while a note is a sprout.
pub const SPROUT_MAX_BODY_CHARS: usize = 2000;
/// Minimum combined `grows_from + grows_into` edges required to bloom.
pub const BLOOM_MIN_EDGES: usize = 3;
/// Minimum tend records from other users required to bloom.
pub const BLOOM_MIN_TENDS: usize = 1;

/// Growth stage of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial capture; private, short, unconnected.
    Seed,
    /// Developing piece; may connect and be shared with circles.
    Sprout,
    /// Finished piece; unlimited length and publishable to the garden.
    Bloom,
}

/// Constraint row for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRules {
    /// `None` means unlimited.
    pub max_body_chars: Option<usize>,
    /// Whether the note may appear in any graph edge.
    pub holds_edges: bool,
    /// Visibility levels the note may take at this stage.
    pub allowed_visibility: &'static [Visibility],
}

static SEED_RULES: StageRules = StageRules {
    max_body_chars: Some(SEED_MAX_BODY_CHARS),
    holds_edges: false,
    allowed_visibility: &[Visibility::Private],
};

static SPROUT_RULES: StageRules = StageRules {
    max_body_chars: Some(SPROUT_MAX_BODY_CHARS),
    holds_edges: true,
    allowed_visibility: &[Visibility::Private, Visibility::Circle],
};

static BLOOM_RULES: StageRules = StageRules {
    max_body_chars: None,
    holds_edges: true,
    allowed_visibility: &[Visibility::Private, Visibility::Circle, Visibility::Garden],
};

impl Stage {
    /// Returns the constraint row for this stage.
    pub fn rules(self) -> &'static StageRules {
        match self {
            Self::Seed => &SEED_RULES,
            Self::Sprout => &SPROUT_RULES,
            Self::Bloom => &BLOOM_RULES,
        }
    }

    /// Next stage in the forward direction. `bloom` is terminal.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Seed => Some(Self::Sprout),
            Self::Sprout => Some(Self::Bloom),
            Self::Bloom => None,
        }
    }

    /// Previous stage, used only by the explicit demotion path.
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::Seed => None,
            Self::Sprout => Some(Self::Seed),
            Self::Bloom => Some(Self::Sprout),
        }
    }

    /// Whether a body of `chars` characters fits this stage.
    pub fn allows_body(self, chars: usize) -> bool {
        self.rules().max_body_chars.map_or(true, |limit| chars <= limit)
    }

    /// Whether this stage may take the given visibility.
    pub fn allows_visibility(self, visibility: Visibility) -> bool {
        self.rules().allowed_visibility.contains(&visibility)
    }

    /// Stable string id used in storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::Sprout => "sprout",
            Self::Bloom => "bloom",
        }
    }

    /// Parses a stored stage value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "seed" => Some(Self::Seed),
            "sprout" => Some(Self::Sprout),
            "bloom" => Some(Self::Bloom),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Stage, SEED_MAX_BODY_CHARS, SPROUT_MAX_BODY_CHARS};
    use crate::model::visibility::Visibility;

    #[test]
    fn forward_chain_ends_at_bloom() {
        assert_eq!(Stage::Seed.next(), Some(Stage::Sprout));
        assert_eq!(Stage::Sprout.next(), Some(Stage::Bloom));
        assert_eq!(Stage::Bloom.next(), None);
        assert_eq!(Stage::Seed.previous(), None);
    }

    #[test]
    fn body_limits_follow_table() {
        assert!(Stage::Seed.allows_body(SEED_MAX_BODY_CHARS));
        assert!(!Stage::Seed.allows_body(SEED_MAX_BODY_CHARS + 1));
        assert!(Stage::Sprout.allows_body(SPROUT_MAX_BODY_CHARS));
        assert!(!Stage::Sprout.allows_body(SPROUT_MAX_BODY_CHARS + 1));
        assert!(Stage::Bloom.allows_body(1_000_000));
    }

    #[test]
    fn only_bloom_may_be_garden_visible() {
        assert!(!Stage::Seed.allows_visibility(Visibility::Garden));
        assert!(!Stage::Sprout.allows_visibility(Visibility::Garden));
        assert!(Stage::Bloom.allows_visibility(Visibility::Garden));
        assert!(!Stage::Seed.allows_visibility(Visibility::Circle));
        assert!(Stage::Sprout.allows_visibility(Visibility::Circle));
    }

    #[test]
    fn seeds_hold_no_edges() {
        assert!(!Stage::Seed.rules().holds_edges);
        assert!(Stage::Sprout.rules().holds_edges);
        assert!(Stage::Bloom.rules().holds_edges);
    }

    #[test]
    fn parse_round_trips_stage_ids() {
        for stage in [Stage::Seed, Stage::Sprout, Stage::Bloom] {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
        assert_eq!(Stage::parse("Seed"), None);
    }
}
