//! Note visibility levels.

use serde::{Deserialize, Serialize};

/// Who may read a note besides its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Owner only.
    Private,
    /// Owner plus members of the note's shared circles.
    Circle,
    /// Every user; publicly discoverable.
    Garden,
}

impl Visibility {
    /// Stable string id used in storage and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Circle => "circle",
            Self::Garden => "garden",
        }
    }

    /// Parses a stored visibility value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Self::Private),
            "circle" => Some(Self::Circle),
            "garden" => Some(Self::Garden),
            _ => None,
        }
    }
}
