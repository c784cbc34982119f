//! Non-chronological temporal signals: warmth, season, sort orders and
//! revisit scheduling.
//!
//! # Invariants
//! - Every function is a pure view over the notes it is given; nothing is
//!   cached between calls.
//! - Only `SortStrategy::Discovery` is non-deterministic.

use crate::model::note::Note;
use crate::model::stage::Stage;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Recency bucket of a note's last tending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Temperature {
    Warm,
    Mild,
    Cool,
    Cold,
}

impl Temperature {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Warm => "warm",
            Self::Mild => "mild",
            Self::Cool => "cool",
            Self::Cold => "cold",
        }
    }

    /// Weight in `[0, 1]`, decreasing from warm to cold.
    pub fn intensity(self) -> f64 {
        match self {
            Self::Warm => 1.0,
            Self::Mild => 0.7,
            Self::Cool => 0.4,
            Self::Cold => 0.15,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Warmth {
    pub temperature: Temperature,
    pub intensity: f64,
}

/// Buckets time since `last_tended`: <24h warm, <7d mild, <30d cool,
/// otherwise cold. Future timestamps count as just tended.
pub fn warmth<Tz: TimeZone>(last_tended: DateTime<Utc>, now: &DateTime<Tz>) -> Warmth {
    let elapsed = now.with_timezone(&Utc) - last_tended;
    let elapsed = elapsed.max(Duration::zero());
    let temperature = if elapsed < Duration::hours(24) {
        Temperature::Warm
    } else if elapsed < Duration::days(7) {
        Temperature::Mild
    } else if elapsed < Duration::days(30) {
        Temperature::Cool
    } else {
        Temperature::Cold
    };
    Warmth {
        temperature,
        intensity: temperature.intensity(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeasonLabel {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl SeasonLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Autumn => "autumn",
            Self::Winter => "winter",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Spring => "Many new seeds are taking root.",
            Self::Summer => "Ideas are growing and branching out.",
            Self::Autumn => "Work is ripening into finished pieces.",
            Self::Winter => "The garden is resting.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub label: SeasonLabel,
    pub description: &'static str,
}

/// Classifies a whole note set by stage ratios.
///
/// Seeds above 50% is spring, else sprouts above 40% is summer, else
/// blooms above 30% is autumn, else winter. Empty sets are winter.
pub fn season(notes: &[Note]) -> Season {
    let total = notes.len();
    let count = |stage: Stage| notes.iter().filter(|note| note.stage == stage).count();

    let label = if total == 0 {
        SeasonLabel::Winter
    } else if count(Stage::Seed) * 100 > total * 50 {
        SeasonLabel::Spring
    } else if count(Stage::Sprout) * 100 > total * 40 {
        SeasonLabel::Summer
    } else if count(Stage::Bloom) * 100 > total * 30 {
        SeasonLabel::Autumn
    } else {
        SeasonLabel::Winter
    };
    Season {
        label,
        description: label.description(),
    }
}

/// Ordering applied to a note list before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortStrategy {
    /// Most recently updated first.
    RecentlyTended,
    /// Least recently updated first.
    DeepestRoots,
    /// Uniform random shuffle, different on every call.
    Discovery,
    /// Most edges first; ties keep their input order.
    ConnectionDensity,
}

impl SortStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "recently-tended" => Some(Self::RecentlyTended),
            "deepest-roots" => Some(Self::DeepestRoots),
            "discovery" => Some(Self::Discovery),
            "connection-density" => Some(Self::ConnectionDensity),
            _ => None,
        }
    }
}

/// Sorts notes with a fresh thread-local RNG for `Discovery`.
pub fn sort_notes(notes: Vec<Note>, strategy: SortStrategy) -> Vec<Note> {
    sort_notes_with(notes, strategy, &mut rand::thread_rng())
}

/// Sorts notes, drawing `Discovery` randomness from `rng`.
pub fn sort_notes_with<R: Rng + ?Sized>(
    mut notes: Vec<Note>,
    strategy: SortStrategy,
    rng: &mut R,
) -> Vec<Note> {
    match strategy {
        SortStrategy::RecentlyTended => notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at)),
        SortStrategy::DeepestRoots => notes.sort_by(|a, b| a.updated_at.cmp(&b.updated_at)),
        SortStrategy::Discovery => notes.shuffle(rng),
        SortStrategy::ConnectionDensity => {
            notes.sort_by_key(|note| Reverse(note.edge_count()))
        }
    }
    notes
}

/// Notes whose scheduled revisit date is today or earlier in `now`'s zone.
pub fn due_for_revisit<'a, Tz: TimeZone>(
    notes: &'a [Note],
    now: &DateTime<Tz>,
) -> Vec<&'a Note> {
    let today = now.date_naive();
    notes
        .iter()
        .filter(|note| {
            note.revisit_on
                .map(|date| date.with_timezone(&now.timezone()).date_naive() <= today)
                .unwrap_or(false)
        })
        .collect()
}
