//! Harvest analytics: aggregate statistics over one user's notes.
//!
//! Every function recomputes from the slice it is handed. Calendar
//! buckets (streaks, months) are evaluated in the time zone of `now`.

use crate::model::note::Note;
use crate::model::stage::Stage;
use crate::model::NoteId;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap};

/// Tags listed in `most_used_tags`.
pub const HARVEST_TOP_TAGS: usize = 10;
/// Notes listed in `most_revisited_notes`.
pub const HARVEST_TOP_REVISITED: usize = 5;
/// Tags considered for `recurring_themes`.
pub const HARVEST_THEME_TAGS: usize = 5;
/// Trailing window of `monthly_activity`, current month inclusive.
pub const HARVEST_MONTHS: u32 = 12;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub seed: usize,
    pub sprout: usize,
    pub bloom: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthActivity {
    /// `"Mon YYYY"`, e.g. `"Mar 2026"`.
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub tag: String,
    /// Share of notes carrying the tag, in whole percent.
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisitedNote {
    pub id: NoteId,
    pub title: String,
    pub stage: Stage,
    pub revisit_count: u32,
}

/// Full harvest report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Harvest {
    pub total_notes: usize,
    pub notes_by_stage: StageCounts,
    pub total_word_count: u64,
    pub most_used_tags: Vec<TagCount>,
    pub writing_streak: u32,
    pub most_revisited_notes: Vec<RevisitedNote>,
    pub monthly_activity: Vec<MonthActivity>,
    pub recurring_themes: Vec<Theme>,
}

/// Composes every harvest statistic for one snapshot.
pub fn harvest<Tz: TimeZone>(notes: &[Note], now: &DateTime<Tz>) -> Harvest {
    Harvest {
        total_notes: notes.len(),
        notes_by_stage: count_by_stage(notes),
        total_word_count: total_words(notes),
        most_used_tags: top_tags(notes, HARVEST_TOP_TAGS),
        writing_streak: writing_streak(notes, now),
        most_revisited_notes: most_revisited(notes, HARVEST_TOP_REVISITED)
            .into_iter()
            .map(|note| RevisitedNote {
                id: note.id,
                title: note.title.clone(),
                stage: note.stage,
                revisit_count: note.revisit_count,
            })
            .collect(),
        monthly_activity: monthly_activity(notes, now),
        recurring_themes: recurring_themes(notes),
    }
}

pub fn count_by_stage(notes: &[Note]) -> StageCounts {
    notes.iter().fold(StageCounts::default(), |mut counts, note| {
        match note.stage {
            Stage::Seed => counts.seed += 1,
            Stage::Sprout => counts.sprout += 1,
            Stage::Bloom => counts.bloom += 1,
        }
        counts
    })
}

pub fn total_words(notes: &[Note]) -> u64 {
    notes.iter().map(|note| u64::from(note.word_count)).sum()
}

/// Tag frequency, highest first; ties keep first-seen order.
pub fn top_tags(notes: &[Note], limit: usize) -> Vec<TagCount> {
    let mut order: Vec<TagCount> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for tag in notes.iter().flat_map(|note| note.tags.iter()) {
        match index.get(tag.as_str()) {
            Some(slot) => order[*slot].count += 1,
            None => {
                index.insert(tag.as_str(), order.len());
                order.push(TagCount {
                    tag: tag.clone(),
                    count: 1,
                });
            }
        }
    }
    order.sort_by_key(|entry| Reverse(entry.count));
    order.truncate(limit);
    order
}

/// Consecutive creation days ending today or yesterday.
///
/// Returns 0 when the most recent creation day is older than yesterday.
pub fn writing_streak<Tz: TimeZone>(notes: &[Note], now: &DateTime<Tz>) -> u32 {
    let tz = now.timezone();
    let days: BTreeSet<NaiveDate> = notes
        .iter()
        .map(|note| note.created_at.with_timezone(&tz).date_naive())
        .collect();

    let today = now.date_naive();
    let mut cursor = if days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

/// Creation counts for the trailing twelve months, oldest first.
pub fn monthly_activity<Tz: TimeZone>(notes: &[Note], now: &DateTime<Tz>) -> Vec<MonthActivity> {
    let tz = now.timezone();
    let Some(current) = now.date_naive().with_day(1) else {
        return Vec::new();
    };

    let mut per_month: HashMap<(i32, u32), usize> = HashMap::new();
    for note in notes {
        let created = note.created_at.with_timezone(&tz);
        *per_month.entry((created.year(), created.month())).or_default() += 1;
    }

    (0..HARVEST_MONTHS)
        .rev()
        .filter_map(|back| current.checked_sub_months(Months::new(back)))
        .map(|month| MonthActivity {
            month: month.format("%b %Y").to_string(),
            count: per_month
                .get(&(month.year(), month.month()))
                .copied()
                .unwrap_or(0),
        })
        .collect()
}

/// Notes by descending revisit count; ties keep input order.
pub fn most_revisited(notes: &[Note], limit: usize) -> Vec<&Note> {
    let mut ranked: Vec<&Note> = notes.iter().collect();
    ranked.sort_by_key(|note| Reverse(note.revisit_count));
    ranked.truncate(limit);
    ranked
}

/// Top tags annotated with the share of notes carrying each.
pub fn recurring_themes(notes: &[Note]) -> Vec<Theme> {
    if notes.is_empty() {
        return Vec::new();
    }
    let total = notes.len() as f64;
    top_tags(notes, HARVEST_THEME_TAGS)
        .into_iter()
        .map(|entry| Theme {
            frequency: (entry.count as f64 * 100.0 / total).round() as u32,
            tag: entry.tag,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        count_by_stage, harvest, monthly_activity, most_revisited, recurring_themes, top_tags,
        total_words, writing_streak, TagCount,
    };
    use crate::model::note::Note;
    use crate::model::stage::Stage;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 18, 0, 0).unwrap()
    }

    fn tagged(tags: &[&str]) -> Note {
        let mut note = Note::new("ada", "t", "body");
        note.tags = tags.iter().map(|tag| tag.to_string()).collect();
        note
    }

    fn created_days_ago(days: i64) -> Note {
        let mut note = Note::new("ada", "t", "body");
        note.created_at = now() - Duration::days(days);
        note
    }

    #[test]
    fn top_tags_counts_and_orders() {
        let notes = vec![tagged(&["a"]), tagged(&["a", "b"])];
        assert_eq!(
            top_tags(&notes, 10),
            vec![
                TagCount {
                    tag: "a".into(),
                    count: 2
                },
                TagCount {
                    tag: "b".into(),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn top_tags_ties_keep_first_seen_order() {
        let notes = vec![tagged(&["zeta"]), tagged(&["alpha"]), tagged(&["zeta", "alpha", "mid"])];
        let tags: Vec<String> = top_tags(&notes, 2).into_iter().map(|entry| entry.tag).collect();
        assert_eq!(tags, vec!["zeta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn streak_stops_at_first_gap() {
        assert_eq!(writing_streak(&[], &now()), 0);
        let notes = vec![created_days_ago(0), created_days_ago(1), created_days_ago(3)];
        assert_eq!(writing_streak(&notes, &now()), 2);
    }

    #[test]
    fn streak_may_end_yesterday_but_not_earlier() {
        let yesterday = vec![created_days_ago(1), created_days_ago(2)];
        assert_eq!(writing_streak(&yesterday, &now()), 2);
        let stale = vec![created_days_ago(2), created_days_ago(3)];
        assert_eq!(writing_streak(&stale, &now()), 0);
    }

    #[test]
    fn streak_counts_same_day_once() {
        let notes = vec![created_days_ago(0), created_days_ago(0)];
        assert_eq!(writing_streak(&notes, &now()), 1);
    }

    #[test]
    fn monthly_activity_zero_fills_trailing_year() {
        let notes = vec![created_days_ago(0), created_days_ago(0), created_days_ago(50)];
        let months = monthly_activity(&notes, &now());
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].month, "Apr 2025");
        assert_eq!(months[11].month, "Mar 2026");
        assert_eq!(months[11].count, 2);
        assert_eq!(months[10].month, "Feb 2026");
        assert_eq!(months[10].count, 0);
        assert_eq!(months[9].month, "Jan 2026");
        assert_eq!(months[9].count, 1);
    }

    #[test]
    fn most_revisited_ranks_descending() {
        let mut notes = vec![tagged(&[]), tagged(&[]), tagged(&[])];
        notes[0].revisit_count = 1;
        notes[1].revisit_count = 9;
        notes[2].revisit_count = 4;
        let ranked: Vec<u32> = most_revisited(&notes, 2)
            .iter()
            .map(|note| note.revisit_count)
            .collect();
        assert_eq!(ranked, vec![9, 4]);
    }

    #[test]
    fn recurring_themes_round_share_of_notes() {
        let notes = vec![tagged(&["a"]), tagged(&["a"]), tagged(&["b"])];
        let themes = recurring_themes(&notes);
        assert_eq!(themes[0].tag, "a");
        assert_eq!(themes[0].frequency, 67);
        assert_eq!(themes[1].frequency, 33);
        assert!(recurring_themes(&[]).is_empty());
    }

    #[test]
    fn harvest_is_repeatable_for_one_snapshot() {
        let mut notes = vec![tagged(&["poem"]), created_days_ago(1)];
        notes[0].stage = Stage::Sprout;
        notes[0].word_count = 12;

        let first = harvest(&notes, &now());
        let second = harvest(&notes, &now());
        assert_eq!(first, second);
        assert_eq!(first.total_notes, 2);
        assert_eq!(first.notes_by_stage, count_by_stage(&notes));
        assert_eq!(first.notes_by_stage.sprout, 1);
        assert_eq!(first.total_word_count, total_words(&notes));
        assert_eq!(first.total_word_count, 13);
    }
}
