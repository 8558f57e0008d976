//! Ranking pets within a group.
//!
//! Pets are ordered by total points (highest first), then by negative behaviors
//! (fewest first). Pets equal on both are tied and share a rank; the next rank
//! skips ahead, so a two-way tie for first is followed by third.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::score::DailyScore;
use crate::types::PetId;

/// An inclusive range of logical days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateSpan {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateSpan {
    /// A span covering exactly one day.
    pub const fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The `days` days ending with `end`, inclusive. Zero is treated as one.
    ///
    /// Spans reaching past the earliest representable date start there.
    pub fn ending(end: NaiveDate, days: u32) -> Self {
        let back = Days::new(u64::from(days.saturating_sub(1)));
        Self {
            start: end.checked_sub_days(back).unwrap_or(NaiveDate::MIN),
            end,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start..=self.end).contains(&date)
    }
}

/// One pet's standing in a ranking. Rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetRanking {
    pub pet_id: PetId,
    pub pet_name: String,
    pub owner_name: String,
    pub total_points: i64,
    pub today_points: i64,
    pub positive_behaviors: i64,
    pub negative_behaviors: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub rank: u32,
    pub is_tied: bool,
}

impl PetRanking {
    /// An unranked entry with zeroed totals.
    pub const fn new(pet_id: PetId, pet_name: String, owner_name: String) -> Self {
        Self {
            pet_id,
            pet_name,
            owner_name,
            total_points: 0,
            today_points: 0,
            positive_behaviors: 0,
            negative_behaviors: 0,
            last_activity_at: None,
            rank: 0,
            is_tied: false,
        }
    }

    fn absorb(&mut self, score: &DailyScore, today: NaiveDate) {
        self.total_points += score.total_points;
        if score.date == today {
            self.today_points += score.total_points;
        }
        self.positive_behaviors += score.positive_behaviors;
        self.negative_behaviors += score.negative_behaviors;
        self.last_activity_at = self.last_activity_at.max(score.last_activity_at);
    }
}

/// Orders two standings; `Equal` means a true tie.
pub fn compare_standing(a: &PetRanking, b: &PetRanking) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| a.negative_behaviors.cmp(&b.negative_behaviors))
}

/// Folds score rows into one entry per pet, ordered by pet ID.
///
/// Rows outside `span` are ignored. `describe` supplies the pet and owner names.
pub fn collect_standings<F>(
    scores: &[DailyScore],
    span: DateSpan,
    today: NaiveDate,
    mut describe: F,
) -> Vec<PetRanking>
where
    F: FnMut(&PetId) -> (String, String),
{
    let mut by_pet: BTreeMap<&PetId, PetRanking> = BTreeMap::new();
    for score in scores.iter().filter(|s| span.contains(s.date)) {
        by_pet
            .entry(&score.pet_id)
            .or_insert_with(|| {
                let (pet_name, owner_name) = describe(&score.pet_id);
                PetRanking::new(score.pet_id.clone(), pet_name, owner_name)
            })
            .absorb(score, today);
    }
    by_pet.into_values().collect()
}

/// Sorts `standings` and assigns ranks.
///
/// The sort is stable, so tied pets keep their input order. Each entry is only
/// compared with its predecessor; the sort makes that sufficient.
pub fn rank(mut standings: Vec<PetRanking>) -> Vec<PetRanking> {
    standings.sort_by(compare_standing);

    for index in 0..standings.len() {
        if index == 0 {
            standings[0].rank = 1;
            standings[0].is_tied = false;
            continue;
        }
        let (before, after) = standings.split_at_mut(index);
        let previous = &mut before[index - 1];
        let current = &mut after[0];
        if compare_standing(previous, current) == Ordering::Equal {
            current.rank = previous.rank;
            current.is_tied = true;
            previous.is_tied = true;
        } else {
            current.rank = u32::try_from(index + 1).unwrap_or(u32::MAX);
            current.is_tied = false;
        }
    }

    standings
}
