//! Per-day score aggregates.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::log::BehaviorLog;
use crate::types::{GroupId, PetId};

/// Running totals for one pet, in one group, on one logical day.
///
/// Rows start at zero and only change through [`DailyScore::add_log`] and
/// [`DailyScore::remove_log`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyScore {
    pub pet_id: PetId,
    pub group_id: GroupId,
    pub date: NaiveDate,
    pub total_points: i64,
    pub positive_behaviors: i64,
    pub negative_behaviors: i64,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyScore {
    /// A fresh, empty score row.
    pub const fn empty(
        pet_id: PetId,
        group_id: GroupId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pet_id,
            group_id,
            date,
            total_points: 0,
            positive_behaviors: 0,
            negative_behaviors: 0,
            last_activity_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies one log's contribution.
    ///
    /// `last_activity_at` takes the log's `logged_at` even if it is earlier than
    /// the current value: the most recently applied log wins.
    pub fn add_log(&mut self, log: &BehaviorLog, now: DateTime<Utc>) {
        let points = i64::from(log.points_awarded);
        self.total_points += points;
        if points > 0 {
            self.positive_behaviors += 1;
        } else if points < 0 {
            self.negative_behaviors += 1;
        }
        self.last_activity_at = Some(log.logged_at);
        self.updated_at = now;
    }

    /// Reverses one log's contribution.
    ///
    /// The behavior counters floor at zero. Removing a log twice is a caller
    /// bug that the floor hides rather than reports.
    pub fn remove_log(&mut self, log: &BehaviorLog, now: DateTime<Utc>) {
        let points = i64::from(log.points_awarded);
        self.total_points -= points;
        if points > 0 {
            self.positive_behaviors = (self.positive_behaviors - 1).max(0);
        } else if points < 0 {
            self.negative_behaviors = (self.negative_behaviors - 1).max(0);
        }
        self.updated_at = now;
    }
}
