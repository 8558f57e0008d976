//! Contracts the engine needs from its surroundings.
//!
//! Persistence, authorization, and user settings live outside this crate. A
//! backend implements every trait here; the `pp-db` crate provides a SQLite one
//! and [`MemoryStore`](crate::MemoryStore) an in-memory one.
//!
//! Errors raised by a backend reach the caller unchanged inside
//! [`EngineError::Store`](crate::EngineError::Store).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::behavior::{Behavior, Species};
use crate::boundary::TimezoneSettings;
use crate::log::{BehaviorLog, GroupShare};
use crate::score::DailyScore;
use crate::types::{BehaviorId, GroupId, LogId, PetId, UserId};
use crate::winner::PetOfTheDayWinner;

/// Shared error type and transaction boundary for a backend.
pub trait Store {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Runs `f` as one unit of work.
    ///
    /// If `f` returns `Err`, nothing it wrote may remain visible. The outer
    /// result reports failures of the transaction itself. Read-modify-write
    /// sequences on a [`DailyScore`] key run inside this call, so a backend
    /// shared between writers must serialize them here.
    fn atomically<T, E, F>(&mut self, f: F) -> Result<Result<T, E>, Self::Error>
    where
        F: FnOnce(&mut Self) -> Result<T, E>;
}

/// Behavior catalog lookups and administration.
pub trait CatalogStore: Store {
    fn behavior(&self, id: &BehaviorId) -> Result<Option<Behavior>, Self::Error>;

    /// Every behavior, active or not, ordered by ID.
    fn all_behaviors(&self) -> Result<Vec<Behavior>, Self::Error>;

    /// Active behaviors ordered by ID.
    fn active_behaviors(&self) -> Result<Vec<Behavior>, Self::Error>;

    /// Active behaviors that apply to `species`, including those marked `both`.
    fn behaviors_for_species(&self, species: Species) -> Result<Vec<Behavior>, Self::Error>;

    fn insert_behavior(&mut self, behavior: &Behavior) -> Result<(), Self::Error>;

    /// Overwrites every field of an existing behavior. Returns `false` if it
    /// does not exist.
    fn update_behavior(&mut self, behavior: &Behavior) -> Result<bool, Self::Error>;
}

/// Criteria for [`LogStore::search_logs`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub pet_id: Option<PetId>,
    pub behavior_id: Option<BehaviorId>,
    pub group_id: Option<GroupId>,
    pub user_id: Option<UserId>,
    /// Inclusive lower bound on `logged_at`.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `logged_at`.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl LogFilter {
    /// Whether `log` satisfies every criterion except paging.
    pub fn matches(&self, log: &BehaviorLog) -> bool {
        self.pet_id.as_ref().is_none_or(|p| &log.pet_id == p)
            && self.behavior_id.as_ref().is_none_or(|b| &log.behavior_id == b)
            && self.group_id.as_ref().is_none_or(|g| log.is_shared_with(g))
            && self.user_id.as_ref().is_none_or(|u| &log.user_id == u)
            && self.from.is_none_or(|from| log.logged_at >= from)
            && self.until.is_none_or(|until| log.logged_at < until)
    }
}

/// Behavior log persistence.
pub trait LogStore: Store {
    /// Stores a new log together with its group shares.
    fn insert_log(&mut self, log: &BehaviorLog) -> Result<(), Self::Error>;

    fn log(&self, id: &LogId) -> Result<Option<BehaviorLog>, Self::Error>;

    /// The latest `logged_at` of any log for this pet and behavior.
    fn last_logged_at(
        &self,
        pet_id: &PetId,
        behavior_id: &BehaviorId,
    ) -> Result<Option<DateTime<Utc>>, Self::Error>;

    /// Logs matching `filter`, newest `logged_at` first.
    fn search_logs(&self, filter: &LogFilter) -> Result<Vec<BehaviorLog>, Self::Error>;

    /// Hard-deletes a log and its shares. Returns `false` if it did not exist.
    fn delete_log(&mut self, id: &LogId) -> Result<bool, Self::Error>;

    fn insert_share(&mut self, log_id: &LogId, share: &GroupShare) -> Result<(), Self::Error>;

    /// Returns `false` if the log was not shared with the group.
    fn delete_share(&mut self, log_id: &LogId, group_id: &GroupId) -> Result<bool, Self::Error>;
}

/// Criteria for [`ScoreStore::search_scores`]. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreFilter {
    pub pet_id: Option<PetId>,
    pub group_id: Option<GroupId>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl ScoreFilter {
    pub fn matches(&self, score: &DailyScore) -> bool {
        self.pet_id.as_ref().is_none_or(|p| &score.pet_id == p)
            && self.group_id.as_ref().is_none_or(|g| &score.group_id == g)
            && self.from.is_none_or(|from| score.date >= from)
            && self.until.is_none_or(|until| score.date <= until)
    }
}

/// Daily score persistence.
pub trait ScoreStore: Store {
    /// Returns the row for the key, creating an empty one first if needed.
    ///
    /// Calling it twice for one key never creates two rows.
    fn get_or_create_score(
        &mut self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyScore, Self::Error>;

    fn score(
        &self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<Option<DailyScore>, Self::Error>;

    /// Writes back totals for an existing row.
    fn update_score(&mut self, score: &DailyScore) -> Result<(), Self::Error>;

    /// Rows matching `filter`, ordered by date then pet ID.
    fn search_scores(&self, filter: &ScoreFilter) -> Result<Vec<DailyScore>, Self::Error>;

    fn delete_score(
        &mut self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<bool, Self::Error>;
}

/// Pet of the Day persistence.
pub trait WinnerStore: Store {
    fn insert_winner(&mut self, winner: &PetOfTheDayWinner) -> Result<(), Self::Error>;

    /// Winners for the group and date, ordered by pet ID.
    fn winners(
        &self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<Vec<PetOfTheDayWinner>, Self::Error>;

    /// Returns how many rows were removed.
    fn delete_winners(&mut self, group_id: &GroupId, date: NaiveDate)
    -> Result<usize, Self::Error>;
}

/// What the engine needs to know about a pet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PetInfo {
    pub name: String,
    pub species: Species,
    pub owner_name: String,
}

/// What the engine needs to know about a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupInfo {
    pub name: String,
}

/// Access checks, pet and group facts, and user settings.
pub trait Directory: Store {
    fn can_access_pet(&self, user_id: &UserId, pet_id: &PetId) -> Result<bool, Self::Error>;

    fn can_access_group(&self, user_id: &UserId, group_id: &GroupId)
    -> Result<bool, Self::Error>;

    fn is_pet_in_group(&self, pet_id: &PetId, group_id: &GroupId) -> Result<bool, Self::Error>;

    fn pet_info(&self, pet_id: &PetId) -> Result<Option<PetInfo>, Self::Error>;

    fn group_info(&self, group_id: &GroupId) -> Result<Option<GroupInfo>, Self::Error>;

    /// Stored settings, or `None` if the user never saved any.
    fn timezone_settings(&self, user_id: &UserId)
    -> Result<Option<TimezoneSettings>, Self::Error>;
}

/// Everything [`ScoringEngine`](crate::ScoringEngine) runs on.
pub trait Backend: CatalogStore + LogStore + ScoreStore + WinnerStore + Directory {}

impl<T> Backend for T where T: CatalogStore + LogStore + ScoreStore + WinnerStore + Directory {}
