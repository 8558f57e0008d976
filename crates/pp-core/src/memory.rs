//! In-memory backend.
//!
//! Useful for tests and for embedding the engine without a database. Units of
//! work are made atomic by snapshotting the whole store and restoring it when
//! the work fails.

use std::collections::{BTreeMap, BTreeSet};
use std::convert::Infallible;

use chrono::{DateTime, NaiveDate, Utc};

use crate::behavior::{Behavior, Species};
use crate::boundary::TimezoneSettings;
use crate::log::{BehaviorLog, GroupShare};
use crate::score::DailyScore;
use crate::store::{
    CatalogStore, Directory, GroupInfo, LogFilter, LogStore, PetInfo, ScoreFilter, ScoreStore,
    Store, WinnerStore,
};
use crate::types::{BehaviorId, GroupId, LogId, PetId, UserId};
use crate::winner::PetOfTheDayWinner;

type ScoreKey = (PetId, GroupId, NaiveDate);

#[derive(Debug, Clone)]
struct PetRecord {
    info: PetInfo,
    owner_id: UserId,
}

/// A [`Backend`](crate::Backend) kept entirely in memory.
///
/// Pet owners can always access their pets. Everyone else needs an explicit
/// grant, as do all group members.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    behaviors: BTreeMap<BehaviorId, Behavior>,
    logs: BTreeMap<LogId, BehaviorLog>,
    scores: BTreeMap<ScoreKey, DailyScore>,
    winners: BTreeMap<(GroupId, NaiveDate), Vec<PetOfTheDayWinner>>,
    pets: BTreeMap<PetId, PetRecord>,
    groups: BTreeMap<GroupId, GroupInfo>,
    members: BTreeSet<(GroupId, PetId)>,
    pet_access: BTreeSet<(UserId, PetId)>,
    group_access: BTreeSet<(UserId, GroupId)>,
    settings: BTreeMap<UserId, TimezoneSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pet(
        &mut self,
        pet_id: PetId,
        name: impl Into<String>,
        species: Species,
        owner_id: UserId,
        owner_name: impl Into<String>,
    ) {
        let info = PetInfo {
            name: name.into(),
            species,
            owner_name: owner_name.into(),
        };
        self.pets.insert(pet_id, PetRecord { info, owner_id });
    }

    pub fn add_group(&mut self, group_id: GroupId, name: impl Into<String>) {
        self.groups.insert(group_id, GroupInfo { name: name.into() });
    }

    /// Makes the pet a member of the group.
    pub fn add_member(&mut self, group_id: GroupId, pet_id: PetId) {
        self.members.insert((group_id, pet_id));
    }

    pub fn grant_pet_access(&mut self, user_id: UserId, pet_id: PetId) {
        self.pet_access.insert((user_id, pet_id));
    }

    pub fn grant_group_access(&mut self, user_id: UserId, group_id: GroupId) {
        self.group_access.insert((user_id, group_id));
    }

    pub fn set_settings(&mut self, user_id: UserId, settings: TimezoneSettings) {
        self.settings.insert(user_id, settings);
    }

    /// Number of stored logs, for assertions.
    pub fn log_count(&self) -> usize {
        self.logs.len()
    }
}

impl Store for MemoryStore {
    type Error = Infallible;

    fn atomically<T, E, F>(&mut self, f: F) -> Result<Result<T, E>, Self::Error>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            *self = snapshot;
        }
        Ok(result)
    }
}

impl CatalogStore for MemoryStore {
    fn behavior(&self, id: &BehaviorId) -> Result<Option<Behavior>, Self::Error> {
        Ok(self.behaviors.get(id).cloned())
    }

    fn all_behaviors(&self) -> Result<Vec<Behavior>, Self::Error> {
        Ok(self.behaviors.values().cloned().collect())
    }

    fn active_behaviors(&self) -> Result<Vec<Behavior>, Self::Error> {
        Ok(self
            .behaviors
            .values()
            .filter(|b| b.is_active())
            .cloned()
            .collect())
    }

    fn behaviors_for_species(&self, species: Species) -> Result<Vec<Behavior>, Self::Error> {
        Ok(self
            .behaviors
            .values()
            .filter(|b| b.is_active() && b.is_valid_for_species(species))
            .cloned()
            .collect())
    }

    fn insert_behavior(&mut self, behavior: &Behavior) -> Result<(), Self::Error> {
        self.behaviors
            .insert(behavior.id().clone(), behavior.clone());
        Ok(())
    }

    fn update_behavior(&mut self, behavior: &Behavior) -> Result<bool, Self::Error> {
        Ok(self
            .behaviors
            .get_mut(behavior.id())
            .map(|existing| *existing = behavior.clone())
            .is_some())
    }
}

impl LogStore for MemoryStore {
    fn insert_log(&mut self, log: &BehaviorLog) -> Result<(), Self::Error> {
        self.logs.insert(log.id.clone(), log.clone());
        Ok(())
    }

    fn log(&self, id: &LogId) -> Result<Option<BehaviorLog>, Self::Error> {
        Ok(self.logs.get(id).cloned())
    }

    fn last_logged_at(
        &self,
        pet_id: &PetId,
        behavior_id: &BehaviorId,
    ) -> Result<Option<DateTime<Utc>>, Self::Error> {
        Ok(self
            .logs
            .values()
            .filter(|l| &l.pet_id == pet_id && &l.behavior_id == behavior_id)
            .map(|l| l.logged_at)
            .max())
    }

    fn search_logs(&self, filter: &LogFilter) -> Result<Vec<BehaviorLog>, Self::Error> {
        let mut logs: Vec<BehaviorLog> = self
            .logs
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.logged_at.cmp(&a.logged_at).then_with(|| a.id.cmp(&b.id)));
        let page = logs
            .into_iter()
            .skip(filter.offset)
            .take(filter.limit.unwrap_or(usize::MAX));
        Ok(page.collect())
    }

    fn delete_log(&mut self, id: &LogId) -> Result<bool, Self::Error> {
        Ok(self.logs.remove(id).is_some())
    }

    fn insert_share(&mut self, log_id: &LogId, share: &GroupShare) -> Result<(), Self::Error> {
        if let Some(log) = self.logs.get_mut(log_id) {
            log.group_shares.push(share.clone());
        }
        Ok(())
    }

    fn delete_share(&mut self, log_id: &LogId, group_id: &GroupId) -> Result<bool, Self::Error> {
        Ok(self
            .logs
            .get_mut(log_id)
            .and_then(|log| log.remove_share(group_id))
            .is_some())
    }
}

impl ScoreStore for MemoryStore {
    fn get_or_create_score(
        &mut self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<DailyScore, Self::Error> {
        let key = (pet_id.clone(), group_id.clone(), date);
        let score = self
            .scores
            .entry(key)
            .or_insert_with(|| DailyScore::empty(pet_id.clone(), group_id.clone(), date, now));
        Ok(score.clone())
    }

    fn score(
        &self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<Option<DailyScore>, Self::Error> {
        let key = (pet_id.clone(), group_id.clone(), date);
        Ok(self.scores.get(&key).cloned())
    }

    fn update_score(&mut self, score: &DailyScore) -> Result<(), Self::Error> {
        let key = (score.pet_id.clone(), score.group_id.clone(), score.date);
        if let Some(existing) = self.scores.get_mut(&key) {
            *existing = score.clone();
        }
        Ok(())
    }

    fn search_scores(&self, filter: &ScoreFilter) -> Result<Vec<DailyScore>, Self::Error> {
        let mut scores: Vec<DailyScore> = self
            .scores
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        scores.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.pet_id.cmp(&b.pet_id))
                .then_with(|| a.group_id.cmp(&b.group_id))
        });
        Ok(scores)
    }

    fn delete_score(
        &mut self,
        pet_id: &PetId,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<bool, Self::Error> {
        let key = (pet_id.clone(), group_id.clone(), date);
        Ok(self.scores.remove(&key).is_some())
    }
}

impl WinnerStore for MemoryStore {
    fn insert_winner(&mut self, winner: &PetOfTheDayWinner) -> Result<(), Self::Error> {
        let rows = self
            .winners
            .entry((winner.group_id.clone(), winner.date))
            .or_default();
        rows.push(winner.clone());
        rows.sort_by(|a, b| a.pet_id.cmp(&b.pet_id));
        Ok(())
    }

    fn winners(
        &self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<Vec<PetOfTheDayWinner>, Self::Error> {
        Ok(self
            .winners
            .get(&(group_id.clone(), date))
            .cloned()
            .unwrap_or_default())
    }

    fn delete_winners(
        &mut self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> Result<usize, Self::Error> {
        Ok(self
            .winners
            .remove(&(group_id.clone(), date))
            .map_or(0, |rows| rows.len()))
    }
}

impl Directory for MemoryStore {
    fn can_access_pet(&self, user_id: &UserId, pet_id: &PetId) -> Result<bool, Self::Error> {
        let owns = self
            .pets
            .get(pet_id)
            .is_some_and(|pet| &pet.owner_id == user_id);
        Ok(owns || self.pet_access.contains(&(user_id.clone(), pet_id.clone())))
    }

    fn can_access_group(
        &self,
        user_id: &UserId,
        group_id: &GroupId,
    ) -> Result<bool, Self::Error> {
        Ok(self
            .group_access
            .contains(&(user_id.clone(), group_id.clone())))
    }

    fn is_pet_in_group(&self, pet_id: &PetId, group_id: &GroupId) -> Result<bool, Self::Error> {
        Ok(self.members.contains(&(group_id.clone(), pet_id.clone())))
    }

    fn pet_info(&self, pet_id: &PetId) -> Result<Option<PetInfo>, Self::Error> {
        Ok(self.pets.get(pet_id).map(|pet| pet.info.clone()))
    }

    fn group_info(&self, group_id: &GroupId) -> Result<Option<GroupInfo>, Self::Error> {
        Ok(self.groups.get(group_id).cloned())
    }

    fn timezone_settings(
        &self,
        user_id: &UserId,
    ) -> Result<Option<TimezoneSettings>, Self::Error> {
        Ok(self.settings.get(user_id).cloned())
    }
}
