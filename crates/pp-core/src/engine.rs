//! The scoring engine: recording, reversing, ranking, and picking winners.
//!
//! Write operations run inside one [`Store::atomically`] call each. Daily scores
//! are updated in the same unit of work as the log they come from, and a log is
//! only deleted after its contribution has been reversed everywhere.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use crate::behavior::{Behavior, BehaviorDraft, Species};
use crate::boundary::{TimezoneSettings, resolve_logical_day};
use crate::error::{EngineError, Resource, StoreResultExt};
use crate::log::{BehaviorLog, RecordBehavior, remaining_wait};
use crate::ranking::{DateSpan, PetRanking, collect_standings, rank};
use crate::store::{Backend, ScoreFilter, Store};
use crate::types::{BehaviorId, GroupId, LogId, PetId, UserId, ValidationError};
use crate::winner::{PetOfTheDayWinner, eligible_winners};

/// Result of an engine operation on backend `S`.
pub type EngineResult<T, S> = Result<T, EngineError<<S as Store>::Error>>;

/// Entry point for every scoring operation.
#[derive(Debug)]
pub struct ScoringEngine<S> {
    store: S,
}

impl<S: Backend> ScoringEngine<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ========== Catalog ==========

    /// Adds a new catalog entry.
    pub fn add_behavior(
        &mut self,
        id: BehaviorId,
        draft: BehaviorDraft,
    ) -> EngineResult<Behavior, S> {
        let behavior = Behavior::new(id, draft)?;
        self.store
            .atomically(|store| add_behavior(store, behavior))
            .store_err()?
    }

    /// Replaces every field of an existing catalog entry.
    ///
    /// Logs recorded earlier keep the points they were awarded.
    pub fn update_behavior(
        &mut self,
        id: &BehaviorId,
        draft: BehaviorDraft,
    ) -> EngineResult<Behavior, S> {
        self.store
            .atomically(|store| update_behavior(store, id, draft))
            .store_err()?
    }

    /// Active behaviors a pet of `species` can be logged for.
    pub fn behaviors_for_species(&self, species: Species) -> EngineResult<Vec<Behavior>, S> {
        self.store.behaviors_for_species(species).store_err()
    }

    // ========== Day boundaries ==========

    /// The user's stored settings, or the defaults if there are none.
    pub fn settings_for(&self, user_id: &UserId) -> EngineResult<TimezoneSettings, S> {
        settings_for(&self.store, user_id)
    }

    /// The logical day `instant` falls on for `user_id`.
    pub fn logical_day(
        &self,
        user_id: &UserId,
        instant: DateTime<Utc>,
    ) -> EngineResult<NaiveDate, S> {
        logical_day_for(&self.store, user_id, instant)
    }

    // ========== Recording ==========

    /// Records a behavior now. See [`ScoringEngine::record_behavior_at`].
    pub fn record_behavior(&mut self, request: RecordBehavior) -> EngineResult<BehaviorLog, S> {
        self.record_behavior_at(request, Utc::now())
    }

    /// Validates, stores, and scores one behavior log.
    ///
    /// Each requested group gets a share, and the log's points are added to the
    /// pet's daily score in that group for the logical day of `logged_at` under
    /// the recording user's settings.
    pub fn record_behavior_at(
        &mut self,
        request: RecordBehavior,
        now: DateTime<Utc>,
    ) -> EngineResult<BehaviorLog, S> {
        self.store
            .atomically(|store| record(store, request, now))
            .store_err()?
    }

    /// Deletes a log now. See [`ScoringEngine::delete_behavior_log_at`].
    pub fn delete_behavior_log(
        &mut self,
        log_id: &LogId,
        user_id: &UserId,
    ) -> EngineResult<BehaviorLog, S> {
        self.delete_behavior_log_at(log_id, user_id, Utc::now())
    }

    /// Reverses a log's contribution from every group, then deletes it.
    ///
    /// Allowed for the user who recorded it and for anyone with access to the
    /// pet. The logical day is recomputed from `logged_at` with the recorder's
    /// current settings.
    pub fn delete_behavior_log_at(
        &mut self,
        log_id: &LogId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> EngineResult<BehaviorLog, S> {
        self.store
            .atomically(|store| delete(store, log_id, user_id, now))
            .store_err()?
    }

    /// Shares an existing log with one more group. See [`ScoringEngine::share_log_at`].
    pub fn share_log(
        &mut self,
        log_id: &LogId,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> EngineResult<BehaviorLog, S> {
        self.share_log_at(log_id, group_id, user_id, Utc::now())
    }

    /// Adds a group share to a log and scores it in that group.
    pub fn share_log_at(
        &mut self,
        log_id: &LogId,
        group_id: &GroupId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> EngineResult<BehaviorLog, S> {
        self.store
            .atomically(|store| share(store, log_id, group_id, user_id, now))
            .store_err()?
    }

    /// Withdraws a log from a group. See [`ScoringEngine::unshare_log_at`].
    pub fn unshare_log(
        &mut self,
        log_id: &LogId,
        group_id: &GroupId,
        user_id: &UserId,
    ) -> EngineResult<BehaviorLog, S> {
        self.unshare_log_at(log_id, group_id, user_id, Utc::now())
    }

    /// Reverses a log's contribution in one group, then removes the share.
    pub fn unshare_log_at(
        &mut self,
        log_id: &LogId,
        group_id: &GroupId,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> EngineResult<BehaviorLog, S> {
        self.store
            .atomically(|store| unshare(store, log_id, group_id, user_id, now))
            .store_err()?
    }

    // ========== Rankings and winners ==========

    /// Ranks the group's pets over `span`.
    ///
    /// `today` only decides which rows count towards `today_points`.
    pub fn rankings(
        &self,
        group_id: &GroupId,
        span: DateSpan,
        today: NaiveDate,
    ) -> EngineResult<Vec<PetRanking>, S> {
        rankings(&self.store, group_id, span, today)
    }

    /// Ranks the group's pets for the viewer's current logical day.
    pub fn todays_rankings(
        &self,
        group_id: &GroupId,
        viewer: &UserId,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<PetRanking>, S> {
        let today = self.logical_day(viewer, now)?;
        self.rankings(group_id, DateSpan::day(today), today)
    }

    /// Picks and stores the Pet(s) of the Day. See [`ScoringEngine::select_winners_at`].
    pub fn select_winners(
        &mut self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> EngineResult<Vec<PetOfTheDayWinner>, S> {
        self.select_winners_at(group_id, date, Utc::now())
    }

    /// Ranks the group for `date` and stores every eligible top pet.
    ///
    /// Earlier selections for the same group and date are replaced, so running
    /// this twice leaves one set of rows.
    pub fn select_winners_at(
        &mut self,
        group_id: &GroupId,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<PetOfTheDayWinner>, S> {
        self.store
            .atomically(|store| select_winners(store, group_id, date, now))
            .store_err()?
    }

    /// Previously selected winners for the group and date.
    pub fn winners(
        &self,
        group_id: &GroupId,
        date: NaiveDate,
    ) -> EngineResult<Vec<PetOfTheDayWinner>, S> {
        self.store.winners(group_id, date).store_err()
    }
}

fn add_behavior<S: Backend>(store: &mut S, behavior: Behavior) -> EngineResult<Behavior, S> {
    if store.behavior(behavior.id()).store_err()?.is_some() {
        return Err(ValidationError::DuplicateBehavior(behavior.id().to_string()).into());
    }
    store.insert_behavior(&behavior).store_err()?;
    tracing::info!(behavior = %behavior.id(), points = behavior.point_value(), "added behavior");
    Ok(behavior)
}

fn update_behavior<S: Backend>(
    store: &mut S,
    id: &BehaviorId,
    draft: BehaviorDraft,
) -> EngineResult<Behavior, S> {
    let not_found = || EngineError::NotFound(Resource::Behavior(id.clone()));
    let mut behavior = store.behavior(id).store_err()?.ok_or_else(not_found)?;
    behavior.update(draft)?;
    if !store.update_behavior(&behavior).store_err()? {
        return Err(not_found());
    }
    tracing::info!(behavior = %id, "updated behavior");
    Ok(behavior)
}

fn settings_for<S: Backend>(store: &S, user_id: &UserId) -> EngineResult<TimezoneSettings, S> {
    Ok(store.timezone_settings(user_id).store_err()?.unwrap_or_default())
}

fn logical_day_for<S: Backend>(
    store: &S,
    user_id: &UserId,
    instant: DateTime<Utc>,
) -> EngineResult<NaiveDate, S> {
    let settings = settings_for(store, user_id)?;
    Ok(resolve_logical_day(instant, &settings))
}

fn record<S: Backend>(
    store: &mut S,
    request: RecordBehavior,
    now: DateTime<Utc>,
) -> EngineResult<BehaviorLog, S> {
    let logged_at = request.validate(now)?;

    let behavior = store
        .behavior(&request.behavior_id)
        .store_err()?
        .ok_or_else(|| EngineError::NotFound(Resource::Behavior(request.behavior_id.clone())))?;
    if !behavior.is_active() {
        return Err(ValidationError::InactiveBehavior(behavior.id().to_string()).into());
    }

    let pet = store
        .pet_info(&request.pet_id)
        .store_err()?
        .ok_or_else(|| EngineError::NotFound(Resource::Pet(request.pet_id.clone())))?;
    if !behavior.is_valid_for_species(pet.species) {
        return Err(ValidationError::WrongSpecies {
            behavior: behavior.id().to_string(),
            species: pet.species.to_string(),
        }
        .into());
    }
    if !store.can_access_pet(&request.user_id, &request.pet_id).store_err()? {
        return Err(EngineError::unauthorized(
            request.user_id,
            Resource::Pet(request.pet_id),
        ));
    }

    let last = store
        .last_logged_at(&request.pet_id, &request.behavior_id)
        .store_err()?;
    if let Some(remaining) = remaining_wait(last, logged_at, behavior.min_interval()) {
        tracing::debug!(
            pet = %request.pet_id,
            behavior = %request.behavior_id,
            remaining_secs = remaining.num_seconds(),
            "behavior logged too recently"
        );
        return Err(EngineError::RateLimited {
            pet_id: request.pet_id,
            behavior_id: request.behavior_id,
            remaining,
        });
    }

    let mut log = BehaviorLog::new(
        request.pet_id,
        &behavior,
        request.user_id,
        logged_at,
        now,
        request.notes,
    );
    for group_id in request.group_ids {
        authorize_group(store, &log.user_id, &log.pet_id, &group_id)?;
        log.add_share(group_id, now)?;
    }

    store.insert_log(&log).store_err()?;

    let day = logical_day_for(store, &log.user_id, log.logged_at)?;
    for group_id in log.group_ids() {
        apply_to_group(store, &log, group_id, day, now)?;
    }

    tracing::info!(
        log = %log.id,
        pet = %log.pet_id,
        behavior = %log.behavior_id,
        points = log.points_awarded,
        groups = log.group_shares.len(),
        %day,
        "recorded behavior"
    );
    Ok(log)
}

fn delete<S: Backend>(
    store: &mut S,
    log_id: &LogId,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> EngineResult<BehaviorLog, S> {
    let log = load_log(store, log_id)?;
    authorize_log(store, user_id, &log)?;

    let day = logical_day_for(store, &log.user_id, log.logged_at)?;
    for group_id in log.group_ids() {
        reverse_from_group(store, &log, group_id, day, now)?;
    }
    if !store.delete_log(&log.id).store_err()? {
        return Err(EngineError::NotFound(Resource::Log(log.id)));
    }

    tracing::info!(log = %log.id, pet = %log.pet_id, %day, "deleted behavior log");
    Ok(log)
}

fn share<S: Backend>(
    store: &mut S,
    log_id: &LogId,
    group_id: &GroupId,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> EngineResult<BehaviorLog, S> {
    let mut log = load_log(store, log_id)?;
    authorize_log(store, user_id, &log)?;
    authorize_group(store, user_id, &log.pet_id, group_id)?;

    let added = log.add_share(group_id.clone(), now)?;
    store.insert_share(&log.id, &added).store_err()?;

    let day = logical_day_for(store, &log.user_id, log.logged_at)?;
    apply_to_group(store, &log, group_id, day, now)?;

    tracing::info!(log = %log.id, group = %group_id, %day, "shared behavior log");
    Ok(log)
}

fn unshare<S: Backend>(
    store: &mut S,
    log_id: &LogId,
    group_id: &GroupId,
    user_id: &UserId,
    now: DateTime<Utc>,
) -> EngineResult<BehaviorLog, S> {
    let mut log = load_log(store, log_id)?;
    authorize_log(store, user_id, &log)?;

    let share_missing = || {
        EngineError::NotFound(Resource::Share {
            log_id: log_id.clone(),
            group_id: group_id.clone(),
        })
    };
    if !log.is_shared_with(group_id) {
        return Err(share_missing());
    }

    let day = logical_day_for(store, &log.user_id, log.logged_at)?;
    reverse_from_group(store, &log, group_id, day, now)?;
    if !store.delete_share(&log.id, group_id).store_err()? {
        return Err(share_missing());
    }
    log.remove_share(group_id);

    tracing::info!(log = %log.id, group = %group_id, %day, "unshared behavior log");
    Ok(log)
}

fn load_log<S: Backend>(store: &S, log_id: &LogId) -> EngineResult<BehaviorLog, S> {
    store
        .log(log_id)
        .store_err()?
        .ok_or_else(|| EngineError::NotFound(Resource::Log(log_id.clone())))
}

/// The recorder, or anyone with access to the pet, may change a log.
fn authorize_log<S: Backend>(
    store: &S,
    user_id: &UserId,
    log: &BehaviorLog,
) -> EngineResult<(), S> {
    if &log.user_id == user_id || store.can_access_pet(user_id, &log.pet_id).store_err()? {
        return Ok(());
    }
    Err(EngineError::unauthorized(user_id.clone(), Resource::Log(log.id.clone())))
}

fn authorize_group<S: Backend>(
    store: &S,
    user_id: &UserId,
    pet_id: &PetId,
    group_id: &GroupId,
) -> EngineResult<(), S> {
    if store.group_info(group_id).store_err()?.is_none() {
        return Err(EngineError::NotFound(Resource::Group(group_id.clone())));
    }
    if !store.can_access_group(user_id, group_id).store_err()? {
        return Err(EngineError::unauthorized(user_id.clone(), Resource::Group(group_id.clone())));
    }
    if !store.is_pet_in_group(pet_id, group_id).store_err()? {
        return Err(ValidationError::PetNotInGroup {
            pet: pet_id.to_string(),
            group: group_id.to_string(),
        }
        .into());
    }
    Ok(())
}

fn apply_to_group<S: Backend>(
    store: &mut S,
    log: &BehaviorLog,
    group_id: &GroupId,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> EngineResult<(), S> {
    let mut score = store
        .get_or_create_score(&log.pet_id, group_id, day, now)
        .store_err()?;
    score.add_log(log, now);
    store.update_score(&score).store_err()?;
    tracing::debug!(
        pet = %log.pet_id,
        group = %group_id,
        %day,
        total = score.total_points,
        "applied log to daily score"
    );
    Ok(())
}

fn reverse_from_group<S: Backend>(
    store: &mut S,
    log: &BehaviorLog,
    group_id: &GroupId,
    day: NaiveDate,
    now: DateTime<Utc>,
) -> EngineResult<(), S> {
    let mut score = store
        .score(&log.pet_id, group_id, day)
        .store_err()?
        .ok_or_else(|| {
            EngineError::NotFound(Resource::Score {
                pet_id: log.pet_id.clone(),
                group_id: group_id.clone(),
                date: day,
            })
        })?;
    score.remove_log(log, now);
    store.update_score(&score).store_err()?;
    tracing::debug!(
        pet = %log.pet_id,
        group = %group_id,
        %day,
        total = score.total_points,
        "reversed log from daily score"
    );
    Ok(())
}

fn rankings<S: Backend>(
    store: &S,
    group_id: &GroupId,
    span: DateSpan,
    today: NaiveDate,
) -> EngineResult<Vec<PetRanking>, S> {
    if store.group_info(group_id).store_err()?.is_none() {
        return Err(EngineError::NotFound(Resource::Group(group_id.clone())));
    }
    let scores = store
        .search_scores(&ScoreFilter {
            group_id: Some(group_id.clone()),
            from: Some(span.start),
            until: Some(span.end),
            ..ScoreFilter::default()
        })
        .store_err()?;

    let pet_ids: BTreeSet<&PetId> = scores.iter().map(|s| &s.pet_id).collect();
    let mut names: HashMap<PetId, (String, String)> = HashMap::with_capacity(pet_ids.len());
    for pet_id in pet_ids {
        let described = store
            .pet_info(pet_id)
            .store_err()?
            .map_or_else(
                || (pet_id.to_string(), String::new()),
                |info| (info.name, info.owner_name),
            );
        names.insert(pet_id.clone(), described);
    }

    let standings = collect_standings(&scores, span, today, |pet_id| {
        names
            .remove(pet_id)
            .unwrap_or_else(|| (pet_id.to_string(), String::new()))
    });
    Ok(rank(standings))
}

fn select_winners<S: Backend>(
    store: &mut S,
    group_id: &GroupId,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> EngineResult<Vec<PetOfTheDayWinner>, S> {
    let ranked = rankings(store, group_id, DateSpan::day(date), date)?;
    let replaced = store.delete_winners(group_id, date).store_err()?;

    let winners: Vec<PetOfTheDayWinner> = eligible_winners(&ranked)
        .into_iter()
        .map(|ranking| PetOfTheDayWinner::from_ranking(group_id.clone(), date, ranking, now))
        .collect();
    for winner in &winners {
        store.insert_winner(winner).store_err()?;
    }

    tracing::info!(
        group = %group_id,
        %date,
        winners = winners.len(),
        replaced,
        "selected pet of the day"
    );
    Ok(winners)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::behavior::BehaviorCategory;
    use crate::memory::MemoryStore;
    use crate::score::DailyScore;
    use crate::store::{CatalogStore, LogStore, ScoreStore};

    type Engine = ScoringEngine<MemoryStore>;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn pet(id: &str) -> PetId {
        PetId::new(id).unwrap()
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn group(id: &str) -> GroupId {
        GroupId::new(id).unwrap()
    }

    fn behavior(id: &str) -> BehaviorId {
        BehaviorId::new(id).unwrap()
    }

    fn draft(name: &str, points: i32, interval: i64, species: Species) -> BehaviorDraft {
        BehaviorDraft {
            name: name.to_string(),
            category: BehaviorCategory::Training,
            point_value: points,
            min_interval_minutes: interval,
            species,
            active: true,
        }
    }

    /// Alice owns rex and tom (dogs) and whiskers (a cat). All three are in
    /// "family"; only rex is in "park". Alice can post to both groups.
    fn engine() -> Engine {
        let mut store = MemoryStore::new();
        let alice = user("alice");
        for (id, name, species) in [
            ("rex", "Rex", Species::Dog),
            ("tom", "Tom", Species::Dog),
            ("whiskers", "Whiskers", Species::Cat),
        ] {
            store.add_pet(pet(id), name, species, alice.clone(), "Alice");
            store.add_member(group("family"), pet(id));
        }
        store.add_group(group("family"), "Family");
        store.add_group(group("park"), "Dog park");
        store.add_member(group("park"), pet("rex"));
        store.grant_group_access(alice.clone(), group("family"));
        store.grant_group_access(alice, group("park"));

        let mut engine = ScoringEngine::new(store);
        engine
            .add_behavior(behavior("sit"), draft("Sat on command", 5, 30, Species::Dog))
            .unwrap();
        engine
            .add_behavior(behavior("fetch"), draft("Fetched the ball", 2, 5, Species::Dog))
            .unwrap();
        engine
            .add_behavior(behavior("chewed"), draft("Chewed a shoe", -3, 60, Species::Both))
            .unwrap();
        engine
            .add_behavior(behavior("purr"), draft("Purred on a lap", 1, 5, Species::Cat))
            .unwrap();
        engine
    }

    fn request(pet_id: &str, behavior_id: &str, groups: &[&str]) -> RecordBehavior {
        RecordBehavior::new(pet(pet_id), behavior(behavior_id), user("alice"))
            .in_groups(groups.iter().map(|g| group(g)))
    }

    fn score(engine: &Engine, pet_id: &str, group_id: &str, day: &str) -> Option<DailyScore> {
        engine
            .store()
            .score(&pet(pet_id), &group(group_id), date(day))
            .unwrap()
    }

    const NOON: &str = "2025-06-10T12:00:00Z";

    #[test]
    fn recording_scores_every_shared_group() {
        let mut engine = engine();
        let log = engine
            .record_behavior_at(request("rex", "sit", &["family", "park"]), ts(NOON))
            .unwrap();

        assert_eq!(log.points_awarded, 5);
        assert_eq!(log.logged_at, ts(NOON));
        assert_eq!(log.group_shares.len(), 2);
        // Default settings: UTC with a midnight reset.
        for g in ["family", "park"] {
            let row = score(&engine, "rex", g, "2025-06-11").unwrap();
            assert_eq!(row.total_points, 5);
            assert_eq!(row.positive_behaviors, 1);
            assert_eq!(row.last_activity_at, Some(ts(NOON)));
        }
        assert_eq!(engine.store().log(&log.id).unwrap(), Some(log));
    }

    #[test]
    fn unshared_log_touches_no_score() {
        let mut engine = engine();
        engine
            .record_behavior_at(request("rex", "sit", &[]), ts(NOON))
            .unwrap();
        assert!(score(&engine, "rex", "family", "2025-06-11").is_none());
        assert_eq!(engine.store().log_count(), 1);
    }

    #[test]
    fn min_interval_is_enforced_to_the_second() {
        let mut engine = engine();
        let first = ts(NOON);
        engine
            .record_behavior_at(request("rex", "sit", &["family"]), first)
            .unwrap();

        let early = first + Duration::minutes(30) - Duration::seconds(1);
        let err = engine
            .record_behavior_at(request("rex", "sit", &["family"]), early)
            .unwrap_err();
        assert!(matches!(err, EngineError::RateLimited { .. }));
        assert_eq!(err.retry_after(), Some(Duration::seconds(1)));

        let on_time = first + Duration::minutes(30);
        engine
            .record_behavior_at(request("rex", "sit", &["family"]), on_time)
            .unwrap();
        assert_eq!(
            score(&engine, "rex", "family", "2025-06-11")
                .unwrap()
                .total_points,
            10
        );
    }

    #[test]
    fn interval_is_per_pet_and_behavior() {
        let mut engine = engine();
        let now = ts(NOON);
        engine
            .record_behavior_at(request("rex", "sit", &["family"]), now)
            .unwrap();
        engine
            .record_behavior_at(request("tom", "sit", &["family"]), now)
            .unwrap();
        engine
            .record_behavior_at(request("rex", "fetch", &["family"]), now)
            .unwrap();
    }

    #[test]
    fn backdated_log_checks_interval_against_logged_at() {
        let mut engine = engine();
        engine
            .record_behavior_at(request("rex", "sit", &[]), ts(NOON))
            .unwrap();

        let backdated = request("rex", "sit", &[]).at(ts("2025-06-10T11:45:00Z"));
        let err = engine
            .record_behavior_at(backdated, ts("2025-06-10T13:00:00Z"))
            .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::minutes(45)));
    }

    #[test]
    fn catalog_updates_leave_recorded_points_alone() {
        let mut engine = engine();
        let log = engine
            .record_behavior_at(request("rex", "sit", &["family"]), ts(NOON))
            .unwrap();

        let mut changed = engine
            .store()
            .behavior(&behavior("sit"))
            .unwrap()
            .unwrap()
            .to_draft();
        changed.point_value = 9;
        engine.update_behavior(&behavior("sit"), changed).unwrap();

        let stored = engine.store().log(&log.id).unwrap().unwrap();
        assert_eq!(stored.points_awarded, 5);

        // Deleting reverses the frozen value, not the new one.
        engine
            .delete_behavior_log_at(&log.id, &user("alice"), ts(NOON))
            .unwrap();
        assert_eq!(
            score(&engine, "rex", "family", "2025-06-11")
                .unwrap()
                .total_points,
            0
        );
    }

    #[test]
    fn delete_reverses_every_group_then_removes_the_log() {
        let mut engine = engine();
        let keep = engine
            .record_behavior_at(request("rex", "fetch", &["family", "park"]), ts(NOON))
            .unwrap();
        let gone = engine
            .record_behavior_at(request("rex", "chewed", &["family", "park"]), ts(NOON))
            .unwrap();

        let removed = engine
            .delete_behavior_log_at(&gone.id, &user("alice"), ts("2025-06-10T13:00:00Z"))
            .unwrap();
        assert_eq!(removed.id, gone.id);

        for g in ["family", "park"] {
            let row = score(&engine, "rex", g, "2025-06-11").unwrap();
            assert_eq!(row.total_points, 2);
            assert_eq!(row.positive_behaviors, 1);
            assert_eq!(row.negative_behaviors, 0);
        }
        assert!(engine.store().log(&gone.id).unwrap().is_none());
        assert!(engine.store().log(&keep.id).unwrap().is_some());
    }

    #[test]
    fn failed_reversal_keeps_the_log() {
        let mut engine = engine();
        let log = engine
            .record_behavior_at(request("rex", "sit", &["family", "park"]), ts(NOON))
            .unwrap();
        engine
            .store_mut()
            .delete_score(&pet("rex"), &group("park"), date("2025-06-11"))
            .unwrap();

        let err = engine
            .delete_behavior_log_at(&log.id, &user("alice"), ts(NOON))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Score { .. })));

        assert!(engine.store().log(&log.id).unwrap().is_some());
        assert_eq!(
            score(&engine, "rex", "family", "2025-06-11")
                .unwrap()
                .total_points,
            5
        );
    }

    #[test]
    fn failure_on_a_later_group_rolls_back_everything() {
        let mut engine = engine();
        // tom is in family but not in park.
        let err = engine
            .record_behavior_at(request("tom", "sit", &["family", "park"]), ts(NOON))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::PetNotInGroup { .. })
        ));
        assert_eq!(engine.store().log_count(), 0);
        assert!(score(&engine, "tom", "family", "2025-06-11").is_none());
    }

    #[test]
    fn recording_rejects_bad_requests() {
        let mut engine = engine();
        let now = ts(NOON);

        let err = engine
            .record_behavior_at(request("rex", "nap", &[]), now)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Behavior(_))));

        let err = engine
            .record_behavior_at(request("ghost", "sit", &[]), now)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Pet(_))));

        let err = engine
            .record_behavior_at(request("whiskers", "sit", &[]), now)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::WrongSpecies { .. })
        ));

        let err = engine
            .record_behavior_at(request("rex", "sit", &["nowhere"]), now)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Group(_))));

        let future = request("rex", "sit", &[]).at(now + Duration::minutes(1));
        let err = engine.record_behavior_at(future, now).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::LoggedInFuture)
        ));

        assert_eq!(engine.store().log_count(), 0);
    }

    #[test]
    fn both_species_behaviors_apply_to_cats() {
        let mut engine = engine();
        engine
            .record_behavior_at(request("whiskers", "chewed", &["family"]), ts(NOON))
            .unwrap();
        let row = score(&engine, "whiskers", "family", "2025-06-11").unwrap();
        assert_eq!(row.total_points, -3);
        assert_eq!(row.negative_behaviors, 1);
    }

    #[test]
    fn inactive_behaviors_cannot_be_logged() {
        let mut engine = engine();
        let mut off = draft("Sat on command", 5, 30, Species::Dog);
        off.active = false;
        engine.update_behavior(&behavior("sit"), off).unwrap();

        let err = engine
            .record_behavior_at(request("rex", "sit", &[]), ts(NOON))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InactiveBehavior(_))
        ));
        let dog_behaviors: Vec<String> = engine
            .behaviors_for_species(Species::Dog)
            .unwrap()
            .iter()
            .map(|b| b.id().to_string())
            .collect();
        assert_eq!(dog_behaviors, vec!["chewed", "fetch"]);
    }

    #[test]
    fn strangers_are_unauthorized() {
        let mut engine = engine();
        let stranger = RecordBehavior::new(pet("rex"), behavior("sit"), user("mallory"));
        let err = engine.record_behavior_at(stranger, ts(NOON)).unwrap_err();
        assert!(matches!(err, EngineError::Unauthorized { .. }));

        let log = engine
            .record_behavior_at(request("rex", "sit", &["family"]), ts(NOON))
            .unwrap();
        let err = engine
            .delete_behavior_log_at(&log.id, &user("mallory"), ts(NOON))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Unauthorized {
                resource: Resource::Log(_),
                ..
            }
        ));
    }

    #[test]
    fn pet_access_grant_lets_another_user_record() {
        let mut engine = engine();
        engine
            .store_mut()
            .grant_pet_access(user("bob"), pet("rex"));
        engine
            .store_mut()
            .grant_group_access(user("bob"), group("family"));

        let bobs = RecordBehavior::new(pet("rex"), behavior("sit"), user("bob"))
            .in_groups([group("family")]);
        engine.record_behavior_at(bobs, ts(NOON)).unwrap();
    }

    #[test]
    fn day_follows_the_recorders_settings() {
        let mut engine = engine();
        engine.store_mut().set_settings(
            user("alice"),
            TimezoneSettings {
                timezone: "America/New_York".to_string(),
                reset_time: "21:00".to_string(),
                ..TimezoneSettings::default()
            },
        );

        // 20:59 and 21:00 EDT on June 9th.
        let before = ts("2025-06-10T00:59:00Z");
        let at_reset = ts("2025-06-10T01:00:00Z");
        engine
            .record_behavior_at(request("rex", "fetch", &["family"]), before)
            .unwrap();
        engine
            .record_behavior_at(request("tom", "fetch", &["family"]), at_reset)
            .unwrap();

        assert!(score(&engine, "rex", "family", "2025-06-09").is_some());
        assert!(score(&engine, "tom", "family", "2025-06-10").is_some());
        assert_eq!(
            engine.logical_day(&user("alice"), at_reset).unwrap(),
            date("2025-06-10")
        );
        // Users without settings get the defaults.
        assert_eq!(
            engine.settings_for(&user("bob")).unwrap(),
            TimezoneSettings::default()
        );
    }

    #[test]
    fn share_and_unshare_move_points_between_groups() {
        let mut engine = engine();
        let log = engine
            .record_behavior_at(request("rex", "sit", &["family"]), ts(NOON))
            .unwrap();

        let shared = engine
            .share_log_at(&log.id, &group("park"), &user("alice"), ts(NOON))
            .unwrap();
        assert!(shared.is_shared_with(&group("park")));
        assert_eq!(
            score(&engine, "rex", "park", "2025-06-11")
                .unwrap()
                .total_points,
            5
        );

        let err = engine
            .share_log_at(&log.id, &group("park"), &user("alice"), ts(NOON))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::AlreadyShared(_))
        ));

        let unshared = engine
            .unshare_log_at(&log.id, &group("family"), &user("alice"), ts(NOON))
            .unwrap();
        assert!(!unshared.is_shared_with(&group("family")));
        assert_eq!(
            score(&engine, "rex", "family", "2025-06-11")
                .unwrap()
                .total_points,
            0
        );
        let stored = engine.store().log(&log.id).unwrap().unwrap();
        assert_eq!(stored.group_ids().collect::<Vec<_>>(), vec![&group("park")]);

        let err = engine
            .unshare_log_at(&log.id, &group("family"), &user("alice"), ts(NOON))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Share { .. })));
    }

    #[test]
    fn duplicate_behavior_ids_are_rejected() {
        let mut engine = engine();
        let err = engine
            .add_behavior(behavior("sit"), draft("Again", 1, 5, Species::Dog))
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DuplicateBehavior(_))
        ));
        let err = engine
            .update_behavior(&behavior("nap"), draft("Nap", 1, 5, Species::Dog))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Behavior(_))));
        assert_eq!(engine.store().all_behaviors().unwrap().len(), 4);
    }

    #[test]
    fn rankings_order_by_points_then_fewest_negatives() {
        let mut engine = engine();
        let now = ts(NOON);
        // rex: 5 + 2 - 3 = 4 with one negative; tom: 2 + 2 = 4 with none.
        for (p, b, at) in [
            ("rex", "sit", now),
            ("rex", "fetch", now),
            ("rex", "chewed", now),
            ("tom", "fetch", now),
            ("tom", "fetch", now + Duration::minutes(5)),
            ("whiskers", "purr", now),
        ] {
            engine
                .record_behavior_at(request(p, b, &["family"]), at)
                .unwrap();
        }

        let day = date("2025-06-11");
        let ranked = engine
            .rankings(&group("family"), DateSpan::day(day), day)
            .unwrap();
        let summary: Vec<(&str, i64, u32, bool)> = ranked
            .iter()
            .map(|r| (r.pet_id.as_str(), r.total_points, r.rank, r.is_tied))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("tom", 4, 1, false),
                ("rex", 4, 2, false),
                ("whiskers", 1, 3, false),
            ]
        );
        assert_eq!(ranked[0].pet_name, "Tom");
        assert_eq!(ranked[0].owner_name, "Alice");
        assert_eq!(ranked[0].today_points, 4);
    }

    #[test]
    fn rankings_over_several_days_sum_rows() {
        let mut engine = engine();
        engine
            .record_behavior_at(request("rex", "sit", &["family"]), ts("2025-06-09T12:00:00Z"))
            .unwrap();
        engine
            .record_behavior_at(request("rex", "fetch", &["family"]), ts(NOON))
            .unwrap();

        let today = date("2025-06-11");
        let week = engine
            .rankings(&group("family"), DateSpan::ending(today, 7), today)
            .unwrap();
        assert_eq!(week.len(), 1);
        assert_eq!(week[0].total_points, 7);
        assert_eq!(week[0].today_points, 2);

        let todays = engine
            .todays_rankings(&group("family"), &user("alice"), ts(NOON))
            .unwrap();
        assert_eq!(todays[0].total_points, 2);
    }

    #[test]
    fn rankings_need_an_existing_group() {
        let engine = engine();
        let day = date("2025-06-11");
        let err = engine
            .rankings(&group("nowhere"), DateSpan::day(day), day)
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Group(_))));
        assert!(
            engine
                .rankings(&group("family"), DateSpan::day(day), day)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn winner_selection_is_idempotent_and_keeps_ties() {
        let mut engine = engine();
        engine
            .record_behavior_at(request("rex", "sit", &["family"]), ts(NOON))
            .unwrap();
        engine
            .record_behavior_at(request("tom", "sit", &["family"]), ts(NOON))
            .unwrap();
        engine
            .record_behavior_at(request("whiskers", "purr", &["family"]), ts(NOON))
            .unwrap();

        let day = date("2025-06-11");
        let first = engine.select_winners_at(&group("family"), day, ts(NOON)).unwrap();
        let second = engine.select_winners_at(&group("family"), day, ts(NOON)).unwrap();

        let pets = |rows: &[PetOfTheDayWinner]| {
            rows.iter()
                .map(|w| w.pet_id.to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(pets(&first), vec!["rex", "tom"]);
        assert_eq!(pets(&second), pets(&first));

        let stored = engine.winners(&group("family"), day).unwrap();
        assert_eq!(pets(&stored), vec!["rex", "tom"]);
        assert!(stored.iter().all(|w| w.final_score == 5));
    }

    #[test]
    fn no_winner_when_the_leader_has_no_points() {
        let mut engine = engine();
        engine
            .record_behavior_at(request("rex", "chewed", &["family"]), ts(NOON))
            .unwrap();
        let day = date("2025-06-11");
        assert!(
            engine
                .select_winners_at(&group("family"), day, ts(NOON))
                .unwrap()
                .is_empty()
        );
        assert!(engine.winners(&group("family"), day).unwrap().is_empty());

        let err = engine
            .select_winners_at(&group("nowhere"), day, ts(NOON))
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(Resource::Group(_))));
    }
}
