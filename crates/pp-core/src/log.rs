//! Behavior logs and the rules for recording them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;
use crate::types::{BehaviorId, GroupId, LogId, PetId, UserId, ValidationError, check_max_chars};

/// Longest allowed notes text, in characters.
pub const MAX_NOTES_CHARS: usize = 500;
/// How far in the past a log may be backdated.
pub const MAX_BACKDATE: Duration = Duration::hours(24);

/// One group a log has been shared with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupShare {
    pub id: String,
    pub group_id: GroupId,
    pub created_at: DateTime<Utc>,
}

impl GroupShare {
    pub fn new(group_id: GroupId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            group_id,
            created_at,
        }
    }
}

/// One recorded occurrence of a behavior.
///
/// `points_awarded` is copied from the catalog when the log is recorded and never
/// re-derived, so later catalog edits leave history alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorLog {
    pub id: LogId,
    pub pet_id: PetId,
    pub behavior_id: BehaviorId,
    pub user_id: UserId,
    pub points_awarded: i32,
    pub logged_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub group_shares: Vec<GroupShare>,
}

impl BehaviorLog {
    /// Builds an unshared log for `behavior`, freezing its current point value.
    pub fn new(
        pet_id: PetId,
        behavior: &Behavior,
        user_id: UserId,
        logged_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: LogId::generate(),
            pet_id,
            behavior_id: behavior.id().clone(),
            user_id,
            points_awarded: behavior.point_value(),
            logged_at,
            created_at,
            notes,
            group_shares: Vec::new(),
        }
    }

    pub fn is_shared_with(&self, group_id: &GroupId) -> bool {
        self.group_shares.iter().any(|s| &s.group_id == group_id)
    }

    /// Adds a share for `group_id` and returns a copy of it.
    pub fn add_share(
        &mut self,
        group_id: GroupId,
        now: DateTime<Utc>,
    ) -> Result<GroupShare, ValidationError> {
        if self.is_shared_with(&group_id) {
            return Err(ValidationError::AlreadyShared(group_id.to_string()));
        }
        let share = GroupShare::new(group_id, now);
        self.group_shares.push(share.clone());
        Ok(share)
    }

    /// Removes and returns the share for `group_id`, if there is one.
    pub fn remove_share(&mut self, group_id: &GroupId) -> Option<GroupShare> {
        let index = self
            .group_shares
            .iter()
            .position(|s| &s.group_id == group_id)?;
        Some(self.group_shares.remove(index))
    }

    pub fn group_ids(&self) -> impl Iterator<Item = &GroupId> {
        self.group_shares.iter().map(|s| &s.group_id)
    }
}

/// Input to [`ScoringEngine::record_behavior`](crate::ScoringEngine::record_behavior).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBehavior {
    pub pet_id: PetId,
    pub behavior_id: BehaviorId,
    pub user_id: UserId,
    pub group_ids: Vec<GroupId>,
    /// When the behavior happened; defaults to the recording instant.
    pub logged_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl RecordBehavior {
    pub fn new(pet_id: PetId, behavior_id: BehaviorId, user_id: UserId) -> Self {
        Self {
            pet_id,
            behavior_id,
            user_id,
            group_ids: Vec::new(),
            logged_at: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn in_groups(mut self, group_ids: impl IntoIterator<Item = GroupId>) -> Self {
        self.group_ids.extend(group_ids);
        self
    }

    #[must_use]
    pub fn at(mut self, logged_at: DateTime<Utc>) -> Self {
        self.logged_at = Some(logged_at);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks everything that can be checked without a store.
    ///
    /// Returns the effective `logged_at`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ValidationError> {
        if let Some(notes) = &self.notes {
            check_max_chars("notes", notes, MAX_NOTES_CHARS)?;
        }
        let logged_at = self.logged_at.unwrap_or(now);
        check_logged_at(logged_at, now)?;

        let mut seen: Vec<&GroupId> = Vec::with_capacity(self.group_ids.len());
        for group_id in &self.group_ids {
            if seen.contains(&group_id) {
                return Err(ValidationError::AlreadyShared(group_id.to_string()));
            }
            seen.push(group_id);
        }
        Ok(logged_at)
    }
}

/// Rejects `logged_at` values in the future or older than [`MAX_BACKDATE`].
pub fn check_logged_at(
    logged_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if logged_at > now {
        return Err(ValidationError::LoggedInFuture);
    }
    if now - logged_at > MAX_BACKDATE {
        return Err(ValidationError::LoggedTooLongAgo {
            hours: MAX_BACKDATE.num_hours(),
        });
    }
    Ok(())
}

/// Returns how much longer to wait before `behavior` can be logged again.
///
/// `None` means the candidate is far enough from the previous log. The check
/// compares `logged_at` values, not recording times, so backdating a log to
/// shortly after the previous one is also refused.
pub fn remaining_wait(
    last_logged_at: Option<DateTime<Utc>>,
    candidate: DateTime<Utc>,
    min_interval: Duration,
) -> Option<Duration> {
    let last = last_logged_at?;
    let elapsed = candidate - last;
    if elapsed < min_interval {
        Some(min_interval - elapsed)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Species;
    use crate::behavior::tests::draft;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-06-10T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn request() -> RecordBehavior {
        RecordBehavior::new(
            PetId::new("rex").unwrap(),
            BehaviorId::new("sit").unwrap(),
            UserId::new("alice").unwrap(),
        )
    }

    #[test]
    fn logged_at_defaults_to_now() {
        assert_eq!(request().validate(now()), Ok(now()));
    }

    #[test]
    fn future_logged_at_is_rejected() {
        let req = request().at(now() + Duration::seconds(1));
        assert_eq!(req.validate(now()), Err(ValidationError::LoggedInFuture));
    }

    #[test]
    fn backdating_is_limited_to_a_day() {
        let ok = request().at(now() - Duration::hours(24));
        assert!(ok.validate(now()).is_ok());

        let too_old = request().at(now() - Duration::hours(24) - Duration::seconds(1));
        assert_eq!(
            too_old.validate(now()),
            Err(ValidationError::LoggedTooLongAgo { hours: 24 })
        );
    }

    #[test]
    fn notes_are_capped() {
        assert!(request().with_notes("a".repeat(500)).validate(now()).is_ok());
        assert!(matches!(
            request().with_notes("a".repeat(501)).validate(now()),
            Err(ValidationError::TooLong { field: "notes", .. })
        ));
    }

    #[test]
    fn duplicate_group_ids_are_rejected() {
        let group = GroupId::new("family").unwrap();
        let req = request().in_groups([group.clone(), group]);
        assert_eq!(
            req.validate(now()),
            Err(ValidationError::AlreadyShared("family".to_string()))
        );
    }

    #[test]
    fn wait_is_measured_from_previous_logged_at() {
        let interval = Duration::minutes(30);
        let last = now() - Duration::minutes(10);

        assert_eq!(remaining_wait(None, now(), interval), None);
        assert_eq!(
            remaining_wait(Some(last), now(), interval),
            Some(Duration::minutes(20))
        );
        assert_eq!(
            remaining_wait(Some(now() - interval), now(), interval),
            None
        );
    }

    #[test]
    fn backdated_candidate_before_previous_log_must_wait() {
        let interval = Duration::minutes(30);
        let last = now();
        let candidate = now() - Duration::minutes(5);
        assert_eq!(
            remaining_wait(Some(last), candidate, interval),
            Some(Duration::minutes(35))
        );
    }

    #[test]
    fn points_are_frozen_from_the_behavior() {
        let mut behavior =
            Behavior::new(BehaviorId::new("sit").unwrap(), draft(4, 30, Species::Dog)).unwrap();
        let log = BehaviorLog::new(
            PetId::new("rex").unwrap(),
            &behavior,
            UserId::new("alice").unwrap(),
            now(),
            now(),
            None,
        );

        let mut changed = behavior.to_draft();
        changed.point_value = 9;
        behavior.update(changed).unwrap();

        assert_eq!(log.points_awarded, 4);
    }

    #[test]
    fn shares_are_keyed_by_group() {
        let behavior =
            Behavior::new(BehaviorId::new("sit").unwrap(), draft(4, 30, Species::Dog)).unwrap();
        let mut log = BehaviorLog::new(
            PetId::new("rex").unwrap(),
            &behavior,
            UserId::new("alice").unwrap(),
            now(),
            now(),
            None,
        );
        let family = GroupId::new("family").unwrap();

        log.add_share(family.clone(), now()).unwrap();
        assert!(log.add_share(family.clone(), now()).is_err());
        assert_eq!(log.group_shares.len(), 1);

        let removed = log.remove_share(&family).unwrap();
        assert_eq!(removed.group_id, family);
        assert!(log.remove_share(&family).is_none());
    }
}
