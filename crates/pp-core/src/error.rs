//! Errors returned by [`ScoringEngine`](crate::ScoringEngine) operations.

use std::fmt;

use chrono::{Duration, NaiveDate};
use thiserror::Error;

use crate::types::{BehaviorId, GroupId, LogId, PetId, UserId, ValidationError};

/// Something an operation looked up or acted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Pet(PetId),
    Behavior(BehaviorId),
    Log(LogId),
    Group(GroupId),
    Score {
        pet_id: PetId,
        group_id: GroupId,
        date: NaiveDate,
    },
    Share {
        log_id: LogId,
        group_id: GroupId,
    },
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pet(id) => write!(f, "pet {id}"),
            Self::Behavior(id) => write!(f, "behavior {id}"),
            Self::Log(id) => write!(f, "log {id}"),
            Self::Group(id) => write!(f, "group {id}"),
            Self::Score {
                pet_id,
                group_id,
                date,
            } => write!(f, "daily score for pet {pet_id} in group {group_id} on {date}"),
            Self::Share { log_id, group_id } => {
                write!(f, "share of log {log_id} with group {group_id}")
            }
        }
    }
}

/// Failure of an engine operation.
///
/// `E` is the backend's own error type; storage failures are passed through
/// as-is in [`EngineError::Store`].
#[derive(Debug, Error)]
pub enum EngineError<E> {
    /// The request itself is malformed. Not retryable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The same behavior was logged for the same pet too recently.
    #[error(
        "behavior {behavior_id} was logged for pet {pet_id} too recently, try again in {} minute(s)",
        whole_minutes(.remaining)
    )]
    RateLimited {
        pet_id: PetId,
        behavior_id: BehaviorId,
        remaining: Duration,
    },

    /// The acting user may not touch the resource.
    #[error("user {user_id} cannot access {resource}")]
    Unauthorized { user_id: UserId, resource: Resource },

    #[error("{0} not found")]
    NotFound(Resource),

    #[error(transparent)]
    Store(E),
}

impl<E> EngineError<E> {
    /// Remaining wait for rate-limited requests.
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { remaining, .. } => Some(*remaining),
            _ => None,
        }
    }

    pub(crate) const fn unauthorized(user_id: UserId, resource: Resource) -> Self {
        Self::Unauthorized { user_id, resource }
    }
}

/// Rounds a wait up to whole minutes, so "30 seconds" reads as "1 minute".
fn whole_minutes(remaining: &Duration) -> i64 {
    let seconds = remaining.num_seconds().max(0);
    (seconds + 59) / 60
}

/// Lifts backend results into [`EngineError`].
pub(crate) trait StoreResultExt<T, E> {
    fn store_err(self) -> Result<T, EngineError<E>>;
}

impl<T, E> StoreResultExt<T, E> for Result<T, E> {
    fn store_err(self) -> Result<T, EngineError<E>> {
        self.map_err(EngineError::Store)
    }
}
