//! Core domain logic for pet points.
//!
//! This crate contains the fundamental types and logic for:
//! - Behavior catalog: point values, re-log intervals, species scoping
//! - Recording: validating behavior logs and sharing them with groups
//! - Scoring: per-day aggregates bucketed by each user's logical day
//! - Ranking: tie-aware standings and Pet of the Day selection
//!
//! Storage is abstracted behind the traits in [`store`]; [`MemoryStore`] is a
//! complete in-memory implementation.

mod behavior;
pub mod boundary;
mod engine;
mod error;
mod log;
mod memory;
pub mod ranking;
mod score;
pub mod store;
pub mod types;
mod winner;

pub use behavior::{
    Behavior, BehaviorCategory, BehaviorDraft, MAX_INTERVAL_MINUTES, MAX_NAME_CHARS, MAX_POINTS,
    MIN_INTERVAL_MINUTES, MIN_POINTS, Species,
};
pub use boundary::{
    ConfigError, DayBoundary, Theme, TimezoneSettings, parse_reset_time, resolve_logical_day,
};
pub use engine::{EngineResult, ScoringEngine};
pub use error::{EngineError, Resource};
pub use log::{
    BehaviorLog, GroupShare, MAX_BACKDATE, MAX_NOTES_CHARS, RecordBehavior, check_logged_at,
    remaining_wait,
};
pub use memory::MemoryStore;
pub use ranking::{DateSpan, PetRanking};
pub use score::DailyScore;
pub use store::{
    Backend, CatalogStore, Directory, GroupInfo, LogFilter, LogStore, PetInfo, ScoreFilter,
    ScoreStore, Store, WinnerStore,
};
pub use types::{BehaviorId, GroupId, LogId, PetId, UserId, ValidationError};
pub use winner::{PetOfTheDayWinner, eligible_winners};
