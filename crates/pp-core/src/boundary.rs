//! Logical-day resolution.
//!
//! Every user picks an IANA timezone and a daily reset time. A *logical day* is
//! labelled by the calendar date on which it closes: with a reset time of 21:00,
//! the logical day `D` runs from `D-1 21:00` to `D 21:00` local time. An instant
//! exactly at the reset time already belongs to the next day.
//!
//! All date bucketing (recording, deleting, ranking, winner selection) goes
//! through [`resolve_logical_day`] or [`DayBoundary::logical_day`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ValidationError;

pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_RESET_TIME: &str = "00:00";
pub const DEFAULT_LANGUAGE: &str = "en";

/// A user's timezone settings could not be interpreted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),
    #[error("invalid reset time {0:?}, expected HH:MM")]
    InvalidResetTime(String),
}

/// UI theme preference stored alongside the timezone settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl Theme {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            _ => Err(ValidationError::UnknownVariant {
                field: "theme",
                value: s.to_string(),
            }),
        }
    }
}

/// Per-user display and day-boundary preferences, as stored.
///
/// `timezone` and `reset_time` are kept as the raw strings the user supplied;
/// they are only interpreted when a day boundary is needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimezoneSettings {
    pub timezone: String,
    pub reset_time: String,
    pub language: String,
    pub theme: Theme,
}

impl Default for TimezoneSettings {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE.to_string(),
            reset_time: DEFAULT_RESET_TIME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            theme: Theme::default(),
        }
    }
}

impl TimezoneSettings {
    /// Parses the timezone and reset time.
    pub fn boundary(&self) -> Result<DayBoundary, ConfigError> {
        DayBoundary::parse(&self.timezone, &self.reset_time)
    }

    /// Parses the timezone and reset time, substituting the defaults on error.
    ///
    /// Malformed settings must never take the scoring path down with them.
    pub fn boundary_or_default(&self) -> DayBoundary {
        self.boundary().unwrap_or_else(|err| {
            tracing::warn!(
                timezone = %self.timezone,
                reset_time = %self.reset_time,
                error = %err,
                "invalid timezone settings, falling back to defaults"
            );
            DayBoundary::default()
        })
    }

    /// Checks that the settings can be interpreted before they are saved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.boundary().map(|_| ())
    }
}

/// A parsed timezone plus daily reset time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBoundary {
    tz: Tz,
    reset: NaiveTime,
}

impl Default for DayBoundary {
    fn default() -> Self {
        Self {
            tz: Tz::UTC,
            reset: NaiveTime::MIN,
        }
    }
}

impl DayBoundary {
    pub const fn new(tz: Tz, reset: NaiveTime) -> Self {
        Self { tz, reset }
    }

    /// Parses an IANA timezone name and an `HH:MM` reset time.
    pub fn parse(timezone: &str, reset_time: &str) -> Result<Self, ConfigError> {
        let tz: Tz = timezone
            .parse()
            .map_err(|_| ConfigError::UnknownTimezone(timezone.to_string()))?;
        let reset = parse_reset_time(reset_time)?;
        Ok(Self { tz, reset })
    }

    pub const fn timezone(&self) -> Tz {
        self.tz
    }

    pub const fn reset_time(&self) -> NaiveTime {
        self.reset
    }

    /// Returns the logical day `instant` belongs to.
    pub fn logical_day(&self, instant: DateTime<Utc>) -> NaiveDate {
        let local = instant.with_timezone(&self.tz);
        let date = local.date_naive();
        let reset_wall = date.and_time(self.reset);

        let past_reset = match self.tz.from_local_datetime(&reset_wall).earliest() {
            Some(reset_instant) => local >= reset_instant,
            // The reset wall-clock time falls into a DST gap on this date.
            None => local.naive_local() >= reset_wall,
        };

        if past_reset {
            date.succ_opt().unwrap_or(date)
        } else {
            date
        }
    }

    /// Returns the first instant that belongs to logical day `day`.
    ///
    /// This is the reset time on the previous calendar date.
    pub fn day_start(&self, day: NaiveDate) -> DateTime<Utc> {
        let previous = day.pred_opt().unwrap_or(day);
        let wall = previous.and_time(self.reset);
        match self.tz.from_local_datetime(&wall).earliest() {
            Some(start) => start.with_timezone(&Utc),
            // Gap: the clock jumps past the reset time, so the day starts at the jump.
            None => {
                let after_gap = wall + Duration::hours(1);
                self.tz
                    .from_local_datetime(&after_gap)
                    .earliest()
                    .map_or_else(|| wall.and_utc(), |start| start.with_timezone(&Utc))
            }
        }
    }
}

/// Parses a 24-hour `HH:MM` reset time.
pub fn parse_reset_time(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ConfigError::InvalidResetTime(value.to_string()))
}

/// Resolves the logical day of `instant` under `settings`.
///
/// Invalid settings resolve under the defaults; see
/// [`TimezoneSettings::boundary_or_default`].
pub fn resolve_logical_day(instant: DateTime<Utc>, settings: &TimezoneSettings) -> NaiveDate {
    let day = settings.boundary_or_default().logical_day(instant);
    tracing::debug!(%instant, %day, timezone = %settings.timezone, "resolved logical day");
    day
}
