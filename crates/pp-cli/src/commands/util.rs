//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::{Context, bail};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use pp_core::{ScoringEngine, TimezoneSettings, UserId, resolve_logical_day};
use pp_db::Database;
use regex::Regex;

use crate::Config;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(minute|hour|day)s?\s+ago$").expect("relative time pattern is valid")
});

/// Conservative bound for relative time parsing (one year in minutes).
const MAX_RELATIVE_MINUTES: i64 = 365 * 24 * 60;

/// Opens the configured database, creating its directory if needed.
pub fn open_database(config: &Config) -> anyhow::Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    db.set_busy_timeout(config.busy_timeout())?;
    Ok(db)
}

/// Opens the configured database wrapped in a scoring engine.
pub fn open_engine(config: &Config) -> anyhow::Result<ScoringEngine<Database>> {
    Ok(ScoringEngine::new(open_database(config)?))
}

/// Resolves the acting user from `--user` or the `user` config key.
pub fn acting_user(flag: Option<&str>, config: &Config) -> anyhow::Result<UserId> {
    let Some(raw) = flag.or(config.user.as_deref()) else {
        bail!("no acting user: pass --user or set `user` in the config (PP_USER)");
    };
    UserId::new(raw).context("invalid user ID")
}

/// Resolves an optional viewer from `--user` or the `user` config key.
pub fn viewer(flag: Option<&str>, config: &Config) -> anyhow::Result<Option<UserId>> {
    flag.or(config.user.as_deref())
        .map(UserId::new)
        .transpose()
        .context("invalid user ID")
}

/// The logical day `now` falls on for `user`, or under default settings.
pub fn today_for(
    engine: &ScoringEngine<Database>,
    user: Option<&UserId>,
    now: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    match user {
        Some(user) => Ok(engine.logical_day(user, now)?),
        None => Ok(resolve_logical_day(now, &TimezoneSettings::default())),
    }
}

/// Truncates to `width` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, width: usize) -> String {
    // By characters, not bytes, to avoid panics on multi-byte UTF-8
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

/// Parses a `YYYY-MM-DD` logical day.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {s}. Use YYYY-MM-DD"))
}

/// Parse a datetime string as either RFC 3339 or relative time.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Relative: "15 minutes ago", "2 hours ago", "1 day ago", resolved against `now`
pub fn parse_datetime_at(s: &str, now: DateTime<Utc>) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s.trim()) else {
        bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '15 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let (max_for_unit, minutes_per_unit) = match &caps[2] {
        "minute" => (MAX_RELATIVE_MINUTES, 1),
        "hour" => (MAX_RELATIVE_MINUTES / 60, 60),
        "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 24),
        unit => bail!("Unknown time unit: {unit}"),
    };

    if n > max_for_unit {
        bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(now - Duration::minutes(n * minutes_per_unit))
}
