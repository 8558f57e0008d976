//! User settings commands: `pp settings set|show`.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pp_core::{Directory, ScoringEngine, Theme, TimezoneSettings, UserId};
use pp_db::Database;
use serde::Serialize;

/// Changes requested by `pp settings set`. `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub timezone: Option<String>,
    pub reset_time: Option<String>,
    pub language: Option<String>,
    pub theme: Option<Theme>,
}

/// The host's IANA timezone, or UTC if it cannot be determined.
pub fn detect_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|err| {
        tracing::debug!(error = %err, "could not detect host timezone, using UTC");
        "UTC".to_string()
    })
}

/// Merges `update` into the user's stored settings, or into fresh settings in
/// the host timezone.
pub fn merged(
    db: &Database,
    user_id: &UserId,
    update: SettingsUpdate,
) -> Result<TimezoneSettings> {
    let mut settings = match db.timezone_settings(user_id)? {
        Some(stored) => stored,
        None => TimezoneSettings {
            timezone: detect_timezone(),
            ..TimezoneSettings::default()
        },
    };
    if let Some(timezone) = update.timezone {
        settings.timezone = timezone;
    }
    if let Some(reset_time) = update.reset_time {
        settings.reset_time = reset_time;
    }
    if let Some(language) = update.language {
        settings.language = language;
    }
    if let Some(theme) = update.theme {
        settings.theme = theme;
    }
    Ok(settings)
}

/// Runs `pp settings set`.
pub fn set<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    user: &str,
    update: SettingsUpdate,
) -> Result<()> {
    set_at(writer, engine, user, update, Utc::now())
}

pub fn set_at<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    user: &str,
    update: SettingsUpdate,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = UserId::new(user).context("invalid user ID")?;
    let settings = merged(engine.store(), &user_id, update)?;
    settings.validate()?;
    engine.store_mut().save_settings(&user_id, &settings, now)?;
    tracing::info!(user_id = %user_id, timezone = %settings.timezone, "saved settings");

    writeln!(
        writer,
        "Saved settings for {user_id}: day resets at {} {}",
        settings.reset_time, settings.timezone
    )?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonSettings<'a> {
    user_id: &'a UserId,
    #[serde(flatten)]
    settings: &'a TimezoneSettings,
    today: String,
}

/// Runs `pp settings show`.
pub fn show<W: Write>(
    writer: &mut W,
    engine: &ScoringEngine<Database>,
    user: &str,
    json: bool,
) -> Result<()> {
    show_at(writer, engine, user, json, Utc::now())
}

pub fn show_at<W: Write>(
    writer: &mut W,
    engine: &ScoringEngine<Database>,
    user: &str,
    json: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = UserId::new(user).context("invalid user ID")?;
    let settings = engine.settings_for(&user_id)?;
    let today = engine.logical_day(&user_id, now)?;

    if json {
        let output = JsonSettings {
            user_id: &user_id,
            settings: &settings,
            today: today.format("%Y-%m-%d").to_string(),
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    writeln!(writer, "Settings for {user_id}")?;
    writeln!(writer, "Timezone:   {}", settings.timezone)?;
    writeln!(writer, "Reset time: {}", settings.reset_time)?;
    writeln!(writer, "Language:   {}", settings.language)?;
    writeln!(writer, "Theme:      {}", settings.theme)?;
    writeln!(writer, "Today:      {today}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use insta::assert_snapshot;

    fn now() -> DateTime<Utc> {
        // 21:30 in New York
        Utc.with_ymd_and_hms(2025, 6, 11, 1, 30, 0).unwrap()
    }

    fn engine() -> ScoringEngine<Database> {
        ScoringEngine::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn unknown_users_get_defaults() {
        let engine = engine();
        let mut output = Vec::new();
        show_at(&mut output, &engine, "alice", false, now()).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Settings for alice
        Timezone:   UTC
        Reset time: 00:00
        Language:   en
        Theme:      system
        Today:      2025-06-12
        ");
    }

    #[test]
    fn set_then_show_uses_the_new_boundary() {
        let mut engine = engine();
        let mut output = Vec::new();
        let update = SettingsUpdate {
            timezone: Some("America/New_York".to_string()),
            reset_time: Some("21:00".to_string()),
            theme: Some(Theme::Dark),
            ..SettingsUpdate::default()
        };
        set_at(&mut output, &mut engine, "alice", update, now()).unwrap();
        show_at(&mut output, &engine, "alice", false, now()).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Saved settings for alice: day resets at 21:00 America/New_York
        Settings for alice
        Timezone:   America/New_York
        Reset time: 21:00
        Language:   en
        Theme:      dark
        Today:      2025-06-11
        ");
    }

    #[test]
    fn partial_updates_keep_stored_values() {
        let mut engine = engine();
        let mut output = Vec::new();
        let first = SettingsUpdate {
            timezone: Some("Europe/Paris".to_string()),
            reset_time: Some("06:00".to_string()),
            ..SettingsUpdate::default()
        };
        set_at(&mut output, &mut engine, "alice", first, now()).unwrap();
        let second = SettingsUpdate {
            language: Some("fr".to_string()),
            ..SettingsUpdate::default()
        };
        set_at(&mut output, &mut engine, "alice", second, now()).unwrap();

        let settings = engine.settings_for(&UserId::new("alice").unwrap()).unwrap();
        assert_eq!(settings.timezone, "Europe/Paris");
        assert_eq!(settings.reset_time, "06:00");
        assert_eq!(settings.language, "fr");
    }

    #[test]
    fn invalid_settings_are_not_saved() {
        let mut engine = engine();
        let mut output = Vec::new();
        let update = SettingsUpdate {
            timezone: Some("Mars/Olympus_Mons".to_string()),
            ..SettingsUpdate::default()
        };
        let err = set_at(&mut output, &mut engine, "alice", update, now()).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
        let stored = engine.store().timezone_settings(&UserId::new("alice").unwrap());
        assert!(stored.unwrap().is_none());
    }

    #[test]
    fn json_output_includes_today() {
        let engine = engine();
        let mut output = Vec::new();
        show_at(&mut output, &engine, "alice", true, now()).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(parsed["user_id"], "alice");
        assert_eq!(parsed["timezone"], "UTC");
        assert_eq!(parsed["theme"], "system");
        assert_eq!(parsed["today"], "2025-06-12");
    }
}
