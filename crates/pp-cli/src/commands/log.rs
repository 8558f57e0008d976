//! Behavior log commands: `pp log`, `pp unlog`, `pp share`, `pp unshare`, `pp logs`.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pp_core::{
    BehaviorLog, GroupId, LogFilter, LogId, LogStore, RecordBehavior, ScoringEngine, UserId,
};
use pp_db::Database;

use super::util::{acting_user, parse_datetime_at, truncate};
use crate::{Config, LogArgs, LogsArgs, ShareArgs};

/// Formats a log's shares as a comma-separated list.
fn group_list(log: &BehaviorLog) -> String {
    let groups: Vec<&str> = log.group_ids().map(GroupId::as_str).collect();
    if groups.is_empty() {
        "-".to_string()
    } else {
        groups.join(", ")
    }
}

/// Runs `pp log`.
pub fn record<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &LogArgs,
    config: &Config,
) -> Result<()> {
    record_at(writer, engine, args, config, Utc::now())
}

pub fn record_at<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &LogArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = acting_user(args.user.user.as_deref(), config)?;

    let mut request =
        RecordBehavior::new(args.pet.clone(), args.behavior.clone(), user_id.clone())
            .in_groups(args.groups.iter().cloned());
    if let Some(at) = &args.at {
        request = request.at(parse_datetime_at(at, now)?);
    }
    if let Some(notes) = &args.notes {
        request = request.with_notes(notes.clone());
    }

    let log = engine.record_behavior_at(request, now)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&log)?)?;
        return Ok(());
    }

    let day = engine.logical_day(&user_id, log.logged_at)?;
    writeln!(
        writer,
        "Logged {} for {}: {:+} points on {day}",
        log.behavior_id, log.pet_id, log.points_awarded
    )?;
    writeln!(writer, "Groups: {}", group_list(&log))?;
    writeln!(writer, "Log ID: {}", log.id)?;
    Ok(())
}

/// Runs `pp unlog`.
pub fn unlog<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    log_id: &LogId,
    user: Option<&str>,
    config: &Config,
) -> Result<()> {
    unlog_at(writer, engine, log_id, user, config, Utc::now())
}

pub fn unlog_at<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    log_id: &LogId,
    user: Option<&str>,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = acting_user(user, config)?;
    let log = engine.delete_behavior_log_at(log_id, &user_id, now)?;
    writeln!(
        writer,
        "Deleted log {}: reversed {:+} points in {}",
        log.id,
        log.points_awarded,
        group_list(&log)
    )?;
    Ok(())
}

/// Runs `pp share`.
pub fn share<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &ShareArgs,
    config: &Config,
) -> Result<()> {
    share_at(writer, engine, args, config, Utc::now())
}

pub fn share_at<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &ShareArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = acting_user(args.user.user.as_deref(), config)?;
    let log = engine.share_log_at(&args.log_id, &args.group, &user_id, now)?;
    writeln!(writer, "Shared log {} with {}", log.id, args.group)?;
    writeln!(writer, "Groups: {}", group_list(&log))?;
    Ok(())
}

/// Runs `pp unshare`.
pub fn unshare<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &ShareArgs,
    config: &Config,
) -> Result<()> {
    unshare_at(writer, engine, args, config, Utc::now())
}

pub fn unshare_at<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &ShareArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let user_id = acting_user(args.user.user.as_deref(), config)?;
    let log = engine.unshare_log_at(&args.log_id, &args.group, &user_id, now)?;
    writeln!(writer, "Removed log {} from {}", log.id, args.group)?;
    writeln!(writer, "Groups: {}", group_list(&log))?;
    Ok(())
}

/// Builds the store filter for `pp logs`.
pub fn filter(args: &LogsArgs) -> Result<LogFilter> {
    let user_id = args
        .user
        .as_deref()
        .map(UserId::new)
        .transpose()
        .context("invalid user ID")?;
    Ok(LogFilter {
        pet_id: args.pet.clone(),
        behavior_id: args.behavior.clone(),
        group_id: args.group.clone(),
        user_id,
        limit: Some(args.limit),
        ..LogFilter::default()
    })
}

/// Runs `pp logs`.
pub fn search<W: Write>(
    writer: &mut W,
    engine: &ScoringEngine<Database>,
    args: &LogsArgs,
) -> Result<()> {
    let logs = engine.store().search_logs(&filter(args)?)?;

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&logs)?)?;
        return Ok(());
    }

    if logs.is_empty() {
        writeln!(writer, "No behavior logs found.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<16}  {:<12}  {:<16}  {:>6}  {:<12}  {:<16}  ID",
        "Logged at (UTC)", "Pet", "Behavior", "Points", "By", "Groups"
    )?;
    writeln!(
        writer,
        "────────────────  ────────────  ────────────────  ──────  ────────────  ────────────────  ──"
    )?;
    for log in &logs {
        let logged_at = log.logged_at.format("%Y-%m-%d %H:%M").to_string();
        writeln!(
            writer,
            "{:<16}  {:<12}  {:<16}  {:>+6}  {:<12}  {:<16}  {}",
            logged_at,
            truncate(log.pet_id.as_str(), 12),
            truncate(log.behavior_id.as_str(), 16),
            log.points_awarded,
            truncate(log.user_id.as_str(), 12),
            truncate(&group_list(log), 16),
            log.id,
        )?;
    }

    Ok(())
}
