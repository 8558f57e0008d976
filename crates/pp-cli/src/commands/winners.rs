//! Winners command: show or select a group's Pet of the Day.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use pp_core::{Directory, PetOfTheDayWinner, ScoringEngine};
use pp_db::Database;

use super::util::{parse_date, today_for, viewer};
use crate::{Config, WinnersArgs};

/// Runs `pp winners`.
pub fn run<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &WinnersArgs,
    config: &Config,
) -> Result<()> {
    run_at(writer, engine, args, config, Utc::now())
}

pub fn run_at<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    args: &WinnersArgs,
    config: &Config,
    now: DateTime<Utc>,
) -> Result<()> {
    let viewer = viewer(args.user.user.as_deref(), config)?;
    let date = match args.date.as_deref() {
        Some(date) => parse_date(date)?,
        None => today_for(engine, viewer.as_ref(), now)?,
    };

    let winners = if args.select {
        engine.select_winners_at(&args.group, date, now)?
    } else {
        engine.winners(&args.group, date)?
    };

    if args.json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&winners)?)?;
        return Ok(());
    }

    writeln!(writer, "Pet of the Day for {}, {date}", args.group)?;
    if winners.is_empty() {
        writeln!(writer, "No winner.")?;
        return Ok(());
    }
    for winner in &winners {
        writeln!(writer, "- {}", describe(engine.store(), winner)?)?;
    }

    Ok(())
}

fn describe(db: &Database, winner: &PetOfTheDayWinner) -> Result<String> {
    let name = db
        .pet_info(&winner.pet_id)?
        .map_or_else(|| winner.pet_id.to_string(), |info| info.name);
    Ok(format!(
        "{name} ({}): {:+} points, {} good, {} bad",
        winner.pet_id, winner.final_score, winner.positive_behaviors, winner.negative_behaviors
    ))
}
