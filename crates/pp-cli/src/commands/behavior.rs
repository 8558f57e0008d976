//! Behavior catalog commands: `pp behavior list|add|update`.

use std::io::Write;

use anyhow::Result;
use pp_core::{Behavior, BehaviorDraft, CatalogStore, ScoringEngine, Species};
use pp_db::Database;

use super::util::truncate;
use crate::BehaviorFields;

impl From<&BehaviorFields> for BehaviorDraft {
    fn from(fields: &BehaviorFields) -> Self {
        Self {
            name: fields.name.clone(),
            category: fields.category,
            point_value: fields.points,
            min_interval_minutes: fields.interval,
            species: fields.species,
            active: !fields.inactive,
        }
    }
}

/// Loads the catalog entries to list.
///
/// Without `all` only active entries are returned. With a species, only
/// entries that apply to a pet of that species.
pub fn load(
    engine: &ScoringEngine<Database>,
    species: Option<Species>,
    all: bool,
) -> Result<Vec<Behavior>> {
    let store = engine.store();
    let behaviors = match (species, all) {
        (Some(species), false) => engine.behaviors_for_species(species)?,
        (None, false) => store.active_behaviors()?,
        (species, true) => store
            .all_behaviors()?
            .into_iter()
            .filter(|b| species.is_none_or(|s| b.is_valid_for_species(s)))
            .collect(),
    };
    Ok(behaviors)
}

/// Runs `pp behavior list`.
pub fn list<W: Write>(
    writer: &mut W,
    engine: &ScoringEngine<Database>,
    species: Option<Species>,
    all: bool,
    json: bool,
) -> Result<()> {
    let behaviors = load(engine, species, all)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&behaviors)?)?;
        return Ok(());
    }

    if behaviors.is_empty() {
        writeln!(writer, "No behaviors in the catalog.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<16}  {:<22}  {:<14}  {:>6}  {:>8}  {:<7}  Active",
        "ID", "Name", "Category", "Points", "Interval", "Species"
    )?;
    writeln!(
        writer,
        "────────────────  ──────────────────────  ──────────────  ──────  ────────  ───────  ──────"
    )?;
    for behavior in &behaviors {
        writeln!(
            writer,
            "{:<16}  {:<22}  {:<14}  {:>+6}  {:>7}m  {:<7}  {}",
            truncate(behavior.id().as_str(), 16),
            truncate(behavior.name(), 22),
            behavior.category().as_str(),
            behavior.point_value(),
            behavior.min_interval_minutes(),
            behavior.species().as_str(),
            if behavior.is_active() { "yes" } else { "no" },
        )?;
    }

    Ok(())
}

/// Runs `pp behavior add`.
pub fn add<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    fields: &BehaviorFields,
) -> Result<()> {
    let behavior = engine.add_behavior(fields.id.clone(), fields.into())?;
    writeln!(
        writer,
        "Added behavior '{}' ({:+} points)",
        behavior.id(),
        behavior.point_value()
    )?;
    Ok(())
}

/// Runs `pp behavior update`.
pub fn update<W: Write>(
    writer: &mut W,
    engine: &mut ScoringEngine<Database>,
    fields: &BehaviorFields,
) -> Result<()> {
    let behavior = engine.update_behavior(&fields.id, fields.into())?;
    writeln!(
        writer,
        "Updated behavior '{}' ({:+} points)",
        behavior.id(),
        behavior.point_value()
    )?;
    Ok(())
}
