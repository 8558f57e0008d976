//! Directory seeding: `pp pet add|grant` and `pp group add|join|grant`.
//!
//! Pets, groups, memberships, and access grants are owned by whatever system
//! embeds the engine. These commands write just enough of them to drive it
//! from the command line.

use std::io::Write;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use pp_core::{GroupId, PetId, Species, UserId};
use pp_db::Database;

/// Runs `pp pet add`.
pub fn add_pet<W: Write>(
    writer: &mut W,
    db: &mut Database,
    pet_id: &PetId,
    name: &str,
    species: Species,
    owner: &str,
    owner_name: Option<&str>,
) -> Result<()> {
    let owner_id = UserId::new(owner).context("invalid owner ID")?;
    let owner_name = owner_name.unwrap_or(owner);
    db.add_pet(pet_id, name, species, &owner_id, owner_name)
        .with_context(|| format!("failed to add pet {pet_id}"))?;
    tracing::info!(pet_id = %pet_id, owner_id = %owner_id, "added pet");
    writeln!(writer, "Added {species} '{name}' ({pet_id}) owned by {owner_name}")?;
    Ok(())
}

/// Runs `pp pet grant`.
pub fn grant_pet<W: Write>(
    writer: &mut W,
    db: &mut Database,
    pet_id: &PetId,
    user: &str,
) -> Result<()> {
    let user_id = UserId::new(user).context("invalid user ID")?;
    db.grant_pet_access(&user_id, pet_id)
        .with_context(|| format!("failed to grant access to pet {pet_id}"))?;
    writeln!(writer, "{user_id} can now log for {pet_id}")?;
    Ok(())
}

/// Runs `pp group add`.
pub fn add_group<W: Write>(
    writer: &mut W,
    db: &mut Database,
    group_id: &GroupId,
    name: &str,
) -> Result<()> {
    add_group_at(writer, db, group_id, name, Utc::now())
}

pub fn add_group_at<W: Write>(
    writer: &mut W,
    db: &mut Database,
    group_id: &GroupId,
    name: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    db.add_group(group_id, name, now)
        .with_context(|| format!("failed to add group {group_id}"))?;
    tracing::info!(group_id = %group_id, "added group");
    writeln!(writer, "Added group '{name}' ({group_id})")?;
    Ok(())
}

/// Runs `pp group join`.
pub fn join_group<W: Write>(
    writer: &mut W,
    db: &mut Database,
    group_id: &GroupId,
    pet_id: &PetId,
) -> Result<()> {
    db.add_member(group_id, pet_id)
        .with_context(|| format!("failed to add {pet_id} to group {group_id}"))?;
    writeln!(writer, "{pet_id} joined {group_id}")?;
    Ok(())
}

/// Runs `pp group grant`.
pub fn grant_group<W: Write>(
    writer: &mut W,
    db: &mut Database,
    group_id: &GroupId,
    user: &str,
) -> Result<()> {
    let user_id = UserId::new(user).context("invalid user ID")?;
    db.grant_group_access(&user_id, group_id)
        .with_context(|| format!("failed to grant access to group {group_id}"))?;
    writeln!(writer, "{user_id} can now post to {group_id}")?;
    Ok(())
}
