//! Status command for showing where data lives and how much of it there is.

use std::io::Write;

use anyhow::Result;
use pp_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let counts = db.counts()?;

    writeln!(writer, "Pet points status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Behaviors: {}", counts.behaviors)?;
    writeln!(writer, "Pets: {}", counts.pets)?;
    writeln!(writer, "Groups: {}", counts.groups)?;
    writeln!(writer, "Logs: {}", counts.logs)?;
    writeln!(writer, "Daily scores: {}", counts.scores)?;
    writeln!(writer, "Winners: {}", counts.winners)?;

    Ok(())
}
