//! CLI subcommand implementations.

pub mod behavior;
pub mod directory;
pub mod log;
pub mod rank;
pub mod settings;
pub mod status;
pub mod util;
pub mod winners;
