//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pp_core::{BehaviorCategory, BehaviorId, GroupId, LogId, PetId, Species, Theme};

/// Pet behavior points.
///
/// Records good and bad behavior for pets, keeps daily scores per group, and
/// picks a Pet of the Day.
#[derive(Debug, Parser)]
#[command(name = "pp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the database location and row counts.
    Status,

    /// Manage the behavior catalog.
    #[command(subcommand)]
    Behavior(BehaviorAction),

    /// Register pets and grant access to them.
    #[command(subcommand)]
    Pet(PetAction),

    /// Register groups and their members.
    #[command(subcommand)]
    Group(GroupAction),

    /// Show or change a user's timezone settings.
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Record a behavior for a pet.
    Log(LogArgs),

    /// Delete a behavior log and reverse its points.
    Unlog {
        /// The log to delete.
        log_id: LogId,

        #[command(flatten)]
        user: UserArg,
    },

    /// Share an existing log with another group.
    Share(ShareArgs),

    /// Withdraw a log from a group.
    Unshare(ShareArgs),

    /// Search behavior logs, newest first.
    Logs(LogsArgs),

    /// Show the rankings of a group.
    Rank(RankArgs),

    /// Show or select the Pet of the Day.
    Winners(WinnersArgs),
}

/// Acting user, falling back to `user` in the config.
#[derive(Debug, Clone, Default, Args)]
pub struct UserArg {
    /// Acting user ID.
    #[arg(short, long)]
    pub user: Option<String>,
}

/// Catalog subcommands.
#[derive(Debug, Subcommand)]
pub enum BehaviorAction {
    /// List catalog entries.
    List {
        /// Only entries that apply to this species.
        #[arg(long)]
        species: Option<Species>,

        /// Include inactive entries.
        #[arg(long)]
        all: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a catalog entry.
    Add(BehaviorFields),

    /// Replace every field of a catalog entry.
    Update(BehaviorFields),
}

/// Every editable field of a behavior.
#[derive(Debug, Clone, Args)]
pub struct BehaviorFields {
    /// Behavior ID.
    pub id: BehaviorId,

    /// Display name.
    #[arg(long)]
    pub name: String,

    /// One of potty_training, feeding, social, training, play.
    #[arg(long)]
    pub category: BehaviorCategory,

    /// Points awarded per log, between -10 and 10 and never zero.
    #[arg(long, allow_negative_numbers = true)]
    pub points: i32,

    /// Minutes before the same pet can be logged for it again.
    #[arg(long)]
    pub interval: i64,

    /// One of dog, cat, both.
    #[arg(long)]
    pub species: Species,

    /// Keep the entry out of the active catalog.
    #[arg(long)]
    pub inactive: bool,
}

/// Pet subcommands.
#[derive(Debug, Subcommand)]
pub enum PetAction {
    /// Register a pet.
    Add {
        /// Pet ID.
        id: PetId,

        /// Pet name.
        #[arg(long)]
        name: String,

        /// Either dog or cat.
        #[arg(long)]
        species: Species,

        /// Owning user ID.
        #[arg(long)]
        owner: String,

        /// Owner display name, defaults to the owner ID.
        #[arg(long)]
        owner_name: Option<String>,
    },

    /// Let another user log for a pet.
    Grant {
        /// Pet ID.
        pet: PetId,

        /// User ID.
        user: String,
    },
}

/// Group subcommands.
#[derive(Debug, Subcommand)]
pub enum GroupAction {
    /// Register a group.
    Add {
        /// Group ID.
        id: GroupId,

        /// Group name.
        #[arg(long)]
        name: String,
    },

    /// Add a pet to a group.
    Join {
        /// Group ID.
        group: GroupId,

        /// Pet ID.
        pet: PetId,
    },

    /// Let a user post to and view a group.
    Grant {
        /// Group ID.
        group: GroupId,

        /// User ID.
        user: String,
    },
}

/// Settings subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Create or change a user's settings.
    ///
    /// Fields not given keep their stored value. A user without settings
    /// starts from the host timezone.
    Set {
        /// User ID.
        user: String,

        /// IANA timezone name, e.g. America/New_York.
        #[arg(long)]
        timezone: Option<String>,

        /// Local time the day rolls over, as HH:MM.
        #[arg(long)]
        reset_time: Option<String>,

        /// Language code.
        #[arg(long)]
        language: Option<String>,

        /// One of light, dark, system.
        #[arg(long)]
        theme: Option<Theme>,
    },

    /// Show a user's effective settings.
    Show {
        /// User ID.
        user: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Arguments for `pp log`.
#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Pet ID.
    pub pet: PetId,

    /// Behavior ID.
    pub behavior: BehaviorId,

    #[command(flatten)]
    pub user: UserArg,

    /// Group to share the log with. Repeatable.
    #[arg(short, long = "group")]
    pub groups: Vec<GroupId>,

    /// When it happened (RFC 3339 or "15 minutes ago"). Defaults to now.
    #[arg(long)]
    pub at: Option<String>,

    /// Free-form notes.
    #[arg(long)]
    pub notes: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `pp share` and `pp unshare`.
#[derive(Debug, Clone, Args)]
pub struct ShareArgs {
    /// Log ID.
    pub log_id: LogId,

    /// Group ID.
    pub group: GroupId,

    #[command(flatten)]
    pub user: UserArg,
}

/// Arguments for `pp logs`.
#[derive(Debug, Clone, Args)]
pub struct LogsArgs {
    /// Only logs for this pet.
    #[arg(long)]
    pub pet: Option<PetId>,

    /// Only logs of this behavior.
    #[arg(long)]
    pub behavior: Option<BehaviorId>,

    /// Only logs shared with this group.
    #[arg(long)]
    pub group: Option<GroupId>,

    /// Only logs recorded by this user.
    #[arg(long)]
    pub user: Option<String>,

    /// Maximum number of logs to show.
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `pp rank`.
#[derive(Debug, Clone, Args)]
pub struct RankArgs {
    /// Group ID.
    pub group: GroupId,

    /// Last logical day of the period (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Number of logical days in the period, ending at --date (at most ten years).
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=3660))]
    pub days: u32,

    #[command(flatten)]
    pub user: UserArg,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `pp winners`.
#[derive(Debug, Clone, Args)]
pub struct WinnersArgs {
    /// Group ID.
    pub group: GroupId,

    /// Logical day (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Rank the day and store its winners, replacing earlier ones.
    #[arg(long)]
    pub select: bool,

    #[command(flatten)]
    pub user: UserArg,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}
