//! Pet points CLI library.
//!
//! This crate provides the command-line interface over the scoring engine and
//! its SQLite store.

mod cli;
pub mod commands;
mod config;

pub use cli::{
    BehaviorAction, BehaviorFields, Cli, Commands, GroupAction, LogArgs, LogsArgs, PetAction,
    RankArgs, SettingsAction, ShareArgs, UserArg, WinnersArgs,
};
pub use config::Config;
