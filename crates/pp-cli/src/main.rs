use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pp_cli::commands::settings::SettingsUpdate;
use pp_cli::commands::{behavior, directory, log, rank, settings, status, util, winners};
use pp_cli::{BehaviorAction, Cli, Commands, Config, GroupAction, PetAction, SettingsAction};

#[expect(
    clippy::too_many_lines,
    reason = "CLI command dispatch is inherently verbose"
)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let Some(command) = &cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut engine = util::open_engine(&config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Status => status::run(&mut out, engine.store(), &config)?,
        Commands::Behavior(action) => match action {
            BehaviorAction::List { species, all, json } => {
                behavior::list(&mut out, &engine, *species, *all, *json)?;
            }
            BehaviorAction::Add(fields) => behavior::add(&mut out, &mut engine, fields)?,
            BehaviorAction::Update(fields) => behavior::update(&mut out, &mut engine, fields)?,
        },
        Commands::Pet(action) => {
            let db = engine.store_mut();
            match action {
                PetAction::Add {
                    id,
                    name,
                    species,
                    owner,
                    owner_name,
                } => directory::add_pet(
                    &mut out,
                    db,
                    id,
                    name,
                    *species,
                    owner,
                    owner_name.as_deref(),
                )?,
                PetAction::Grant { pet, user } => directory::grant_pet(&mut out, db, pet, user)?,
            }
        }
        Commands::Group(action) => {
            let db = engine.store_mut();
            match action {
                GroupAction::Add { id, name } => directory::add_group(&mut out, db, id, name)?,
                GroupAction::Join { group, pet } => {
                    directory::join_group(&mut out, db, group, pet)?;
                }
                GroupAction::Grant { group, user } => {
                    directory::grant_group(&mut out, db, group, user)?;
                }
            }
        }
        Commands::Settings(action) => match action {
            SettingsAction::Set {
                user,
                timezone,
                reset_time,
                language,
                theme,
            } => {
                let update = SettingsUpdate {
                    timezone: timezone.clone(),
                    reset_time: reset_time.clone(),
                    language: language.clone(),
                    theme: *theme,
                };
                settings::set(&mut out, &mut engine, user, update)?;
            }
            SettingsAction::Show { user, json } => {
                settings::show(&mut out, &engine, user, *json)?;
            }
        },
        Commands::Log(args) => log::record(&mut out, &mut engine, args, &config)?,
        Commands::Unlog { log_id, user } => {
            log::unlog(&mut out, &mut engine, log_id, user.user.as_deref(), &config)?;
        }
        Commands::Share(args) => log::share(&mut out, &mut engine, args, &config)?,
        Commands::Unshare(args) => log::unshare(&mut out, &mut engine, args, &config)?,
        Commands::Logs(args) => log::search(&mut out, &engine, args)?,
        Commands::Rank(args) => rank::run(&mut out, &engine, args, &config)?,
        Commands::Winners(args) => winners::run(&mut out, &mut engine, args, &config)?,
    }

    out.flush()?;
    Ok(())
}
