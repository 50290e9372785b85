use clap::Parser;
use ledger_cadence::args::{Args, Command};
use ledger_cadence::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().cadence_home().path();

    match args.command() {
        Command::Init => commands::init(home).await?.print(),
        Command::Generate(generate_args) => {
            let config = Config::load(home).await?;
            commands::generate(&config, generate_args).await?.print()
        }
        Command::Import(import_args) => {
            let config = Config::load(home).await?;
            commands::import(&config, import_args.file()).await?.print()
        }
        Command::List(list_args) => {
            let config = Config::load(home).await?;
            commands::list(&config, list_args).await?.print_json()
        }
        Command::MarkOverdue(overdue_args) => {
            let config = Config::load(home).await?;
            commands::mark_overdue(&config, overdue_args).await?.print()
        }
        Command::Snooze(snooze_args) => {
            let config = Config::load(home).await?;
            commands::snooze(&config, snooze_args).await?.print()
        }
    }
    Ok(())
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence; otherwise `level` applies to
/// this crate's library and binary only.
fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => EnvFilter::new(format!("ledger_cadence={level},cadence={level}")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
