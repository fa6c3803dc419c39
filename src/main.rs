use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use posmon::app::AppContext;
use posmon::cli::{commands, Cli, Commands, DaemonAction};
use posmon::config::{Config, RunMode};

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .init();
        }
    }
    Ok(())
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let mut config = Config::load_with_env(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.storage.data_dir = dir;
    }

    match cli.command {
        Some(Commands::Run { category, json }) => {
            let ctx = AppContext::new(config)?;
            let success = commands::run(&ctx, category, json).await?;
            return Ok(exit_code(success));
        }
        Some(Commands::Show { category, json }) => {
            let ctx = AppContext::new(config)?;
            commands::show(&ctx, category, json)?;
        }
        Some(Commands::Status { json }) => {
            let ctx = AppContext::new(config)?;
            commands::status(&ctx, json)?;
        }
        Some(Commands::Clear { target }) => {
            let ctx = AppContext::new(config)?;
            commands::clear(&ctx, &target.categories())?;
        }
        Some(Commands::Daemon { action }) => match action {
            DaemonAction::Start {
                interval,
                no_initial_run,
            } => {
                if let Some(interval) = interval {
                    config.schedule.interval = interval;
                    config.validate()?;
                }
                if no_initial_run {
                    config.schedule.run_on_start = false;
                }
                let ctx = Arc::new(AppContext::new(config)?);
                commands::daemon_start(ctx).await?;
            }
            DaemonAction::Stop => {
                commands::daemon_stop(&config.storage.data_dir).map_err(anyhow::Error::msg)?;
            }
            DaemonAction::Status => {
                commands::daemon_status(&config.storage.data_dir);
            }
        },
        None => {
            let mode = config.mode;
            let ctx = Arc::new(AppContext::new(config)?);
            match mode {
                RunMode::Scheduled => commands::daemon_start(ctx).await?,
                RunMode::Once => {
                    let success = commands::run(&ctx, None, false).await?;
                    return Ok(exit_code(success));
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
