mod cli;
mod commands;
mod config;
mod context;
mod lld;
mod models;
mod pipeline;
mod render;
mod resolve;
mod supplementary;
mod utils;
mod writer;

use clap::Parser;
use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use cli::{Cli, Commands};
use config::Settings;
use models::RunOutcome;

const LOG_FILE: &str = "lld-forge.log";

/// Exit code when at least one device failed
const EXIT_DEVICE_FAILED: u8 = 1;
/// Exit code for configuration and LLD errors
const EXIT_FATAL: u8 = 2;

/// Process exit status for a finished `run`
fn run_exit_status(outcome: RunOutcome) -> u8 {
    match outcome {
        RunOutcome::PartialFailure => EXIT_DEVICE_FAILED,
        RunOutcome::AllSucceeded | RunOutcome::NothingToGenerate => 0,
    }
}

/// Console at INFO (DEBUG with -v), plus a DEBUG log file in the logs dir when it can be created
fn init_tracing(verbose: bool, logs_dir: Option<&Path>) {
    let console_level = if verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };

    let mut file_error = None;
    let file_layer = logs_dir.and_then(|dir| {
        let opened = std::fs::create_dir_all(dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(LOG_FILE))
        });
        match opened {
            Ok(file) => Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            Err(e) => {
                file_error = Some(format!("{}: {}", dir.display(), e));
                None
            }
        }
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lld_forge=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_filter(console_level),
        )
        .with(file_layer)
        .init();

    if let Some(e) = file_error {
        tracing::warn!("Logging to console only, cannot open log file in {}", e);
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);

    let settings = Settings::load(&settings_path);
    init_tracing(
        cli.verbose,
        settings.as_ref().ok().map(|s| s.logs_path()).as_deref(),
    );

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };
    tracing::debug!("Settings: {}", settings_path.display());

    let result = match cli.command {
        Commands::Init => commands::init::run(&settings).map(|_| ExitCode::SUCCESS),
        Commands::Lld(args) => commands::lld::run(&settings_path, args).map(|_| ExitCode::SUCCESS),
        Commands::Run => commands::run::run(&settings)
            .map(|report| ExitCode::from(run_exit_status(report.outcome()))),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
