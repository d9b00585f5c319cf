// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod child;
mod cli;
mod config;
mod errors;
mod orchestrator;
mod session;
mod signal;

use camino::Utf8PathBuf;
use clap::Parser;
use threepio_report::RunLayout;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use cli::Cli;
use config::ThreepioConfig;
use errors::ExitCode;
use orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let root_dir = current_root_dir()?;
    let (run_id, layout) = orchestrator::new_run_layout(&root_dir);
    layout
        .create_run_dir()
        .map_err(|error| color_eyre::eyre::eyre!("failed to create run directory: {error}"))?;

    let _log_guard = init_tracing(&layout);
    tracing::info!(run_id = %run_id, command = ?cli.command, "starting run");

    let orchestrator = Orchestrator::new(ThreepioConfig::default());
    match orchestrator.run(layout, run_id, cli.command).await {
        Ok(code) => std::process::exit(code.into()),
        Err(error) => {
            tracing::error!(%error, "orchestration failed");
            eprintln!("3pio: {error}");
            std::process::exit(ExitCode::OrchestrationError.into());
        }
    }
}

fn current_root_dir() -> color_eyre::eyre::Result<Utf8PathBuf> {
    let cwd = std::env::current_dir()?;
    Utf8PathBuf::from_path_buf(cwd)
        .map_err(|path| color_eyre::eyre::eyre!("current directory `{}` is not UTF-8", path.display()))
}

/// Sets up dual-sink logging: human-readable output on stderr (governed by
/// `RUST_LOG`, defaulting to `info`), and a non-blocking append-only feed
/// into the run's `debug.log` for post-mortem inspection (spec.md §9
/// "Debug log alongside the user-facing report").
fn init_tracing(layout: &RunLayout) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let debug_log = match std::fs::File::create(layout.debug_log()) {
        Ok(file) => file,
        Err(error) => {
            eprintln!("3pio: failed to open debug log, continuing without it: {error}");
            tracing_subscriber::registry()
                .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
                .with(stderr_layer)
                .init();
            return None;
        }
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(debug_log);
    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Some(guard)
}
