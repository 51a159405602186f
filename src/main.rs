//! Binary entrypoint for Magic Paper.
//!
//! Delegates all logic to the library crate; no local modules here.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use magic_paper::button;
use magic_paper::config::Configuration;
use magic_paper::controller::{self, DisplayController};
use magic_paper::display::PreviewDisplay;
use magic_paper::events::ControlEvent;
use magic_paper::scheduler::Scheduler;

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "magic-paper", about = "E-ink photo frame controller")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Panel width in pixels
    #[arg(long, default_value_t = 600)]
    width: u32,

    /// Panel height in pixels
    #[arg(long, default_value_t = 448)]
    height: u32,

    /// Where the preview display writes presented frames
    #[arg(long, value_name = "FILE", default_value = "frame.png")]
    preview: PathBuf,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("magic_paper={level}").parse().unwrap());
    fmt().with_env_filter(filter).with_target(true).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = Configuration::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;

    let display = PreviewDisplay::new(cli.width, cli.height, cli.preview);
    let (tx, rx) = mpsc::channel::<ControlEvent>(16);
    let cancel = CancellationToken::new();

    let buttons = tokio::spawn(button::run(cfg.gpio.clone(), tx.clone(), cancel.clone()));

    let scheduler = Scheduler::new(tx);
    let ctrl = DisplayController::new(cfg, cli.config.clone(), Box::new(display), scheduler);
    let mut ctrl_task = tokio::spawn(controller::run(ctrl, rx, cancel.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("waiting for shutdown signal")?;
            info!("shutdown requested");
            cancel.cancel();
            ctrl_task.await.context("controller task panicked")??;
        }
        result = &mut ctrl_task => {
            cancel.cancel();
            result.context("controller task panicked")??;
        }
    }

    match buttons.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(error = %err, "button task exited with error"),
        Err(err) => warn!(error = %err, "button task panicked"),
    }
    Ok(())
}
