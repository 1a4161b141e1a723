//! vdbctl - Main entry point

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use vdbctl::cli::Cli;
use vdbctl::shutdown::{self, elapsed_minutes};
use vdbctl::{
    Coordinator, EngineRegistry, EngineSelector, HttpSessionProvider, RunSummary, UnitOptions,
    VdbError,
};

/// Initialize logging: console plus an append-only log file.
/// `RUST_LOG` overrides the level chosen by `--debug`.
fn init_logger(debug: bool, log_path: &Path) -> anyhow::Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("Failed to open log file {:?}", log_path))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .try_init()
        .context("Failed to install the log subscriber")?;

    Ok(())
}

/// Main application entry point
fn main() {
    let started = Instant::now();
    let cli = Cli::parse_args();

    if let Err(e) = init_logger(cli.debug, &cli.logdir) {
        eprintln!("ERROR: {:#}", e);
        std::process::exit(1);
    }
    info!("Welcome to vdbctl, version {}", env!("CARGO_PKG_VERSION"));
    if cli.debug {
        info!("Debug logging is enabled.");
    }
    debug!("{:?}", cli);

    // Signals end the process at once; issued jobs keep running remotely
    if let Err(e) = shutdown::init_signal_handlers(started) {
        warn!("Failed to initialize signal handlers: {}", e);
    }

    let code = match run(&cli) {
        Ok(summary) => {
            report(&summary);
            summary.exit_code()
        }
        Err(e) => {
            error!("{}", e);
            if matches!(e, VdbError::EngineNotFound { .. }) {
                error!("Please check your value and try again. Exiting");
            }
            e.exit_code()
        }
    };

    info!(
        "vdbctl took {} minutes to get this far.",
        elapsed_minutes(started.elapsed())
    );
    std::process::exit(code);
}

/// Load engines, pick the targets and run the request against all of them
fn run(cli: &Cli) -> Result<RunSummary, VdbError> {
    let request = cli.operation_request()?;
    let registry = EngineRegistry::load(&cli.config)?;

    let selector = cli.selector();
    let engines = registry.select(&selector)?;
    match &selector {
        EngineSelector::All => info!("Executing against all engines in {:?}", cli.config),
        EngineSelector::Named(name) => info!("Executing against engine: {}", name),
        EngineSelector::Default => info!(
            "Executing against the default engine in {:?}: {}",
            cli.config, engines[0].hostname
        ),
    }

    let options = UnitOptions {
        poll_interval: cli.poll_interval(),
        wait_for_recent: cli.wait_all,
    };
    let coordinator = Coordinator::new(HttpSessionProvider::default(), request, options);
    Ok(coordinator.run(engines))
}

/// Print LIST rows and summarize failures, after every unit has finished
fn report(summary: &RunSummary) {
    for (engine, rows) in summary.listings() {
        println!("{}:", engine);
        for row in rows {
            println!("{}\n", row);
        }
    }

    // Each failure was already logged by its unit
    let failed: Vec<&str> = summary.failures().map(|(engine, _)| engine).collect();
    if failed.is_empty() {
        info!("All {} engine(s) finished", summary.reports.len());
    } else {
        warn!(
            "{} of {} engine(s) failed: {}",
            failed.len(),
            summary.reports.len(),
            failed.join(", ")
        );
    }
}
