use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use triage::config::TriageConfig;
use triage::events::ErrorEvent;
use triage::orchestrator::Orchestrator;
use triage::rates::RateTracker;
use triage::remediation::RemediationEngine;
use triage::routing::{AlertRouter, TeamRegistry};
use triage::scaling::{NullMetricsSource, ScalingPredictor};
use triage::sink::{ErrorLogSink, HttpErrorLogSink, NullErrorLogSink};

/// Command-line arguments for the error triage orchestrator
#[derive(Parser)]
#[command(
    name = "triage",
    about = "Error triage orchestrator - automated remediation, alert routing, and scaling prediction",
    long_about = "Reads newline-delimited JSON error events from stdin, runs each through \
                  remediation, alert routing, and capacity-scaling prediction, and prints \
                  one JSON result per event to stdout."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,
}

/// Load configuration from file or fall back to defaults
fn load_config(path: Option<&PathBuf>) -> TriageConfig {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match TriageConfig::from_file(path) {
                Ok(config) => config,
                Err(e) => {
                    error!("Configuration error in '{}': {}", path.display(), e);
                    warn!("Using default configuration");
                    TriageConfig::default()
                }
            }
        }
        None => {
            info!("Using default configuration");
            TriageConfig::default()
        }
    }
}

/// Assemble the orchestrator from configuration
fn build_orchestrator(config: &TriageConfig) -> Orchestrator {
    let sink: Arc<dyn ErrorLogSink> = if config.sink.endpoint.is_empty() {
        info!("No logging endpoint configured, remote event logging disabled");
        Arc::new(NullErrorLogSink)
    } else {
        match HttpErrorLogSink::new(config.sink.endpoint.clone()) {
            Ok(sink) => Arc::new(sink),
            Err(e) => {
                error!("Failed to create logging sink, disabling remote logging: {}", e);
                Arc::new(NullErrorLogSink)
            }
        }
    };

    let engine = if config.remediation.use_default_rules {
        Arc::new(RemediationEngine::with_default_rules())
    } else {
        Arc::new(RemediationEngine::new())
    };
    let router = Arc::new(AlertRouter::new(TeamRegistry::with_defaults()));
    let rates = Arc::new(RateTracker::new(config.rates.window_minutes));

    let mut orchestrator = Orchestrator::new(
        sink,
        engine.clone(),
        router.clone(),
        Arc::new(ScalingPredictor::new()),
        rates,
        Arc::new(NullMetricsSource),
    )
    .with_stage_timeout(Duration::from_secs(config.orchestrator.stage_timeout_secs));
    orchestrator.register_reset(engine);
    orchestrator.register_reset(router);
    orchestrator.set_enabled(config.orchestrator.enabled);
    orchestrator
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting error triage orchestrator");

    let config = load_config(cli.config.as_ref());
    let orchestrator = build_orchestrator(&config);

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("Received interrupt signal, shutting down after the current event");
        shutdown_flag.store(true, Ordering::SeqCst);
    })?;

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: ErrorEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                error!("Skipping malformed event: {}", e);
                continue;
            }
        };

        let result = orchestrator.process_error(&event).await;
        println!("{}", serde_json::to_string(&result)?);
    }

    let status = orchestrator.status();
    info!(
        "Shutting down: {} error(s) in window, {} remediation failure(s), {} logging failure(s)",
        status.windowed_error_count, status.remediation_failures, status.logging_failures
    );
    Ok(())
}
