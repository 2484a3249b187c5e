//! gbp-mapperd: replays group-policy events against a dry-run fabric.
//!
//! Reads a JSON array of [`ReplayEvent`]s, pushes every event through the
//! mapping orchestrator and prints the committed fabric transactions,
//! per-event results and orchestrator counters as one JSON document.

use anyhow::{Context, Result};
use clap::Parser;
use gbp_fabric::{LoggingFabric, RecordingFabric, Transaction};
use gbp_mapping::{
    init_logging, init_logging_pretty, MappingConfig, MappingOrchStats, ReplayEvent,
    ReplayOutcome, Replayer,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Group-policy to fabric mapping daemon (replay mode)
#[derive(Parser, Debug)]
#[command(name = "gbp-mapperd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Mapping configuration (YAML); built-in defaults if omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Replay file: a JSON array of events
    #[arg(short = 'e', long)]
    events: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,

    /// Stop at the first rejected event
    #[arg(long)]
    fail_fast: bool,
}

#[derive(Debug, Serialize)]
struct EventReport {
    index: usize,
    event: &'static str,
    #[serde(flatten)]
    outcome: Option<ReplayOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    transactions: Vec<Transaction>,
    events: Vec<EventReport>,
    stats: MappingOrchStats,
}

fn run(args: &Args) -> Result<bool> {
    let config = match &args.config {
        Some(path) => MappingConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MappingConfig::default(),
    };
    info!(
        common_tenant = %config.common_tenant,
        segments = config.external_segments.len(),
        "Configuration loaded"
    );

    let content = std::fs::read_to_string(&args.events)
        .with_context(|| format!("reading events {}", args.events.display()))?;
    let events = ReplayEvent::parse_all(&content)?;
    info!(count = events.len(), "Replaying events");

    let fabric = Arc::new(LoggingFabric::new(RecordingFabric::new()));
    let mut replayer = Replayer::new(config, fabric.clone());

    let mut reports = Vec::with_capacity(events.len());
    let mut clean = true;
    for (index, event) in events.into_iter().enumerate() {
        let name = event.name();
        match replayer.apply(event) {
            Ok(outcome) => reports.push(EventReport {
                index,
                event: name,
                outcome: Some(outcome),
                error_type: None,
                error: None,
            }),
            Err(e) => {
                warn!(index, event = name, error = %e, "Event rejected");
                clean = false;
                reports.push(EventReport {
                    index,
                    event: name,
                    outcome: None,
                    error_type: Some(e.type_name()),
                    error: Some(e.to_string()),
                });
                if args.fail_fast {
                    break;
                }
            }
        }
    }

    let report = ReplayReport {
        transactions: fabric.inner().transactions(),
        events: reports,
        stats: replayer.orch().stats(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(clean)
}

fn main() -> ExitCode {
    let args = Args::parse();

    if args.pretty {
        init_logging_pretty(&args.log_level);
    } else {
        init_logging(&args.log_level);
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            error!("gbp-mapperd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
