//! Bankrate Simulator
//!
//! Runs the rate engine against synthetic bank sources.

use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bankrate_engine::EngineConfig;

mod bank;
mod controller;
mod metrics;
mod scenario;

use bank::SourceProfile;
use controller::SimulationController;
use metrics::SimulationReport;
use scenario::Scenario;

/// Bankrate Simulator CLI
#[derive(Parser, Debug)]
#[command(name = "simulator")]
#[command(about = "Bankrate engine simulation environment")]
struct Args {
    /// Number of simulated banks to register
    #[arg(short, long, default_value = "5")]
    banks: usize,

    /// Scenario to run (course, series, best-rate, outage)
    #[arg(short, long)]
    scenario: Option<String>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Latency of every simulated page fetch
    #[arg(long, default_value = "20")]
    latency_ms: u64,

    /// Chance that a page fetch times out
    #[arg(long, default_value = "0.0")]
    failure_rate: f64,

    /// Run duration in seconds (0 = infinite)
    #[arg(long, default_value = "0")]
    duration: u64,

    /// Emit JSON logs and a JSON metrics report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let json_layer = args.json.then(|| tracing_subscriber::fmt::layer().json());
    let text_layer = (!args.json).then(|| tracing_subscriber::fmt::layer());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(json_layer)
        .with(text_layer)
        .init();

    if !(0.0..=1.0).contains(&args.failure_rate) {
        anyhow::bail!("failure rate must be within 0..=1, got {}", args.failure_rate);
    }

    let config = EngineConfig::from_env();
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    info!("Starting Bankrate Simulator");
    info!("Banks: {}", args.banks);
    info!("Workers: {}", config.workers);

    let profile = SourceProfile {
        latency: Duration::from_millis(args.latency_ms),
        failure_rate: args.failure_rate,
    };
    let controller = SimulationController::new(args.banks, args.seed, profile, config)?;

    if let Some(scenario_name) = &args.scenario {
        info!("Running scenario: {}", scenario_name);

        let scenario = Scenario::load(scenario_name)?;
        controller.run_scenario(scenario).await?;
    } else {
        info!("Running in interactive mode");
        info!("Press Ctrl+C to stop");

        let duration = if args.duration > 0 {
            Some(Duration::from_secs(args.duration))
        } else {
            None
        };

        controller.run(duration).await?;
    }

    let report = SimulationReport::new(controller.get_metrics().await, controller.cached_entries());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    let metrics = &report.metrics;
    info!("Simulation complete");
    info!("Total queries: {}", metrics.total_queries);
    info!("Successful: {}", metrics.successful_queries);
    info!("Failed: {} ({} caller errors)", metrics.failed_queries, metrics.caller_errors);
    info!("Series gaps: {}", metrics.series_gaps);
    info!("Cached entries: {}", report.cached_entries);
    info!(
        "Infrastructure failure rate: {:.1}%",
        metrics.infrastructure_failure_rate() * 100.0
    );
    for (kind, latency) in &report.latency {
        info!(
            "{:?} latency: median {}ms, p99 {}ms, max {}ms over {} answers",
            kind, latency.median_ms, latency.p99_ms, latency.max_ms, latency.samples
        );
    }

    Ok(())
}
