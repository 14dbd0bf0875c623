//! Command-line interface for refuel.
//!
//! Provides commands for running the negotiation pipeline, checking a
//! single stage output against its schema, and inspecting the policy table
//! and resolved configuration.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::adapters::StageSet;
use crate::config::{self, ResolvedConfig};
use crate::core::{policy, schema, Orchestrator, BANDS};
use crate::domain::{Event, EventKind, PipelineState, Run, StageRecord};

/// refuel - Sensor -> trader -> station refill negotiation
#[derive(Parser, Debug)]
#[command(name = "refuel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline once
    Run {
        /// Config file (searched for as .refuel/config.yaml if not provided)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the simulated sensor's fuel level
        #[arg(long)]
        fuel_level: Option<f64>,

        /// Override the settlement token
        #[arg(long)]
        token: Option<String>,
    },

    /// Validate one stage output (reads stdin if no file is given)
    Validate {
        /// Which hand-off the output belongs to
        #[arg(value_enum)]
        kind: HandOff,

        /// Input file
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show the severity policy table
    Policy,

    /// Show resolved configuration (debug)
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Hand-off selector for `validate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HandOff {
    /// FUEL_OK or FUEL_LOW_DETECTED
    Sensor,

    /// NO_ACTION or FUEL_REQUEST
    Decision,

    /// FUEL_QUOTE
    Quote,
}

impl HandOff {
    fn expected(self) -> &'static [EventKind] {
        match self {
            HandOff::Sensor => EventKind::SENSOR,
            HandOff::Decision => EventKind::DECISION,
            HandOff::Quote => EventKind::QUOTE,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                config,
                fuel_level,
                token,
            } => run_pipeline(config, fuel_level, token).await,
            Commands::Validate { kind, input } => validate_output(kind, input),
            Commands::Policy => show_policy(),
            Commands::Config { config } => show_config(config),
        }
    }
}

/// Apply command-line overrides on top of the loaded configuration
fn apply_overrides(
    mut cfg: ResolvedConfig,
    fuel_level: Option<f64>,
    token: Option<String>,
) -> Result<ResolvedConfig> {
    if let Some(level) = fuel_level {
        if !(0.0..=100.0).contains(&level) {
            anyhow::bail!("--fuel-level must be between 0 and 100, got {}", level);
        }
        cfg.simulation.fuel_level_percent = level;
    }

    if let Some(token) = token {
        if token.trim().is_empty() {
            anyhow::bail!("--token cannot be empty");
        }
        cfg.settlement_token = token;
    }

    Ok(cfg)
}

/// Run the pipeline and report the outcome
async fn run_pipeline(
    config_path: Option<PathBuf>,
    fuel_level: Option<f64>,
    token: Option<String>,
) -> Result<()> {
    let cfg = config::load_config(config_path.as_deref())?;
    let cfg = apply_overrides(cfg, fuel_level, token)?;

    let stages = StageSet::from_config(&cfg)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let orchestrator = Orchestrator::new(stages, cfg.pipeline_config())
        .with_cancellation(cancel)
        .with_observer(print_hop);
    let run = orchestrator.run().await;

    report_outcome(&run);

    if run.exit_code() != 0 {
        std::process::exit(run.exit_code());
    }

    Ok(())
}

/// Print a hop's raw output under its heading
fn print_hop(record: &StageRecord) {
    println!("\n--- {} ---", record.role.hop_label());
    match &record.output {
        Some(output) => println!("{}", output.trim_end()),
        None => println!("(no output, {}ms)", record.duration_ms),
    }
}

fn report_outcome(run: &Run) {
    match &run.state {
        PipelineState::NoAction { decision, .. } => {
            println!("\n✅ No action needed: {}", decision.reason);
        }
        PipelineState::Complete { quote, .. } => {
            println!(
                "\n✅ Flow complete: {} quoted {} L at {} {} ({} total)",
                quote.station_id,
                quote.liters,
                quote.price_per_liter_usd,
                quote.payment_token,
                quote.total_usd
            );
            println!("Next step: {}", quote.next_step);
        }
        PipelineState::Failed { error } => {
            eprintln!("\n[Run {} failed: {}: {}]", run.id, error.category(), error);
            if let Some(stage) = error.stage() {
                eprintln!("  stage: {}", stage);
            }
        }
        other => {
            eprintln!("\n[Run {} stopped in state {}]", run.id, other);
        }
    }
}

/// Read text from a file or stdin
fn read_input(input_file: Option<PathBuf>) -> Result<String> {
    let input = match input_file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read from stdin")?;
            buffer
        }
    };

    if input.trim().is_empty() {
        anyhow::bail!("Input is empty");
    }

    Ok(input)
}

/// Check one stage output the way the pipeline would
fn validate_output(kind: HandOff, input_file: Option<PathBuf>) -> Result<()> {
    let raw = read_input(input_file)?;
    let event = check_output(kind, &raw)?;

    println!("✅ Valid {}", event.kind());
    println!(
        "{}",
        serde_json::to_string_pretty(&event).context("Failed to encode event")?
    );

    Ok(())
}

/// Schema check, plus the policy gate for purchase requests
fn check_output(kind: HandOff, raw: &str) -> Result<Event> {
    let event = schema::validate(raw, kind.expected())
        .with_context(|| format!("{:?} output rejected", kind))?;

    if let Event::FuelRequest(request) = &event {
        policy::check_request(request).context("Purchase request violates policy")?;
    }

    Ok(event)
}

/// Print the severity bands
fn show_policy() -> Result<()> {
    println!(
        "{:<10} {:<10} {:<16} {:<16} {:<10}",
        "SEVERITY", "LITERS", "MAX USD/LITER", "DEADLINE (MIN)", "PRIORITY"
    );
    println!("{}", "-".repeat(66));

    for band in BANDS.iter() {
        println!(
            "{:<10} {:<10} {:<16} {:<16} {:<10}",
            band.severity.to_string(),
            band.liters.to_string(),
            band.max_price_per_liter_usd.to_string(),
            band.delivery_deadline_minutes.to_string(),
            band.priority.to_string()
        );
    }

    Ok(())
}

/// Show resolved configuration
fn show_config(config_path: Option<PathBuf>) -> Result<()> {
    let cfg = config::load_config(config_path.as_deref())?;

    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    print!(
        "{}",
        serde_yaml::to_string(&cfg).context("Failed to render configuration")?
    );

    Ok(())
}
