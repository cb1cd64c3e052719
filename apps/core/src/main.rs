// Shipment Analyst command-line entry point
// Loads one CSV, answers each question, prints JSON results.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shipment_analyst::config::AppConfig;
use shipment_analyst::orchestrator::ShipmentAnalyst;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shipment-analyst", about = "Answer questions about terminal shipment records")]
struct Cli {
    /// Shipment CSV to load
    #[arg(long)]
    csv: PathBuf,
    /// Question to ask (repeatable)
    #[arg(long = "question", short = 'q', required = true)]
    questions: Vec<String>,
    /// Forecast horizon in days
    #[arg(long)]
    periods: Option<i64>,
    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

fn init_tracing(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    // stdout carries the answers; logs go to stderr
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenv::dotenv().ok();
    init_tracing(&cli);

    let config = AppConfig::from_env().context("invalid configuration")?;
    let analyst = ShipmentAnalyst::from_config(config)?;

    let bytes = std::fs::read(&cli.csv).with_context(|| format!("failed to read {}", cli.csv.display()))?;
    let summary = analyst.upload(&bytes)?;
    info!("Loaded {} rows from {}", summary.row_count, cli.csv.display());
    println!("{}", serde_json::to_string(&summary)?);

    for question in &cli.questions {
        let result = analyst.ask(question, cli.periods).await?;
        println!("{}", serde_json::to_string(&result)?);
    }

    Ok(())
}
