//! mailmeet: clean a batch of emails and detect meeting proposals.
//!
//! # Usage
//!
//! ```bash
//! mailmeet emails.json --output report.json
//! mailmeet --config ./config.json --workers 8 emails.json
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use mailmeet_lib::json_store;
use mailmeet_lib::pipeline::Pipeline;
use mailmeet_lib::state::load_config;

/// Normalize emails and extract meeting candidates
#[derive(Parser, Debug)]
#[command(name = "mailmeet")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON array of raw emails
    #[arg(required = true)]
    input: PathBuf,

    /// Config file (default: ~/.mailmeet/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override pipeline.maxWorkers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = load_config(args.config.as_deref()).context("Failed to load config")?;
    if let Some(workers) = args.workers {
        config.pipeline.max_workers = workers;
    }

    let pipeline = Arc::new(Pipeline::new(&config).context("Invalid configuration")?);
    let emails = json_store::load_emails(&args.input)
        .with_context(|| format!("Failed to load emails from {}", args.input.display()))?;

    let report = pipeline.process_batch(emails).await;
    for failure in &report.failures {
        log::warn!("Email #{} ({}) skipped: {}", failure.index, failure.id, failure.reason);
    }

    match &args.output {
        Some(path) => json_store::save_report(path, &report.processed)
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => println!("{}", serde_json::to_string_pretty(&report.processed)?),
    }

    Ok(())
}
