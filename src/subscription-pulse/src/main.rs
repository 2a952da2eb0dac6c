//! Subscription Pulse: growth accounting, cohort retention and KPI
//! snapshots over subscription histories.
//!
//! Generates synthetic datasets, fits the subscription model over JSON
//! datasets, and prints KPI bundles.

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use subscription_analytics::{DatasetGenerator, ModelOutput, SubscriptionModel};
use subscription_core::types::period_instant;
use subscription_core::{AppConfig, Dataset, Granularity, SubscriptionRecord};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "subscription-pulse")]
#[command(about = "Subscription growth accounting, retention and KPI engine")]
#[command(version)]
struct Cli {
    /// Optional configuration file (TOML)
    #[arg(short, long, env = "SUBSCRIPTION_PULSE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a synthetic dataset as a JSON array of subscription records
    Generate {
        /// Number of users (overrides config)
        #[arg(short = 'n', long)]
        number_users: Option<usize>,

        /// Earliest start date, YYYY-MM-DD (overrides config)
        #[arg(long)]
        min_start_date: Option<NaiveDate>,

        /// Latest end date, YYYY-MM-DD (overrides config)
        #[arg(long)]
        max_end_date: Option<NaiveDate>,

        /// RNG seed for reproducible datasets (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Date treated as today; ends on or after it stay open
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit the subscription model and write the full JSON output
    Analyze {
        /// Path to the JSON dataset
        #[arg(short, long)]
        input: PathBuf,

        /// Restrict the run to one granularity: day, week or month
        #[arg(short, long)]
        granularity: Option<Granularity>,

        /// Evaluation date, YYYY-MM-DD (default: now)
        #[arg(long)]
        as_of: Option<NaiveDate>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the KPI snapshot for a JSON dataset
    Kpis {
        /// Path to the JSON dataset
        #[arg(short, long)]
        input: PathBuf,

        /// Evaluation date, YYYY-MM-DD (default: now)
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subscription_pulse=info,subscription_analytics=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    run_detached(run(cli.command, config))?
}

/// Drives `future` on a fresh runtime and shuts it down without waiting for
/// blocking tasks still in flight, so a fit abandoned at its deadline does
/// not keep the process alive.
fn run_detached<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let output = runtime.block_on(future);
    runtime.shutdown_background();
    Ok(output)
}

async fn run(command: Commands, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Commands::Generate {
            number_users,
            min_start_date,
            max_end_date,
            seed,
            as_of,
            output,
        } => {
            let mut generator_config = config.generator;
            if let Some(n) = number_users {
                generator_config.number_users = n;
            }
            if let Some(date) = min_start_date {
                generator_config.min_start_date = date;
            }
            if let Some(date) = max_end_date {
                generator_config.max_end_date = date;
            }
            if seed.is_some() {
                generator_config.seed = seed;
            }

            let mut rng = match generator_config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let today = as_of.unwrap_or_else(|| Utc::now().date_naive());
            let records = DatasetGenerator::from_config(&generator_config)
                .generate(&mut rng, today)
                .context("Failed to generate dataset")?;

            info!(
                users = records.len(),
                seed = ?generator_config.seed,
                "Synthetic dataset generated"
            );
            write_json(&records, output.as_deref()).await?;
        }

        Commands::Analyze {
            input,
            granularity,
            as_of,
            output,
        } => {
            let mut config = config;
            if let Some(granularity) = granularity {
                config.engine.granularities = vec![granularity];
            }
            let dataset = load_dataset(&input).await?;
            let result = fit(config, dataset, evaluation_instant(as_of)).await?;
            write_json(&result, output.as_deref()).await?;
        }

        Commands::Kpis { input, as_of } => {
            let mut config = config;
            config.engine.granularities = Granularity::ALL.to_vec();
            let dataset = load_dataset(&input).await?;
            let result = fit(config, dataset, evaluation_instant(as_of)).await?;
            let kpis = result
                .kpis
                .context("KPI snapshot requires day, week and month reports")?;
            write_json(&kpis, None).await?;
        }
    }

    Ok(())
}

fn evaluation_instant(as_of: Option<NaiveDate>) -> DateTime<Utc> {
    as_of.map(period_instant).unwrap_or_else(Utc::now)
}

async fn load_dataset(path: &Path) -> anyhow::Result<Dataset> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    let records: Vec<SubscriptionRecord> = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse dataset {}", path.display()))?;
    info!(path = %path.display(), records = records.len(), "Dataset loaded");
    Ok(Dataset::new(records)?)
}

/// Runs the model on the blocking pool under the configured deadline.
async fn fit(
    config: AppConfig,
    dataset: Dataset,
    evaluation_instant: DateTime<Utc>,
) -> anyhow::Result<ModelOutput> {
    let deadline = Duration::from_secs(config.runtime.compute_timeout_secs);
    let model = SubscriptionModel::new(config.engine);
    let task = tokio::task::spawn_blocking(move || model.fit(&dataset, evaluation_instant));

    let Ok(joined) = tokio::time::timeout(deadline, task).await else {
        warn!(
            timeout_secs = deadline.as_secs(),
            "Model fit exceeded deadline, abandoning computation"
        );
        anyhow::bail!("Model fit exceeded {}s deadline", deadline.as_secs());
    };
    Ok(joined.context("Model fit task panicked")??)
}

async fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, body)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Output written");
        }
        None => println!("{body}"),
    }
    Ok(())
}
