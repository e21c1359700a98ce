//! # Process a directory of entity CSVs
//! vm-predictor run ./VM_data --target cpu_usage --output ./charts
//!
//! # Process a single file with custom windows
//! vm-predictor run ./VM_data/vm-123.csv --train-days 31 --predict-days 1 --resample 15min
//!
//! # Inspect an input file
//! vm-predictor inspect ./VM_data/vm-123.csv

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vm_predictor::data::loader::parse_timestamp_column;
use vm_predictor::data::DataLoader;
use vm_predictor::{BatchRunner, RandomForestAdapter, RunConfig};

#[derive(Parser)]
#[command(name = "vm-predictor")]
#[command(about = "Walk-forward resource-usage forecasting for VMs and subscribers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast entities and render comparison charts
    Run {
        /// Input directory of entity CSVs, or a single CSV file
        input: PathBuf,

        /// Path to a TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Target metric column
        #[arg(short, long)]
        target: Option<String>,

        /// Timestamp column in the input files
        #[arg(long)]
        timestamp_col: Option<String>,

        /// Training window size in days
        #[arg(long)]
        train_days: Option<i64>,

        /// Predict window size in days
        #[arg(long)]
        predict_days: Option<i64>,

        /// Resampling period (e.g. "1H", "15min"); "none" disables
        #[arg(long)]
        resample: Option<String>,

        /// Reporting percentile for daily aggregation
        #[arg(long)]
        percentile: Option<f64>,

        /// Output directory for chart artifacts
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Subscriber name prefixed to chart file names
        #[arg(long)]
        subscriber: Option<String>,
    },

    /// Show row count, columns and date range of an input file
    Inspect {
        /// CSV file to inspect
        input: PathBuf,

        /// Timestamp column in the input file
        #[arg(long, default_value = "DATETIMEUTC")]
        timestamp_col: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            input,
            config,
            target,
            timestamp_col,
            train_days,
            predict_days,
            resample,
            percentile,
            output,
            subscriber,
        } => {
            let mut run_config: RunConfig = match config {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading config {}", path.display()))?;
                    toml::from_str(&raw)
                        .with_context(|| format!("parsing config {}", path.display()))?
                }
                None => RunConfig::default(),
            };

            if let Some(target) = target {
                run_config.target_col = target;
            }
            if let Some(timestamp_col) = timestamp_col {
                run_config.timestamp_col = timestamp_col;
            }
            if let Some(train_days) = train_days {
                run_config.train_days = train_days;
            }
            if let Some(predict_days) = predict_days {
                run_config.predict_days = predict_days;
            }
            if let Some(resample) = resample {
                run_config.resample = match resample.as_str() {
                    "" | "none" => None,
                    _ => Some(resample),
                };
            }
            if let Some(percentile) = percentile {
                run_config.percentile = Some(percentile);
            }
            if subscriber.is_some() {
                run_config.subscriber = subscriber;
            }
            if let Some(output) = output {
                run_config.output_dir = output;
            }

            let adapter = RandomForestAdapter::with_params(run_config.model.clone());
            let runner = BatchRunner::new(run_config, &adapter);
            let summary = runner.run(&input)?;
            println!("{}", summary.summary());
        }

        Commands::Inspect {
            input,
            timestamp_col,
        } => {
            let loader = DataLoader::new(&timestamp_col);
            let df = loader.load_dataframe(&input)?;
            println!("File: {}", input.display());
            println!("Rows: {}", df.height());
            println!(
                "Columns: {}",
                df.get_column_names()
                    .iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );

            if let Ok(column) = df.column(timestamp_col.as_str()) {
                let mut timestamps = parse_timestamp_column(column)?;
                timestamps.sort();
                if let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) {
                    println!("Date range: {} to {}", first, last);
                }
            }
        }
    }

    Ok(())
}
