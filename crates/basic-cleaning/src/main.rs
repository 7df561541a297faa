//! CLI entry point for the basic cleaning job.

use anyhow::Result;
use basic_cleaning::{
    CleaningConfig, CleaningError, CleaningResult, CleaningSummary, LocalArtifactStore, Pipeline,
};
use clap::Parser;
use dotenv::dotenv;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};

/// Environment variable selecting the root directory of the artifact store.
const STORE_DIR_ENV: &str = "ARTIFACT_STORE_DIR";
const DEFAULT_STORE_DIR: &str = "./artifacts";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "A very basic data cleaning",
    long_about = "Fetches a raw dataset artifact, keeps the rows whose price lies in\n\
                  [min_price, max_price], converts last_review to datetime and publishes\n\
                  the result as a new artifact version.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  ARTIFACT_STORE_DIR    Root of the local artifact store (default: ./artifacts)\n  \
                  RUST_LOG              Log filter (default: info)\n\n\
                  EXAMPLE:\n  \
                  basic-cleaning --input_artifact sample.csv:latest \\\n    \
                  --output_artifact clean_sample.csv --output_type clean_sample \\\n    \
                  --output_description \"Data with outliers and null values removed\" \\\n    \
                  --min_price 10 --max_price 350"
)]
struct Args {
    /// Fully-qualified name for the input artifact, e.g. sample.csv:latest
    #[arg(long = "input_artifact")]
    input_artifact: String,

    /// Name for the output artifact
    #[arg(long = "output_artifact")]
    output_artifact: String,

    /// Type for the output artifact
    #[arg(long = "output_type")]
    output_type: String,

    /// Description for the output artifact
    #[arg(long = "output_description")]
    output_description: String,

    /// Minimum price to consider (inclusive)
    #[arg(long = "min_price", allow_negative_numbers = true)]
    min_price: f64,

    /// Maximum price to consider (inclusive)
    #[arg(long = "max_price", allow_negative_numbers = true)]
    max_price: f64,
}

/// Initialize the tracing subscriber for logging.
fn init_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Exit status for a run rejected because of its arguments or its input
/// dataset, as opposed to a failure of the environment.
const EXIT_USER_ERROR: u8 = 2;

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Load environment variables from .env file
    dotenv().ok();

    init_logging();

    match run(args) {
        Ok(summary) => {
            info!("Run complete");
            print_summary(&summary);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_user_error() => {
            eprintln!("error: {}", e);
            eprintln!("Check the arguments and the input artifact, then run again.");
            Ok(ExitCode::from(exit_status(&e)))
        }
        Err(e) => Err(anyhow::Error::new(e).context("Basic cleaning failed")),
    }
}

/// Exit status for a failed run: [`EXIT_USER_ERROR`] for input problems,
/// 1 for everything else.
fn exit_status(error: &CleaningError) -> u8 {
    if error.is_user_error() { EXIT_USER_ERROR } else { 1 }
}

fn run(args: Args) -> CleaningResult<CleaningSummary> {
    let store_dir = env::var(STORE_DIR_ENV).unwrap_or_else(|_| DEFAULT_STORE_DIR.to_string());
    debug!("Using artifact store at {}", store_dir);
    let store = Arc::new(LocalArtifactStore::new(store_dir));

    let config = CleaningConfig::builder()
        .input_artifact(args.input_artifact)
        .output_artifact(args.output_artifact)
        .output_type(args.output_type)
        .output_description(args.output_description)
        .price_range(args.min_price, args.max_price)
        .build()?;

    Pipeline::builder()
        .config(config)
        .store(store)
        .on_progress(|update| {
            debug!(
                "[{:>3.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        })
        .build()?
        .run()
}

/// Print a short human-readable summary of the run.
fn print_summary(summary: &CleaningSummary) {
    let report = &summary.report;

    println!();
    println!("{}", "=".repeat(60));
    println!("BASIC CLEANING COMPLETE");
    println!("{}", "=".repeat(60));
    println!("Input:     {} ({})", summary.input_artifact, summary.input_path.display());
    println!(
        "Output:    {} ({} bytes)",
        summary.output_file.display(),
        summary.output_bytes
    );
    println!("Published: {}", summary.published);
    println!(
        "Rows:      {} -> {} ({} removed)",
        report.rows_before, report.rows_after, report.rows_removed
    );
    println!(
        "Dates:     {} parsed, {} missing, {} unparseable set to null",
        report.dates_parsed, report.dates_missing, report.dates_nulled
    );
    println!("Duration:  {}ms", summary.duration_ms);
    println!("{}", "=".repeat(60));
}
