//! Check command - run consistency checks on an extracted record.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use docverify_core::consistency::ConsistencyChecker;

use super::{load_config, read_record};

/// Exit code when the record is inconsistent.
const INCONSISTENT_EXIT_CODE: i32 = 2;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Extracted record (JSON)
    #[arg(required = true)]
    record: PathBuf,

    /// Relative tolerance for amount comparisons (overrides config)
    #[arg(short, long)]
    tolerance: Option<f64>,
}

pub async fn run(args: CheckArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(tolerance) = args.tolerance {
        if tolerance.is_nan() || tolerance < 0.0 {
            anyhow::bail!("Tolerance must not be negative, got {}", tolerance);
        }
        config.consistency.tolerance = tolerance;
    }

    let record = read_record(&args.record)?;
    let checker = ConsistencyChecker::from_config(&config.consistency);

    info!("Checking {}", args.record.display());
    let report = checker.check_all(&record);

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.overall_valid {
        for error in report.errors() {
            eprintln!("{} {}", style("✗").red(), error);
        }
        std::process::exit(INCONSISTENT_EXIT_CODE);
    }

    Ok(())
}
