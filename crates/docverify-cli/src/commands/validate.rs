//! Validate command - check an extracted record against its source text.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use docverify_core::validation::FieldValidator;

use super::{load_config, read_record, read_text};

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Extracted record (JSON)
    #[arg(required = true)]
    record: PathBuf,

    /// Source text the record was extracted from
    #[arg(required = true)]
    text: PathBuf,

    /// Similarity needed for a fuzzy match (overrides config)
    #[arg(short, long)]
    threshold: Option<f64>,
}

pub async fn run(args: ValidateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let record = read_record(&args.record)?;
    let text = read_text(&args.text)?;

    let mut validator = FieldValidator::from_config(&config.validation);
    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("Threshold must be between 0 and 1, got {}", threshold);
        }
        validator = validator.with_threshold(threshold);
    }

    info!("Validating {} against {}", args.record.display(), args.text.display());
    let report = validator.validate(&record, &text);

    println!("{}", serde_json::to_string_pretty(&report)?);

    for issue in &report.consistency_issues {
        eprintln!("{} {}", style("⚠").yellow(), issue);
    }

    Ok(())
}
