//! Classify command - detect the document type and pick an extractor.

use std::path::PathBuf;

use clap::Args;
use serde_json::json;
use tracing::info;

use docverify_core::pipeline::{ExtractionPipeline, ProcessOptions};

use super::{document_metadata, load_config, read_text};

/// Arguments for the classify command.
#[derive(Args)]
pub struct ClassifyArgs {
    /// Text file holding the document's OCR output
    #[arg(required = true)]
    input: PathBuf,

    /// File name reported in metadata (default: the input's name)
    #[arg(long)]
    filename: Option<String>,

    /// Source tag reported in metadata (e.g. "adobe")
    #[arg(long)]
    source: Option<String>,
}

pub async fn run(args: ClassifyArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let text = read_text(&args.input)?;
    let metadata = document_metadata(&args.input, args.filename, args.source);

    info!("Classifying file: {}", args.input.display());

    let pipeline = ExtractionPipeline::from_config(&config)?;
    let (detection, classification, attributes, selection) =
        pipeline.classify(&text, Some(&metadata), &ProcessOptions::default());

    let output = json!({
        "document_type": classification.document_type,
        "confidence": classification.confidence,
        "language": attributes.language,
        "features": classification.features,
        "detection": detection,
        "selection": selection,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
