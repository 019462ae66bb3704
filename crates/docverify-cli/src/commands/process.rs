//! Process command - run the full pipeline on a text file.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use docverify_core::pipeline::{ExtractionPipeline, PipelineResult, ProcessOptions};
use docverify_core::selection::SelectionOverrides;

use super::{document_metadata, load_config, read_text};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Text file holding the document's OCR output
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// File name reported in metadata (default: the input's name)
    #[arg(long)]
    filename: Option<String>,

    /// Source tag reported in metadata
    #[arg(long)]
    source: Option<String>,

    /// Extra field rule, as FIELD=REGEX (repeatable)
    #[arg(long = "rule", value_parser = parse_key_value)]
    rules: Vec<(String, String)>,

    /// Extractor parameter, as KEY=JSON (repeatable)
    #[arg(long = "param", value_parser = parse_key_value)]
    params: Vec<(String, String)>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let text = read_text(&args.input)?;
    let metadata = document_metadata(&args.input, args.filename.clone(), args.source.clone());

    info!("Processing file: {}", args.input.display());

    let mut overrides = SelectionOverrides::default();
    for (field, pattern) in &args.rules {
        overrides.rules.insert(field.clone(), pattern.clone());
    }
    for (key, value) in &args.params {
        // Bare words are taken as strings
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.clone()));
        overrides.params.insert(key.clone(), value);
    }

    let pipeline = ExtractionPipeline::from_config(&config)?;
    let result = pipeline.process(&text, Some(&metadata), &ProcessOptions { overrides });

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Text => format_text(&result),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    for warning in &result.warnings {
        eprintln!("{} {}", style("⚠").yellow(), warning);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_text(result: &PipelineResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "Document type: {} ({:.0}%)\n",
        result.classification.document_type,
        result.classification.confidence * 100.0
    ));
    output.push_str(&format!("Extractor: {}\n", result.selection.extractor_key));
    if !result.selection.decision_path.is_empty() {
        output.push_str(&format!(
            "Decision path: {}\n",
            result.selection.decision_path.join(" > ")
        ));
    }
    output.push('\n');

    let record = &result.record;
    output.push_str("Fields:\n");
    let fields = record
        .scalar_fields()
        .into_iter()
        .chain(
            record
                .totals
                .scalar_fields()
                .into_iter()
                .map(|(name, value)| (format!("totals.{}", name), value)),
        );
    for (name, value) in fields {
        let found = result
            .validation
            .as_ref()
            .and_then(|v| v.field_validations.get(&name))
            .map(|v| if v.valid { " ✓" } else { " ✗" })
            .unwrap_or("");
        output.push_str(&format!("  {}: {}{}\n", name, value, found));
    }
    if !record.items.is_empty() {
        output.push_str(&format!("  items: {}\n", record.items.len()));
    }

    if let Some(validation) = &result.validation {
        output.push_str(&format!(
            "\nValidation: {} (confidence {:.0}%)\n",
            if validation.is_valid { "valid" } else { "invalid" },
            validation.overall_confidence * 100.0
        ));
    }

    if let Some(consistency) = &result.consistency {
        output.push_str(&format!(
            "\nConsistency: {}\n",
            if consistency.overall_valid { "consistent" } else { "inconsistent" }
        ));
        for check in consistency.checks.values() {
            let mark = if check.valid { "✓" } else { "✗" };
            match &check.error {
                Some(error) => output.push_str(&format!("  {} {}: {}\n", mark, check.check, error)),
                None => output.push_str(&format!("  {} {}\n", mark, check.check)),
            }
        }
    }

    output
}
