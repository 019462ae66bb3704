//! Subcommands.

pub mod check;
pub mod classify;
pub mod config;
pub mod process;
pub mod validate;

use std::fs;
use std::path::Path;

use docverify_core::models::config::DocverifyConfig;
use docverify_core::models::record::ExtractionRecord;
use docverify_core::models::Metadata;

/// Configuration from `--config`, or defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<DocverifyConfig> {
    match config_path {
        Some(path) => Ok(DocverifyConfig::from_file(Path::new(path))?),
        None => Ok(DocverifyConfig::default()),
    }
}

/// Read a text file that must exist.
pub fn read_text(path: &Path) -> anyhow::Result<String> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }
    Ok(fs::read_to_string(path)?)
}

/// Read an extraction record stored as JSON.
pub fn read_record(path: &Path) -> anyhow::Result<ExtractionRecord> {
    let content = read_text(path)?;
    serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid record in {}: {}", path.display(), e))
}

/// Metadata for a document: its file name and extension, and an optional
/// source tag.
pub fn document_metadata(
    path: &Path,
    filename: Option<String>,
    source: Option<String>,
) -> Metadata {
    let mut metadata = Metadata::new();

    let filename = filename.or_else(|| {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
    });
    if let Some(filename) = filename {
        if let Some(extension) = Path::new(&filename).extension().and_then(|e| e.to_str()) {
            metadata.insert("file_extension".to_string(), extension.to_lowercase());
        }
        metadata.insert("filename".to_string(), filename);
    }
    if let Some(source) = source {
        metadata.insert("source".to_string(), source);
    }

    metadata
}
