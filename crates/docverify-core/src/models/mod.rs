//! Data models shared across the pipeline.

pub mod config;
pub mod record;

pub use config::DocverifyConfig;
pub use record::{ExtractionRecord, FieldValue, LineItem, Party, Totals};

/// Document metadata: `filename`, `file_extension` and optional `source`.
pub type Metadata = std::collections::BTreeMap<String, String>;
