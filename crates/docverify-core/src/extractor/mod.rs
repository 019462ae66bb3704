//! Extractor capability consumed by the pipeline.

mod pattern;

use std::sync::Arc;

use crate::error::ExtractionError;
use crate::models::record::ExtractionRecord;
use crate::selection::ExtractorSelection;

pub use pattern::PatternExtractor;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Turns document text into an [`ExtractionRecord`].
pub trait Extractor: Send + Sync {
    /// Short name used in logs and warnings.
    fn name(&self) -> &str;

    /// Extract a record from plain text.
    fn extract(&self, text: &str) -> Result<ExtractionRecord>;

    /// Extract a record knowing the detected document type. Extractors that
    /// do not care about the type keep the default.
    fn extract_for_type(&self, text: &str, document_type: &str) -> Result<ExtractionRecord> {
        let _ = document_type;
        self.extract(text)
    }
}

/// Builds an extractor configured for a selection.
pub type ExtractorFactory =
    Arc<dyn Fn(&ExtractorSelection) -> Result<Box<dyn Extractor>> + Send + Sync>;
