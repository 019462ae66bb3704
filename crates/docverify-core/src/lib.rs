//! Core library for verifying data extracted from OCR'd documents.
//!
//! This crate provides:
//! - Rule-based document type detection and keyword classification
//! - Decision-tree selection of an extractor and its configuration
//! - A generic regex-driven extractor behind the `Extractor` trait
//! - Field validation against the document's own text
//! - Cross-field consistency checks (totals, line items, dates, currency, tax)

pub mod error;
pub mod models;
pub mod fields;
pub mod classify;
pub mod detection;
pub mod selection;
pub mod extractor;
pub mod validation;
pub mod consistency;
pub mod pipeline;

pub use error::{DocverifyError, DetectionError, ExtractionError, Result, SelectionError};
pub use models::{DocverifyConfig, ExtractionRecord, FieldValue, LineItem, Metadata, Party, Totals};
pub use classify::{ClassificationAttributes, DocumentClassifier, Features};
pub use detection::{DetectionResult, DocumentDetector, PatternRule, MetadataRule, Rule};
pub use selection::{
    Classification, DecisionNode, ExtractorSelection, ExtractorSelector, SelectionOverrides,
};
pub use extractor::{Extractor, PatternExtractor};
pub use validation::{FieldValidator, ValidationReport};
pub use consistency::{ConsistencyChecker, ConsistencyReport};
pub use pipeline::{ExtractionPipeline, PipelineResult, ProcessOptions};
