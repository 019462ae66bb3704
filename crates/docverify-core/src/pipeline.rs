//! Sequencing of detection, selection, extraction and validation.
//!
//! The pipeline owns one of each component, built once from configuration,
//! and runs them in order for every document. Nothing about a single
//! document can make [`ExtractionPipeline::process`] fail: extractor
//! problems are reported as warnings next to an empty record.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classify::{ClassificationAttributes, DocumentClassifier};
use crate::consistency::{ConsistencyChecker, ConsistencyReport};
use crate::detection::{DetectionResult, DocumentDetector};
use crate::error::{ExtractionError, Result};
use crate::extractor::Extractor;
use crate::models::config::DocverifyConfig;
use crate::models::record::ExtractionRecord;
use crate::models::Metadata;
use crate::selection::{Classification, ExtractorSelection, ExtractorSelector, SelectionOverrides};
use crate::validation::{FieldValidator, ValidationReport};

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Parameters and field rules that win over the selected ones.
    pub overrides: SelectionOverrides,
}

/// Everything the pipeline learned about one document.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub detection: DetectionResult,
    /// Type, confidence and features handed to the selector.
    pub classification: Classification,
    pub attributes: ClassificationAttributes,
    pub selection: ExtractorSelection,
    pub record: ExtractionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consistency: Option<ConsistencyReport>,
    pub warnings: Vec<String>,
}

impl PipelineResult {
    /// Whether every stage that ran accepted the record.
    pub fn is_valid(&self) -> bool {
        self.validation.as_ref().is_none_or(|v| v.is_valid)
            && self.consistency.as_ref().is_none_or(|c| c.overall_valid)
    }
}

/// Runs the full verification flow for a document.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    detector: DocumentDetector,
    classifier: DocumentClassifier,
    selector: ExtractorSelector,
    validator: FieldValidator,
    checker: ConsistencyChecker,
    validate_results: bool,
    check_consistency: bool,
}

impl ExtractionPipeline {
    /// Create a pipeline with default configuration.
    pub fn new() -> Result<Self> {
        Self::from_config(&DocverifyConfig::default())
    }

    /// Create a pipeline from configuration.
    pub fn from_config(config: &DocverifyConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            detector: DocumentDetector::from_config(&config.detection)?,
            classifier: DocumentClassifier::with_vendor_formats(
                config.classification.vendor_formats.clone(),
            ),
            selector: ExtractorSelector::from_config(&config.selection)?,
            validator: FieldValidator::from_config(&config.validation),
            checker: ConsistencyChecker::from_config(&config.consistency),
            validate_results: config.pipeline.validate_results,
            check_consistency: config.pipeline.check_consistency,
        })
    }

    /// Register an extractor under `key`, replacing any existing one.
    pub fn with_extractor<F>(mut self, key: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&ExtractorSelection) -> std::result::Result<Box<dyn Extractor>, ExtractionError>
            + Send
            + Sync
            + 'static,
    {
        self.selector.register_extractor(key, factory);
        self
    }

    pub fn detector(&self) -> &DocumentDetector {
        &self.detector
    }

    pub fn classifier(&self) -> &DocumentClassifier {
        &self.classifier
    }

    pub fn selector(&self) -> &ExtractorSelector {
        &self.selector
    }

    /// Detect the type and pick an extractor without extracting.
    pub fn classify(
        &self,
        text: &str,
        metadata: Option<&Metadata>,
        options: &ProcessOptions,
    ) -> (DetectionResult, Classification, ClassificationAttributes, ExtractorSelection) {
        let detection = self.detector.detect(text, metadata);
        let (classified_type, attributes) = self.classifier.classify_document(text, metadata);

        let (document_type, confidence) = if detection.is_unknown() {
            debug!(
                "No detection rule fired, using classifier verdict '{}'",
                classified_type
            );
            (classified_type, attributes.confidence)
        } else {
            (detection.document_type.clone(), detection.confidence)
        };

        let classification = Classification {
            document_type,
            confidence,
            features: attributes.features.clone(),
        };
        let selection = self.selector.select(&classification, Some(&options.overrides));

        (detection, classification, attributes, selection)
    }

    /// Process one document.
    pub fn process(
        &self,
        text: &str,
        metadata: Option<&Metadata>,
        options: &ProcessOptions,
    ) -> PipelineResult {
        let (detection, classification, attributes, selection) =
            self.classify(text, metadata, options);
        info!(
            "Processing {} document with extractor '{}'",
            classification.document_type, selection.extractor_key
        );

        let mut warnings = Vec::new();
        let record = match self
            .selector
            .create_extractor(&selection)
            .and_then(|extractor| extractor.extract_for_type(text, &classification.document_type))
        {
            Ok(record) => record,
            Err(e) => {
                warn!("Extraction failed: {}", e);
                warnings.push(format!("Extraction failed: {}", e));
                ExtractionRecord::default()
            }
        };

        let validation = self
            .validate_results
            .then(|| self.validator.validate(&record, text));
        if let Some(report) = &validation {
            warnings.extend(report.consistency_issues.iter().cloned());
        }

        let consistency = self
            .check_consistency
            .then(|| self.checker.check_all(&record));

        PipelineResult {
            detection,
            classification,
            attributes,
            selection,
            record,
            validation,
            consistency,
            warnings,
        }
    }
}
