//! Error types for the docverify-core library.
//!
//! Only configuration problems surface as errors. Anything that goes wrong
//! while scoring or checking a single document degrades to a zero score or
//! an invalid check instead.

use thiserror::Error;

/// Main error type for the docverify library.
#[derive(Error, Debug)]
pub enum DocverifyError {
    /// Detection rule set could not be built.
    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),

    /// Decision tree or extractor registry misconfiguration.
    #[error("selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Extractor failure.
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while registering detection rules.
#[derive(Error, Debug)]
pub enum DetectionError {
    /// A rule pattern failed to compile.
    #[error("rule '{rule}' has an invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        rule: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A rule definition is structurally wrong.
    #[error("rule '{rule}' is misconfigured: {reason}")]
    InvalidRule { rule: String, reason: String },
}

/// Errors raised while editing the decision tree or extractor registry.
#[derive(Error, Debug)]
pub enum SelectionError {
    /// The tree path is empty or has a dangling feature segment.
    #[error("invalid decision tree path '{0}'")]
    InvalidPath(String),

    /// The path names a feature the tree cannot branch on.
    #[error("unknown branch feature '{0}'")]
    UnknownFeature(String),

    /// A boolean branch value other than `true`/`false`.
    #[error("invalid value '{value}' for feature '{feature}'")]
    InvalidValue { feature: String, value: String },

    /// A field rule pattern failed to compile.
    #[error("field rule '{field}' has an invalid pattern: {source}")]
    InvalidFieldRule {
        field: String,
        #[source]
        source: regex::Error,
    },
}

/// Errors reported by extractors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// No field could be extracted.
    #[error("no document data found")]
    NoData,

    /// Extractor configuration is unusable.
    #[error("invalid extractor parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// No factory is registered under the key, nor a default one.
    #[error("no extractor registered for '{0}'")]
    UnknownExtractor(String),

    /// Extractor-specific failure.
    #[error("extractor '{extractor}' failed: {reason}")]
    Failed { extractor: String, reason: String },
}

/// Result type for the docverify library.
pub type Result<T> = std::result::Result<T, DocverifyError>;
