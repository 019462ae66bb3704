//! Configuration structures for the verification pipeline.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::classify::VendorFormat;
use crate::detection::rules::RuleDefinition;
use crate::error::{DocverifyError, Result};
use crate::selection::tree::DecisionNode;

/// Main configuration for the docverify pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocverifyConfig {
    /// Rule-based type detection.
    pub detection: DetectionConfig,

    /// Keyword classification.
    pub classification: ClassificationConfig,

    /// Decision tree and field rules.
    pub selection: SelectionConfig,

    /// Source-text validation.
    pub validation: ValidationConfig,

    /// Cross-field consistency checks.
    pub consistency: ConsistencyConfig,

    /// Pipeline stages.
    pub pipeline: PipelineConfig,
}

impl Default for DocverifyConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            classification: ClassificationConfig::default(),
            selection: SelectionConfig::default(),
            validation: ValidationConfig::default(),
            consistency: ConsistencyConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Detection rule configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Start from the built-in rule set.
    pub use_default_rules: bool,

    /// Extra rules per document type, added after the built-in ones.
    pub rules: IndexMap<String, Vec<RuleDefinition>>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            use_default_rules: true,
            rules: IndexMap::new(),
        }
    }
}

/// Classifier configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Metadata signatures that short-circuit keyword scoring.
    pub vendor_formats: Vec<VendorFormat>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            vendor_formats: vec![VendorFormat::adobe()],
        }
    }
}

/// Extractor selection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Start from the built-in decision tree.
    pub use_default_tree: bool,

    /// Extractor key used when no tree root applies.
    pub default_extractor: String,

    /// Root nodes per document type; replace built-in roots.
    pub tree: IndexMap<String, DecisionNode>,

    /// `field -> regex` rules per document type.
    pub rules: IndexMap<String, IndexMap<String, String>>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            use_default_tree: true,
            default_extractor: "default".to_string(),
            tree: IndexMap::new(),
            rules: IndexMap::new(),
        }
    }
}

/// Field validation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Similarity needed for a fuzzy match (0.0 - 1.0).
    pub threshold: f64,

    /// Line items validated per record.
    pub max_items: usize,

    /// Smallest comparison window, in characters.
    pub min_window: usize,

    /// Window size as a multiple of the value length.
    pub window_multiplier: usize,

    /// Distance between window starts, in characters.
    pub window_step: usize,

    /// Share of found fields needed for a valid report.
    pub min_overall_confidence: f64,

    /// Absolute tolerance of the arithmetic warnings.
    pub consistency_tolerance: f64,

    /// Format rule per field path (`date`, `currency`, `percentage`, ...).
    pub field_types: IndexMap<String, String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let field_types = [
            ("issue_date", "date"),
            ("due_date", "date"),
            ("totals.subtotal", "currency"),
            ("totals.tax_amount", "currency"),
            ("totals.total", "currency"),
            ("totals.tax_rate", "percentage"),
        ]
        .into_iter()
        .map(|(field, kind)| (field.to_string(), kind.to_string()))
        .collect();

        Self {
            threshold: 0.7,
            max_items: 3,
            min_window: 100,
            window_multiplier: 5,
            window_step: 50,
            min_overall_confidence: 0.7,
            consistency_tolerance: 0.01,
            field_types,
        }
    }
}

/// Consistency checker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Relative tolerance for amount comparisons (0.01 = 1%).
    pub tolerance: f64,

    /// Longest accepted gap between issue and due date, in days.
    pub max_due_days: u64,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            max_due_days: 365,
        }
    }
}

/// Pipeline stage switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Validate extracted fields against the source text.
    pub validate_results: bool,

    /// Run the consistency checks on the extracted record.
    pub check_consistency: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validate_results: true,
            check_consistency: true,
        }
    }
}

impl DocverifyConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        if !unit.contains(&self.validation.threshold) {
            return Err(DocverifyError::Config(format!(
                "validation.threshold must be within [0, 1], got {}",
                self.validation.threshold
            )));
        }
        if !unit.contains(&self.validation.min_overall_confidence) {
            return Err(DocverifyError::Config(format!(
                "validation.min_overall_confidence must be within [0, 1], got {}",
                self.validation.min_overall_confidence
            )));
        }
        if self.validation.window_step == 0 {
            return Err(DocverifyError::Config(
                "validation.window_step must be positive".to_string(),
            ));
        }
        if self.consistency.tolerance.is_nan() || self.consistency.tolerance < 0.0 {
            return Err(DocverifyError::Config(format!(
                "consistency.tolerance must not be negative, got {}",
                self.consistency.tolerance
            )));
        }
        Ok(())
    }
}
