//! Validation of extracted fields against the document's own text.
//!
//! Every scalar the extractor produced is looked up in the source text,
//! first verbatim and then fuzzily over sliding windows. A coarse
//! arithmetic pass adds plain-text warnings, and configured fields are run
//! through the [`FormatValidator`].

pub mod similarity;

use indexmap::IndexMap;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fields::formats::{FormatCheck, FormatValidator};
use crate::models::config::ValidationConfig;
use crate::models::record::{ExtractionRecord, FieldValue};

pub use similarity::sequence_ratio;

/// Verdict for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidation {
    pub field_path: String,
    pub valid: bool,
    pub confidence: f64,
}

/// Outcome of [`FieldValidator::validate`].
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub field_validations: IndexMap<String, FieldValidation>,
    pub consistency_issues: Vec<String>,
    /// Share of fields found in the source text.
    pub overall_confidence: f64,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub format_checks: IndexMap<String, FormatCheck>,
}

/// Checks extracted values against source text.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    config: ValidationConfig,
    formats: FormatValidator,
}

impl FieldValidator {
    /// Create a validator with default settings.
    pub fn new() -> Self {
        Self::from_config(&ValidationConfig::default())
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            config: config.clone(),
            formats: FormatValidator::new(),
        }
    }

    /// Set the similarity needed for a fuzzy match.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Replace the format rules run by [`validate`](Self::validate).
    pub fn with_format_validator(mut self, formats: FormatValidator) -> Self {
        self.formats = formats;
        self
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// `(valid, confidence)` for one value, using the configured threshold.
    pub fn validate_field(&self, name: &str, value: &FieldValue, source: &str) -> (bool, f64) {
        self.validate_field_with_threshold(name, value, source, self.config.threshold)
    }

    /// `(valid, confidence)` for one value.
    pub fn validate_field_with_threshold(
        &self,
        name: &str,
        value: &FieldValue,
        source: &str,
        threshold: f64,
    ) -> (bool, f64) {
        if value.is_empty() {
            return (false, 0.0);
        }

        let value = value.to_string();
        if source.contains(value.as_str()) {
            return (true, 1.0);
        }

        let similarity = self.best_window_ratio(&value, source);
        debug!("Field '{}' best similarity {:.2}", name, similarity);
        (similarity >= threshold, similarity)
    }

    fn best_window_ratio(&self, value: &str, source: &str) -> f64 {
        let source: Vec<char> = source.chars().collect();
        let window = self
            .config
            .min_window
            .max(value.chars().count() * self.config.window_multiplier);

        if source.len() <= window {
            let source: String = source.iter().collect();
            return sequence_ratio(value, &source);
        }

        let step = self.config.window_step.max(1);
        (0..=source.len() - window)
            .step_by(step)
            .map(|start| {
                let slice: String = source[start..start + window].iter().collect();
                sequence_ratio(value, &slice)
            })
            .fold(0.0, f64::max)
    }

    /// Validate top-level scalars, `totals.*` and the first few items.
    pub fn validate_invoice_data(
        &self,
        record: &ExtractionRecord,
        source: &str,
    ) -> IndexMap<String, FieldValidation> {
        record_fields(record, self.config.max_items)
            .into_iter()
            .map(|(path, value)| {
                let (valid, confidence) = self.validate_field(&path, &value, source);
                let validation = FieldValidation {
                    field_path: path.clone(),
                    valid,
                    confidence,
                };
                (path, validation)
            })
            .collect()
    }

    /// Plain-text warnings about item and totals arithmetic.
    pub fn validate_consistency(&self, record: &ExtractionRecord) -> Vec<String> {
        let mut issues = Vec::new();
        let tolerance = Decimal::from_f64(self.config.consistency_tolerance)
            .unwrap_or_else(|| Decimal::new(1, 2));
        let totals = &record.totals;
        let subtotal = totals.subtotal.as_ref().and_then(FieldValue::to_decimal);

        if !record.items.is_empty() {
            if let Some(subtotal) = subtotal {
                let item_sum: Decimal = record
                    .items
                    .iter()
                    .filter_map(|item| item.total.as_ref().and_then(FieldValue::to_decimal))
                    .sum();
                if (item_sum - subtotal).abs() > tolerance {
                    issues.push(format!(
                        "Item total sum ({}) doesn't match subtotal ({})",
                        item_sum, subtotal
                    ));
                }
            }
        }

        let tax = totals.tax_amount.as_ref().and_then(FieldValue::to_decimal);
        let total = totals.total.as_ref().and_then(FieldValue::to_decimal);
        if let (Some(subtotal), Some(tax), Some(total)) = (subtotal, tax, total) {
            let calculated = subtotal + tax;
            if (calculated - total).abs() > tolerance {
                issues.push(format!(
                    "Calculated total ({}) doesn't match total ({})",
                    calculated, total
                ));
            }
        }

        issues
    }

    /// Full validation: per-field checks, arithmetic warnings and format
    /// checks.
    pub fn validate(&self, record: &ExtractionRecord, source: &str) -> ValidationReport {
        let field_validations = self.validate_invoice_data(record, source);
        let consistency_issues = self.validate_consistency(record);

        let valid_count = field_validations.values().filter(|v| v.valid).count();
        let overall_confidence = if field_validations.is_empty() {
            0.0
        } else {
            valid_count as f64 / field_validations.len() as f64
        };
        let is_valid = overall_confidence >= self.config.min_overall_confidence
            && consistency_issues.is_empty();

        let format_checks = if self.config.field_types.is_empty() {
            IndexMap::new()
        } else {
            let data: IndexMap<String, FieldValue> =
                record_fields(record, self.config.max_items).into_iter().collect();
            self.formats
                .validate_document_data(&data, &self.config.field_types)
                .fields
        };

        debug!(
            "Validated {} fields, {} valid, {} consistency issues",
            field_validations.len(),
            valid_count,
            consistency_issues.len()
        );

        ValidationReport {
            field_validations,
            consistency_issues,
            overall_confidence,
            is_valid,
            format_checks,
        }
    }
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Scalar fields by path: top level, `totals.<name>` and
/// `items[i].<name>` for the first `max_items` items.
pub fn record_fields(record: &ExtractionRecord, max_items: usize) -> Vec<(String, FieldValue)> {
    let mut fields = record.scalar_fields();

    fields.extend(
        record
            .totals
            .scalar_fields()
            .into_iter()
            .map(|(name, value)| (format!("totals.{}", name), value)),
    );

    for (i, item) in record.items.iter().take(max_items).enumerate() {
        fields.extend(
            item.scalar_fields()
                .into_iter()
                .map(|(name, value)| (format!("items[{}].{}", i, name), value)),
        );
    }

    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::{LineItem, Totals};
    use pretty_assertions::assert_eq;

    const SOURCE: &str = "ACME Ltd\nInvoice INV-001\nDate: 2023-10-15\nSubtotal: 100.00\nTax: 23.00\nTotal: 123.45\n";

    #[test]
    fn test_exact_substring() {
        let validator = FieldValidator::new();
        assert_eq!(
            validator.validate_field("total", &"123.45".into(), "...Total: 123.45..."),
            (true, 1.0)
        );
    }

    #[test]
    fn test_empty_value() {
        let validator = FieldValidator::new();
        assert_eq!(validator.validate_field("total", &"".into(), SOURCE), (false, 0.0));
    }

    #[test]
    fn test_fuzzy_match_on_short_source() {
        let validator = FieldValidator::new();
        let (valid, confidence) =
            validator.validate_field("number", &"INV-2023-001".into(), "lNV-2O23-0O1");
        assert!(valid);
        assert_eq!(confidence, 0.75);

        let (valid, confidence) = validator.validate_field_with_threshold(
            "number",
            &"INV-2023-001".into(),
            "lNV-2O23-0O1",
            0.8,
        );
        assert!(!valid);
        assert_eq!(confidence, 0.75);
    }

    #[test]
    fn test_windowed_match_on_long_source() {
        let validator = FieldValidator::new();
        let mut source = "x".repeat(400);
        source.push_str("lNV-2O23-0O1");
        source.push_str(&"y".repeat(400));

        // the value is far shorter than the 100-char window, so the best
        // window also contains filler
        let (valid, confidence) =
            validator.validate_field("number", &"INV-2023-001".into(), &source);
        assert!(!valid);
        assert!(confidence > 0.0 && confidence < 0.75);
    }

    #[test]
    fn test_validate_invoice_data_paths() {
        let record = ExtractionRecord {
            document_number: Some("INV-001".into()),
            totals: Totals {
                total: Some("123.45".into()),
                ..Default::default()
            },
            items: (0..5).map(|_| LineItem::with_total("23.00")).collect(),
            ..Default::default()
        };

        let validator = FieldValidator::new();
        let results = validator.validate_invoice_data(&record, SOURCE);
        let paths: Vec<&str> = results.keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec![
                "document_number",
                "totals.total",
                "items[0].total",
                "items[1].total",
                "items[2].total"
            ]
        );
        assert!(results.values().all(|v| v.valid));
        assert_eq!(results["totals.total"].field_path, "totals.total");
    }

    #[test]
    fn test_validate_consistency() {
        let record = ExtractionRecord {
            items: vec![LineItem::with_total(50), LineItem::with_total("40.00")],
            totals: Totals {
                subtotal: Some(100.into()),
                tax_amount: Some(23.into()),
                total: Some("$125.00".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let issues = FieldValidator::new().validate_consistency(&record);
        assert_eq!(
            issues,
            vec![
                "Item total sum (90.00) doesn't match subtotal (100)".to_string(),
                "Calculated total (123) doesn't match total (125.00)".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_report() {
        let record = ExtractionRecord {
            document_number: Some("INV-001".into()),
            issue_date: Some("2023-10-15".into()),
            due_date: Some("2023-13-45".into()),
            totals: Totals {
                subtotal: Some("100.00".into()),
                tax_amount: Some("23.00".into()),
                total: Some("123.00".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let report = FieldValidator::new().validate(&record, SOURCE);
        // due_date and total are not in the text
        assert_eq!(report.field_validations.len(), 6);
        assert!(report.consistency_issues.is_empty());
        assert!(report.overall_confidence >= 4.0 / 6.0);
        assert!(!report.format_checks["due_date"].valid);
        assert!(report.format_checks["issue_date"].valid);
    }

    #[test]
    fn test_no_fields_is_invalid() {
        let report = FieldValidator::new().validate(&ExtractionRecord::default(), SOURCE);
        assert_eq!(report.overall_confidence, 0.0);
        assert!(!report.is_valid);
    }
}
