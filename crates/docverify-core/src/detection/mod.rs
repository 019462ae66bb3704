//! Weighted rule-based document type detection.

pub mod rules;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::DetectionError;
use crate::models::config::DetectionConfig;
use crate::models::Metadata;

pub use rules::{MetadataRule, PatternRule, Rule, RuleDefinition};

/// Type reported when no rule scores above zero.
pub const UNKNOWN_TYPE: &str = "unknown";

/// Score of a single rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule_name: String,
    pub confidence: f64,
    pub priority: u32,
}

/// Aggregated score of one document type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDetection {
    pub confidence: f64,
    pub rule_results: Vec<RuleResult>,
}

/// Outcome of [`DocumentDetector::detect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub document_type: String,
    pub confidence: f64,
    pub per_type_results: IndexMap<String, TypeDetection>,
}

impl DetectionResult {
    pub fn is_unknown(&self) -> bool {
        self.document_type == UNKNOWN_TYPE
    }
}

/// Registry of detection rules grouped by document type.
///
/// Types are scored in registration order and a later type only replaces
/// the current best when its confidence is strictly higher.
#[derive(Debug, Clone, Default)]
pub struct DocumentDetector {
    rules: IndexMap<String, Vec<Rule>>,
}

impl DocumentDetector {
    /// Create an empty detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with the stock rule set.
    pub fn with_default_rules() -> Result<Self, DetectionError> {
        let mut detector = Self::new();
        for (document_type, definition) in default_rule_definitions() {
            detector.add_rule(document_type, definition.build()?);
        }
        Ok(detector)
    }

    /// Build a detector from configuration.
    pub fn from_config(config: &DetectionConfig) -> Result<Self, DetectionError> {
        let mut detector = if config.use_default_rules {
            Self::with_default_rules()?
        } else {
            Self::new()
        };

        for (document_type, definitions) in &config.rules {
            for definition in definitions {
                detector.add_rule(document_type.clone(), definition.build()?);
            }
        }

        Ok(detector)
    }

    /// Register a rule, keeping the type's rules ordered by priority
    /// (highest first, registration order among equals).
    pub fn add_rule(&mut self, document_type: impl Into<String>, rule: impl Into<Rule>) {
        let document_type = document_type.into();
        let rule = rule.into();
        debug!(
            "Adding rule '{}' (priority {}) for '{}'",
            rule.name(),
            rule.priority(),
            document_type
        );

        let rules = self.rules.entry(document_type).or_default();
        rules.push(rule);
        rules.sort_by_key(|r| std::cmp::Reverse(r.priority()));
    }

    /// Registered document types in scoring order.
    pub fn document_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Rules registered for a type, highest priority first.
    pub fn rules_for(&self, document_type: &str) -> &[Rule] {
        self.rules.get(document_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Score every registered type and pick the best one.
    pub fn detect(&self, text: &str, metadata: Option<&Metadata>) -> DetectionResult {
        let mut best_type = UNKNOWN_TYPE.to_string();
        let mut best_confidence = 0.0;
        let mut per_type_results = IndexMap::new();

        for (document_type, rules) in &self.rules {
            if rules.is_empty() {
                continue;
            }

            let rule_results: Vec<RuleResult> = rules
                .iter()
                .map(|rule| {
                    let confidence = rule.matches(text, metadata);
                    debug!(
                        "Rule '{}' for '{}' returned confidence: {:.2}",
                        rule.name(),
                        document_type,
                        confidence
                    );
                    RuleResult {
                        rule_name: rule.name().to_string(),
                        confidence,
                        priority: rule.priority(),
                    }
                })
                .collect();

            let confidence = weighted_confidence(&rule_results);
            info!("Document type '{}' overall confidence: {:.2}", document_type, confidence);

            if confidence > best_confidence {
                best_type = document_type.clone();
                best_confidence = confidence;
            }

            per_type_results.insert(
                document_type.clone(),
                TypeDetection {
                    confidence,
                    rule_results,
                },
            );
        }

        DetectionResult {
            document_type: best_type,
            confidence: best_confidence,
            per_type_results,
        }
    }
}

/// `Σ(score·(priority+1)) / Σ(priority+1)`.
pub fn weighted_confidence(results: &[RuleResult]) -> f64 {
    let (weighted, total) = results.iter().fold((0.0, 0.0), |(weighted, total), r| {
        let weight = f64::from(r.priority) + 1.0;
        (weighted + r.confidence * weight, total + weight)
    });

    if total > 0.0 { weighted / total } else { 0.0 }
}

fn pattern(name: &str, patterns: &[&str], priority: u32, min_matches: usize) -> RuleDefinition {
    RuleDefinition::Pattern {
        name: name.to_string(),
        patterns: patterns.iter().map(|p| p.to_string()).collect(),
        priority,
        min_matches,
        // Meeting `min_matches` of five patterns is enough to count.
        threshold: min_matches as f64 / patterns.len() as f64,
    }
}

/// The stock rule set as `(document type, definition)` pairs.
pub fn default_rule_definitions() -> Vec<(&'static str, RuleDefinition)> {
    let adobe_metadata = RuleDefinition::Metadata {
        name: "adobe_metadata".to_string(),
        keys: IndexMap::from([
            ("source".to_string(), vec!["adobe".to_string()]),
            ("filename".to_string(), vec!["Adobe_Transaction".to_string()]),
        ]),
        priority: 20,
    };

    vec![
        (
            "adobe_invoice",
            pattern(
                "adobe_text",
                &[
                    r"Adobe Systems Software Ireland",
                    r"Invoice Number\s+\w+",
                    r"Adobe Creative Cloud",
                    r"PRODUCT\s+NUMBER\s+PRODUCT\s+DESCRIPTION",
                    // TOUAL is a common OCR misread
                    r"GRAND TO[TU]AL",
                ],
                10,
                2,
            ),
        ),
        ("adobe_invoice", adobe_metadata),
        (
            "receipt",
            pattern(
                "receipt_text",
                &[
                    r"Receipt\s+#",
                    r"GROCERIES",
                    r"TOTAL:\s*\$?\d+\.\d{2}",
                    r"CASH\s+REGISTER",
                    r"THANK\s+YOU\s+FOR\s+SHOPPING",
                ],
                5,
                2,
            ),
        ),
        (
            "invoice",
            pattern(
                "invoice_text",
                &[
                    r"Invoice\s+#",
                    r"Bill\s+To",
                    r"Payment\s+Terms",
                    r"Due\s+Date",
                    r"Purchase\s+Order",
                ],
                3,
                2,
            ),
        ),
        (
            "credit_note",
            pattern(
                "credit_text",
                &[
                    r"Credit\s+Note",
                    r"Credit\s+#",
                    r"Refund",
                    // parenthesised (negative) amounts
                    r"\(.*?\)",
                    r"-\d+\.\d{2}",
                ],
                8,
                2,
            ),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INVOICE_TEXT: &str = "ACME Ltd\nBill To: Jane Doe\nPayment Terms: Net 30\nTotal 123.00";

    fn default_detector() -> DocumentDetector {
        DocumentDetector::with_default_rules().unwrap()
    }

    #[test]
    fn test_detect_invoice_with_two_hits() {
        let result = default_detector().detect(INVOICE_TEXT, None);

        assert_eq!(result.document_type, "invoice");
        // a single rule: its own score
        assert!((result.confidence - 0.4).abs() < 1e-9);
        assert_eq!(result.per_type_results["receipt"].confidence, 0.0);
    }

    #[test]
    fn test_detect_unknown() {
        let detector = default_detector();

        let result = detector.detect("", None);
        assert_eq!(result.document_type, UNKNOWN_TYPE);
        assert_eq!(result.confidence, 0.0);
        assert!(result.is_unknown());

        let result = DocumentDetector::new().detect("Invoice # 1", None);
        assert!(result.is_unknown());
        assert!(result.per_type_results.is_empty());
    }

    #[test]
    fn test_detect_is_idempotent() {
        let detector = default_detector();
        let mut metadata = Metadata::new();
        metadata.insert("filename".into(), "scan.pdf".into());

        let first = detector.detect(INVOICE_TEXT, Some(&metadata));
        let second = detector.detect(INVOICE_TEXT, Some(&metadata));
        assert_eq!(first, second);
    }

    #[test]
    fn test_confidence_in_unit_range() {
        let detector = default_detector();
        let texts = [
            "",
            "GRAND TOTAL Adobe Creative Cloud Adobe Systems Software Ireland",
            "Credit Note (refund) -10.00 Credit #7",
            "\u{0}\u{fffd} random bytes",
        ];
        for text in texts {
            let result = detector.detect(text, None);
            assert!((0.0..=1.0).contains(&result.confidence), "{}", text);
        }
    }

    #[test]
    fn test_priority_weighting() {
        let results = vec![
            RuleResult {
                rule_name: "a".into(),
                confidence: 1.0,
                priority: 20,
            },
            RuleResult {
                rule_name: "b".into(),
                confidence: 0.0,
                priority: 10,
            },
        ];
        assert!((weighted_confidence(&results) - 21.0 / 32.0).abs() < 1e-12);

        let zero_priority = vec![RuleResult {
            rule_name: "z".into(),
            confidence: 0.5,
            priority: 0,
        }];
        assert_eq!(weighted_confidence(&zero_priority), 0.5);
    }

    #[test]
    fn test_adobe_metadata_outweighs_text() {
        let detector = default_detector();
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "adobe".into());
        metadata.insert("filename".into(), "Adobe_Transaction_1.pdf".into());

        let result = detector.detect("", Some(&metadata));
        assert_eq!(result.document_type, "adobe_invoice");
        assert!((result.confidence - 21.0 / 32.0).abs() < 1e-9);

        let names: Vec<&str> = result.per_type_results["adobe_invoice"]
            .rule_results
            .iter()
            .map(|r| r.rule_name.as_str())
            .collect();
        assert_eq!(names, vec!["adobe_metadata", "adobe_text"]);
    }

    #[test]
    fn test_first_registered_type_wins_ties() {
        let mut detector = DocumentDetector::new();
        detector.add_rule("first", PatternRule::new("a", &["shared"], 0, 1, 0.5).unwrap());
        detector.add_rule("second", PatternRule::new("b", &["shared"], 0, 1, 0.5).unwrap());

        assert_eq!(detector.detect("shared", None).document_type, "first");
    }

    #[test]
    fn test_rules_sorted_stably_by_priority() {
        let mut detector = DocumentDetector::new();
        detector.add_rule("t", PatternRule::new("low", &["x"], 1, 1, 0.5).unwrap());
        detector.add_rule("t", PatternRule::new("high", &["x"], 5, 1, 0.5).unwrap());
        detector.add_rule("t", PatternRule::new("low2", &["x"], 1, 1, 0.5).unwrap());

        let names: Vec<&str> = detector.rules_for("t").iter().map(Rule::name).collect();
        assert_eq!(names, vec!["high", "low", "low2"]);
        assert!(detector.rules_for("missing").is_empty());
    }

    #[test]
    fn test_from_config_appends_custom_rules() {
        let config: DetectionConfig = serde_json::from_str(
            r#"{"use_default_rules": false,
                "rules": {"purchase_order": [{"kind": "pattern", "name": "po", "patterns": ["PO\\s+Number"]}]}}"#,
        )
        .unwrap();

        let detector = DocumentDetector::from_config(&config).unwrap();
        assert_eq!(detector.document_types().collect::<Vec<_>>(), vec!["purchase_order"]);
        assert_eq!(detector.detect("po number 7", None).document_type, "purchase_order");
    }

    #[test]
    fn test_from_config_rejects_bad_pattern() {
        let config: DetectionConfig = serde_json::from_str(
            r#"{"rules": {"x": [{"kind": "pattern", "name": "broken", "patterns": ["[a-"]}]}}"#,
        )
        .unwrap();

        assert!(matches!(
            DocumentDetector::from_config(&config),
            Err(DetectionError::InvalidPattern { .. })
        ));
    }
}
