//! Extractor selection over the decision tree.

pub mod tree;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classify::Features;
use crate::error::{ExtractionError, SelectionError};
use crate::extractor::{Extractor, ExtractorFactory, PatternExtractor};
use crate::models::config::SelectionConfig;

pub use tree::{default_tree, Branch, DecisionNode, Params, Resolution, DEFAULT_EXTRACTOR};

/// Field name to regex with one capture group.
pub type FieldRules = IndexMap<String, String>;

/// What the selector needs to know about a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub document_type: String,
    pub confidence: f64,
    pub features: Features,
}

/// Caller-supplied settings that win over the tree and the stock rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionOverrides {
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub rules: FieldRules,
}

/// The chosen extractor and its configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorSelection {
    pub document_type: String,
    pub extractor_key: String,
    pub params: Params,
    pub rules: FieldRules,
    /// Branches taken through the tree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decision_path: Vec<String>,
}

/// Maps a classification onto an extractor configuration.
#[derive(Clone)]
pub struct ExtractorSelector {
    tree: IndexMap<String, DecisionNode>,
    extractors: IndexMap<String, ExtractorFactory>,
    rules: IndexMap<String, FieldRules>,
    default_key: String,
}

impl ExtractorSelector {
    /// Selector with the stock tree, the stock field rules and the pattern
    /// extractor registered as `default`.
    pub fn new() -> Self {
        let mut selector = Self::with_tree(default_tree());
        selector.rules = default_field_rules();
        selector.register_extractor(DEFAULT_EXTRACTOR, |selection: &ExtractorSelection| {
            Ok(Box::new(PatternExtractor::from_selection(selection)?) as Box<dyn Extractor>)
        });
        selector
    }

    /// Selector over `tree` with no rules or extractors.
    pub fn with_tree(tree: IndexMap<String, DecisionNode>) -> Self {
        Self {
            tree,
            extractors: IndexMap::new(),
            rules: IndexMap::new(),
            default_key: DEFAULT_EXTRACTOR.to_string(),
        }
    }

    /// Build from configuration. Configured roots replace stock ones and
    /// configured field rules replace a type's stock rules.
    pub fn from_config(config: &SelectionConfig) -> Result<Self, SelectionError> {
        let mut selector = Self::new();
        if !config.use_default_tree {
            selector.tree.clear();
        }
        selector.default_key = config.default_extractor.clone();

        for (document_type, node) in &config.tree {
            selector.update_decision_tree(&[document_type.as_str()], node.clone())?;
        }
        for (document_type, rules) in &config.rules {
            selector.register_rules(document_type.clone(), rules.clone())?;
        }

        Ok(selector)
    }

    /// Key used when the tree has no answer.
    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Root nodes by document type.
    pub fn tree(&self) -> &IndexMap<String, DecisionNode> {
        &self.tree
    }

    /// Stock field rules for a type.
    pub fn rules_for(&self, document_type: &str) -> Option<&FieldRules> {
        self.rules.get(document_type)
    }

    /// Pick an extractor for a classified document.
    pub fn select(
        &self,
        classification: &Classification,
        overrides: Option<&SelectionOverrides>,
    ) -> ExtractorSelection {
        let document_type = classification.document_type.as_str();
        info!("Selecting extractor for document type: {}", document_type);

        let resolution = match self.tree.get(document_type) {
            None => {
                debug!("No decision tree root for '{}', using default extractor", document_type);
                self.default_resolution()
            }
            Some(root)
                if root
                    .confidence_threshold
                    .is_some_and(|t| classification.confidence < t) =>
            {
                info!(
                    "Confidence {:.2} below threshold for '{}', using default extractor",
                    classification.confidence, document_type
                );
                self.default_resolution()
            }
            Some(root) => root.resolve(&classification.features),
        };

        let mut params = resolution.params;
        let mut rules = self.rules.get(document_type).cloned().unwrap_or_default();
        if let Some(overrides) = overrides {
            for (key, value) in &overrides.params {
                params.insert(key.clone(), value.clone());
            }
            for (field, pattern) in &overrides.rules {
                rules.insert(field.clone(), pattern.clone());
            }
        }

        info!(
            "Selected extractor '{}' with {} rules",
            resolution.extractor_key,
            rules.len()
        );

        ExtractorSelection {
            document_type: document_type.to_string(),
            extractor_key: resolution.extractor_key,
            params,
            rules,
            decision_path: resolution.path,
        }
    }

    fn default_resolution(&self) -> Resolution {
        Resolution {
            extractor_key: self.default_key.clone(),
            params: Params::new(),
            path: Vec::new(),
        }
    }

    /// Register (or replace) an extractor factory.
    pub fn register_extractor<F>(&mut self, key: impl Into<String>, factory: F)
    where
        F: Fn(&ExtractorSelection) -> Result<Box<dyn Extractor>, ExtractionError>
            + Send
            + Sync
            + 'static,
    {
        let key = key.into();
        info!("Registered extractor: {}", key);
        self.extractors.insert(key, Arc::new(factory));
    }

    /// Keys of registered extractors.
    pub fn extractor_keys(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }

    /// Replace the node at `path`: a document type followed by
    /// `feature, value` pairs (`["invoice", "language", "pl"]`).
    pub fn update_decision_tree(
        &mut self,
        path: &[&str],
        node: DecisionNode,
    ) -> Result<(), SelectionError> {
        let Some((root, rest)) = path.split_first() else {
            return Err(SelectionError::InvalidPath(String::new()));
        };

        let root_node = self
            .tree
            .entry(root.to_string())
            .or_insert_with(|| DecisionNode::new(DEFAULT_EXTRACTOR));
        root_node.replace_at(rest, node).map_err(|e| match e {
            SelectionError::InvalidPath(_) => SelectionError::InvalidPath(path.join("/")),
            other => other,
        })?;

        info!("Updated decision tree node at path: {}", path.join("/"));
        Ok(())
    }

    /// Replace the stock field rules of a type. Patterns must compile.
    pub fn register_rules(
        &mut self,
        document_type: impl Into<String>,
        rules: FieldRules,
    ) -> Result<(), SelectionError> {
        for (field, pattern) in &rules {
            Regex::new(pattern).map_err(|source| SelectionError::InvalidFieldRule {
                field: field.clone(),
                source,
            })?;
        }

        let document_type = document_type.into();
        info!("Registered {} field rules for '{}'", rules.len(), document_type);
        self.rules.insert(document_type, rules);
        Ok(())
    }

    /// Instantiate the extractor for a selection, falling back to the
    /// default factory for unknown keys.
    pub fn create_extractor(
        &self,
        selection: &ExtractorSelection,
    ) -> Result<Box<dyn Extractor>, ExtractionError> {
        let factory = match self.extractors.get(&selection.extractor_key) {
            Some(factory) => factory,
            None => {
                warn!(
                    "No extractor registered for '{}', falling back to '{}'",
                    selection.extractor_key, self.default_key
                );
                self.extractors
                    .get(&self.default_key)
                    .ok_or_else(|| {
                        ExtractionError::UnknownExtractor(selection.extractor_key.clone())
                    })?
            }
        };

        (**factory)(selection)
    }
}

impl Default for ExtractorSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExtractorSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorSelector")
            .field("tree", &self.tree)
            .field("extractors", &self.extractors.keys().collect::<Vec<_>>())
            .field("rules", &self.rules)
            .field("default_key", &self.default_key)
            .finish()
    }
}

/// Stock field rules for receipts and invoices.
pub fn default_field_rules() -> IndexMap<String, FieldRules> {
    let to_rules = |pairs: &[(&str, &str)]| -> FieldRules {
        pairs
            .iter()
            .map(|(field, pattern)| (field.to_string(), pattern.to_string()))
            .collect()
    };

    IndexMap::from([
        (
            "receipt".to_string(),
            to_rules(&[
                ("invoice_number", r"Receipt\s+#?([0-9]{4}-[0-9]{4})"),
                ("issue_date", r"Date:\s*(\d{1,2}/\d{1,2}/\d{2,4})"),
                ("total_amount", r"TOTAL:\s*\$?(\d+\.\d{2})"),
                ("tax_amount", r"TAX:\s*\$?(\d+\.\d{2})"),
            ]),
        ),
        (
            "invoice".to_string(),
            to_rules(&[
                ("invoice_number", r"Invoice\s+#?([A-Za-z0-9\-]+)"),
                ("issue_date", r"Date:\s*(\d{1,2}/\d{1,2}/\d{2,4})"),
                ("due_date", r"Due\s+Date:\s*(\d{1,2}/\d{1,2}/\d{2,4})"),
                ("total_amount", r"Total:\s*\$?(\d+\.\d{2})"),
                ("tax_amount", r"Tax:\s*\$?(\d+\.\d{2})"),
            ]),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::ExtractionRecord;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn classification(document_type: &str, confidence: f64) -> Classification {
        Classification {
            document_type: document_type.to_string(),
            confidence,
            features: Features {
                language_scores: [("en".to_string(), 2)].into_iter().collect(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_missing_root_uses_default() {
        let selector = ExtractorSelector::new();
        let selection = selector.select(&classification("unknown", 0.0), None);

        assert_eq!(selection.extractor_key, "default");
        assert!(selection.params.is_empty());
        assert!(selection.rules.is_empty());
    }

    #[test]
    fn test_confidence_gate() {
        let selector = ExtractorSelector::new();

        let low = selector.select(&classification("adobe_json", 0.5), None);
        assert_eq!(low.extractor_key, "default");

        let high = selector.select(&classification("adobe_json", 0.95), None);
        assert_eq!(high.extractor_key, "adobe");
    }

    #[test]
    fn test_invoice_selection_carries_rules() {
        let selector = ExtractorSelector::new();
        let selection = selector.select(&classification("invoice", 0.4), None);

        assert_eq!(selection.extractor_key, "default");
        assert_eq!(selection.params.get("table_mode"), None);
        assert!(selection.rules.contains_key("due_date"));
        assert_eq!(
            selection.decision_path,
            vec!["has_table_structure=false", "language=en"]
        );
    }

    #[test]
    fn test_overrides_win() {
        let selector = ExtractorSelector::new();
        let overrides = SelectionOverrides {
            params: json!({"receipt_mode": false, "strict": true})
                .as_object()
                .cloned()
                .unwrap(),
            rules: [("total_amount".to_string(), r"SUM\s+(\d+)".to_string())]
                .into_iter()
                .collect(),
        };

        let selection = selector.select(&classification("receipt", 0.9), Some(&overrides));
        assert_eq!(selection.params.get("receipt_mode"), Some(&json!(false)));
        assert_eq!(selection.params.get("strict"), Some(&json!(true)));
        assert_eq!(selection.rules["total_amount"], r"SUM\s+(\d+)");
        assert_eq!(selection.rules.len(), 4);
    }

    #[test]
    fn test_select_is_pure() {
        let selector = ExtractorSelector::new();
        let input = classification("invoice", 0.8);
        assert_eq!(selector.select(&input, None), selector.select(&input, None));
    }

    #[test]
    fn test_update_decision_tree() {
        let mut selector = ExtractorSelector::new();
        selector
            .update_decision_tree(&["invoice", "language", "en"], DecisionNode::new("english"))
            .unwrap();
        selector
            .update_decision_tree(&["purchase_order"], DecisionNode::new("po"))
            .unwrap();

        assert_eq!(
            selector.select(&classification("invoice", 0.8), None).extractor_key,
            "english"
        );
        assert_eq!(
            selector.select(&classification("purchase_order", 0.8), None).extractor_key,
            "po"
        );

        assert!(matches!(
            selector.update_decision_tree(&[], DecisionNode::new("x")),
            Err(SelectionError::InvalidPath(_))
        ));
        assert!(matches!(
            selector.update_decision_tree(&["invoice", "language"], DecisionNode::new("x")),
            Err(SelectionError::InvalidPath(p)) if p == "invoice/language"
        ));
    }

    #[test]
    fn test_register_rules_validates_patterns() {
        let mut selector = ExtractorSelector::new();
        let bad: FieldRules = [("total".to_string(), "(".to_string())].into_iter().collect();
        assert!(matches!(
            selector.register_rules("invoice", bad),
            Err(SelectionError::InvalidFieldRule { .. })
        ));

        let good: FieldRules = [("total".to_string(), r"Sum (\d+)".to_string())]
            .into_iter()
            .collect();
        selector.register_rules("invoice", good).unwrap();
        assert_eq!(selector.rules_for("invoice").map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_create_extractor_falls_back_to_default() {
        let selector = ExtractorSelector::new();
        let selection = selector.select(&classification("credit_note", 0.9), None);
        assert_eq!(selection.extractor_key, "adobe");

        let extractor = selector.create_extractor(&selection).unwrap();
        assert_eq!(extractor.name(), "pattern");
    }

    #[test]
    fn test_create_extractor_without_default() {
        let selector = ExtractorSelector::with_tree(IndexMap::new());
        let selection = selector.select(&classification("invoice", 0.9), None);
        assert!(matches!(
            selector.create_extractor(&selection),
            Err(ExtractionError::UnknownExtractor(_))
        ));
    }

    #[test]
    fn test_register_custom_extractor() {
        struct Echo;
        impl Extractor for Echo {
            fn name(&self) -> &str {
                "echo"
            }
            fn extract(&self, text: &str) -> crate::extractor::Result<ExtractionRecord> {
                Ok(ExtractionRecord {
                    document_number: Some(text.into()),
                    ..Default::default()
                })
            }
        }

        let mut selector = ExtractorSelector::new();
        selector.register_extractor("adobe", |_: &ExtractorSelection| {
            Ok(Box::new(Echo) as Box<dyn Extractor>)
        });

        let selection = selector.select(&classification("credit_note", 0.9), None);
        let extractor = selector.create_extractor(&selection).unwrap();
        assert_eq!(extractor.name(), "echo");
        assert_eq!(selector.extractor_keys().collect::<Vec<_>>(), vec!["default", "adobe"]);
    }
}
