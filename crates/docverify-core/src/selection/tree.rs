//! The extractor decision tree.
//!
//! Each document type has a root [`DecisionNode`]. A node names an
//! extractor and its parameters, and may branch on a boolean feature or on
//! the document's primary language. Navigation visits boolean branches
//! before language branches and descends into every branch whose value has
//! a child, so a later match overrides the extractor key chosen by an
//! earlier one while parameters accumulate.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classify::{FeatureFlag, Features};
use crate::error::SelectionError;

/// Extractor parameters.
pub type Params = serde_json::Map<String, Value>;

/// Key of the generic extractor.
pub const DEFAULT_EXTRACTOR: &str = "default";

/// Path segment that addresses a language branch.
pub const LANGUAGE_SEGMENT: &str = "language";

fn default_extractor_key() -> String {
    DEFAULT_EXTRACTOR.to_string()
}

/// A node of the decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionNode {
    #[serde(default = "default_extractor_key")]
    pub extractor_key: String,

    /// Minimum classification confidence for this node to apply. Only
    /// honoured on root nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<Branch>,
}

/// A branch below a [`DecisionNode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "on", rename_all = "snake_case")]
pub enum Branch {
    /// Branch on a boolean feature.
    Feature {
        feature: FeatureFlag,
        #[serde(rename = "true", default, skip_serializing_if = "Option::is_none")]
        when_true: Option<Box<DecisionNode>>,
        #[serde(rename = "false", default, skip_serializing_if = "Option::is_none")]
        when_false: Option<Box<DecisionNode>>,
    },
    /// Branch on the primary language.
    Language { cases: IndexMap<String, DecisionNode> },
}

impl Branch {
    fn is_boolean(&self) -> bool {
        matches!(self, Branch::Feature { .. })
    }

    /// Child selected by `features`, with a label for the decision path.
    fn child<'a>(&'a self, features: &Features) -> Option<(String, &'a DecisionNode)> {
        match self {
            Branch::Feature {
                feature,
                when_true,
                when_false,
            } => {
                let value = features.flag(*feature);
                let child = if value { when_true } else { when_false };
                child
                    .as_deref()
                    .map(|node| (format!("{}={}", feature.name(), value), node))
            }
            Branch::Language { cases } => {
                let language = features.primary_language();
                cases
                    .get(language)
                    .map(|node| (format!("{}={}", LANGUAGE_SEGMENT, language), node))
            }
        }
    }
}

/// Where navigation ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub extractor_key: String,
    pub params: Params,
    /// Branch labels taken, outermost first.
    pub path: Vec<String>,
}

impl DecisionNode {
    /// Node with no parameters or branches.
    pub fn new(extractor_key: impl Into<String>) -> Self {
        Self {
            extractor_key: extractor_key.into(),
            confidence_threshold: None,
            params: Params::new(),
            branches: Vec::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = Some(threshold);
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_branch(mut self, branch: Branch) -> Self {
        self.branches.push(branch);
        self
    }

    /// Navigate from this node.
    pub fn resolve(&self, features: &Features) -> Resolution {
        let mut resolution = Resolution {
            extractor_key: self.extractor_key.clone(),
            params: Params::new(),
            path: Vec::new(),
        };
        self.walk(features, &mut resolution);
        resolution
    }

    fn walk(&self, features: &Features, resolution: &mut Resolution) {
        resolution.extractor_key = self.extractor_key.clone();
        for (key, value) in &self.params {
            resolution.params.insert(key.clone(), value.clone());
        }

        let boolean = self.branches.iter().filter(|b| b.is_boolean());
        let categorical = self.branches.iter().filter(|b| !b.is_boolean());
        for branch in boolean.chain(categorical) {
            if let Some((label, child)) = branch.child(features) {
                resolution.path.push(label);
                child.walk(features, resolution);
            }
        }
    }

    /// Replace (or create) the node reached by `segments`, given as
    /// `feature, value` pairs below this node.
    pub(crate) fn replace_at(
        &mut self,
        segments: &[&str],
        node: DecisionNode,
    ) -> Result<(), SelectionError> {
        let [feature, value, rest @ ..] = segments else {
            return match segments {
                [] => {
                    *self = node;
                    Ok(())
                }
                _ => Err(SelectionError::InvalidPath(segments.join("/"))),
            };
        };

        let child = if *feature == LANGUAGE_SEGMENT {
            self.language_child(value)
        } else {
            let flag = FeatureFlag::from_name(feature)
                .ok_or_else(|| SelectionError::UnknownFeature(feature.to_string()))?;
            let value = match *value {
                "true" => true,
                "false" => false,
                other => {
                    return Err(SelectionError::InvalidValue {
                        feature: feature.to_string(),
                        value: other.to_string(),
                    });
                }
            };
            self.feature_child(flag, value)
        };

        child.replace_at(rest, node)
    }

    fn feature_child(&mut self, flag: FeatureFlag, value: bool) -> &mut DecisionNode {
        let index = match self
            .branches
            .iter()
            .position(|b| matches!(b, Branch::Feature { feature, .. } if *feature == flag))
        {
            Some(index) => index,
            None => {
                self.branches.push(Branch::Feature {
                    feature: flag,
                    when_true: None,
                    when_false: None,
                });
                self.branches.len() - 1
            }
        };

        match &mut self.branches[index] {
            Branch::Feature {
                when_true,
                when_false,
                ..
            } => {
                let slot = if value { when_true } else { when_false };
                &mut **slot.get_or_insert_with(|| Box::new(DecisionNode::new(DEFAULT_EXTRACTOR)))
            }
            Branch::Language { .. } => unreachable!("position() matched a feature branch"),
        }
    }

    fn language_child(&mut self, language: &str) -> &mut DecisionNode {
        let index = match self
            .branches
            .iter()
            .position(|b| matches!(b, Branch::Language { .. }))
        {
            Some(index) => index,
            None => {
                self.branches.push(Branch::Language {
                    cases: IndexMap::new(),
                });
                self.branches.len() - 1
            }
        };

        match &mut self.branches[index] {
            Branch::Language { cases } => cases
                .entry(language.to_string())
                .or_insert_with(|| DecisionNode::new(DEFAULT_EXTRACTOR)),
            Branch::Feature { .. } => unreachable!("position() matched a language branch"),
        }
    }
}

/// The stock decision tree.
pub fn default_tree() -> IndexMap<String, DecisionNode> {
    let languages = ["en", "pl", "de", "fr", "es"]
        .into_iter()
        .map(|lang| (lang.to_string(), DecisionNode::new(DEFAULT_EXTRACTOR)))
        .collect();

    let invoice = DecisionNode::new(DEFAULT_EXTRACTOR)
        .with_branch(Branch::Feature {
            feature: FeatureFlag::HasTableStructure,
            when_true: Some(Box::new(
                DecisionNode::new(DEFAULT_EXTRACTOR).with_param("table_mode", true),
            )),
            when_false: Some(Box::new(DecisionNode::new(DEFAULT_EXTRACTOR))),
        })
        .with_branch(Branch::Language { cases: languages });

    IndexMap::from([
        ("adobe_invoice".to_string(), DecisionNode::new("adobe").with_threshold(0.7)),
        ("adobe_json".to_string(), DecisionNode::new("adobe").with_threshold(0.7)),
        ("credit_note".to_string(), DecisionNode::new("adobe")),
        ("invoice".to_string(), invoice),
        (
            "receipt".to_string(),
            DecisionNode::new(DEFAULT_EXTRACTOR).with_param("receipt_mode", true),
        ),
        (
            "order".to_string(),
            DecisionNode::new(DEFAULT_EXTRACTOR).with_param("order_mode", true),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn features(tables: bool, language: &str) -> Features {
        Features {
            has_table_structure: tables,
            language_scores: [(language.to_string(), 3)].into_iter().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_invoice_with_tables() {
        let tree = default_tree();
        let resolution = tree["invoice"].resolve(&features(true, "pl"));

        assert_eq!(resolution.extractor_key, "default");
        assert_eq!(resolution.params.get("table_mode"), Some(&json!(true)));
        assert_eq!(resolution.path, vec!["has_table_structure=true", "language=pl"]);
    }

    #[test]
    fn test_later_match_overrides_key_and_params_accumulate() {
        let node = DecisionNode::new("base")
            .with_param("a", 1)
            .with_branch(Branch::Language {
                cases: IndexMap::from([(
                    "de".to_string(),
                    DecisionNode::new("german").with_param("a", 2).with_param("c", 3),
                )]),
            })
            .with_branch(Branch::Feature {
                feature: FeatureFlag::HasTableStructure,
                when_true: Some(Box::new(DecisionNode::new("tables").with_param("b", true))),
                when_false: None,
            });

        // boolean branch first, then the language one
        let resolution = node.resolve(&features(true, "de"));
        assert_eq!(resolution.extractor_key, "german");
        assert_eq!(
            Value::Object(resolution.params),
            json!({"a": 2, "b": true, "c": 3})
        );

        let resolution = node.resolve(&features(false, "en"));
        assert_eq!(resolution.extractor_key, "base");
        assert!(resolution.path.is_empty());
    }

    #[test]
    fn test_replace_at_creates_intermediate_nodes() {
        let mut node = DecisionNode::new("default");
        node.replace_at(
            &["has_line_items", "true", "language", "fr"],
            DecisionNode::new("french_items"),
        )
        .unwrap();

        let features = Features {
            has_line_items: true,
            language_scores: [("fr".to_string(), 2)].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(node.resolve(&features).extractor_key, "french_items");
    }

    #[test]
    fn test_replace_at_rejects_bad_paths() {
        let mut node = DecisionNode::new("default");
        assert!(matches!(
            node.replace_at(&["has_tables"], DecisionNode::new("x")),
            Err(SelectionError::InvalidPath(_))
        ));
        assert!(matches!(
            node.replace_at(&["colour", "red"], DecisionNode::new("x")),
            Err(SelectionError::UnknownFeature(_))
        ));
        assert!(matches!(
            node.replace_at(&["has_tables", "maybe"], DecisionNode::new("x")),
            Err(SelectionError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_tree_json_shape() {
        let json = json!({
            "extractor_key": "default",
            "branches": [
                {"on": "feature", "feature": "has_tables", "true": {"params": {"table_mode": true}}},
                {"on": "language", "cases": {"pl": {"extractor_key": "polish"}}}
            ]
        });
        let node: DecisionNode = serde_json::from_value(json).unwrap();

        let resolution = node.resolve(&features(true, "pl"));
        assert_eq!(resolution.extractor_key, "polish");
        assert_eq!(resolution.params.get("table_mode"), Some(&json!(true)));
    }
}
