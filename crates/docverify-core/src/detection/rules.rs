//! Scoring rules that vote for a document type.

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::DetectionError;
use crate::models::Metadata;

/// Rule that counts how many of its patterns occur in the text.
#[derive(Debug, Clone)]
pub struct PatternRule {
    name: String,
    priority: u32,
    patterns: Vec<Regex>,
    min_matches: usize,
    threshold: f64,
}

impl PatternRule {
    /// Compile a pattern rule. Patterns are case-insensitive and `.` also
    /// matches newlines.
    pub fn new<S: AsRef<str>>(
        name: impl Into<String>,
        patterns: &[S],
        priority: u32,
        min_matches: usize,
        threshold: f64,
    ) -> Result<Self, DetectionError> {
        let name = name.into();

        if !(0.0..=1.0).contains(&threshold) {
            return Err(DetectionError::InvalidRule {
                rule: name,
                reason: format!("threshold {} is outside [0, 1]", threshold),
            });
        }

        let patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .dot_matches_new_line(true)
                    .build()
                    .map_err(|source| DetectionError::InvalidPattern {
                        rule: name.clone(),
                        pattern: p.as_ref().to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            priority,
            patterns,
            min_matches,
            threshold,
        })
    }

    /// Fraction of patterns found, gated by `min_matches` and `threshold`.
    pub fn matches(&self, text: &str) -> f64 {
        if text.is_empty() || self.patterns.is_empty() {
            return 0.0;
        }

        let hits = self.patterns.iter().filter(|p| p.is_match(text)).count();
        if hits < self.min_matches {
            return 0.0;
        }

        let confidence = (hits as f64 / self.patterns.len() as f64).min(1.0);
        if confidence >= self.threshold {
            confidence
        } else {
            0.0
        }
    }
}

/// Rule that compares metadata values with accepted substrings.
#[derive(Debug, Clone)]
pub struct MetadataRule {
    name: String,
    priority: u32,
    keys: IndexMap<String, Vec<String>>,
}

impl MetadataRule {
    pub fn new(
        name: impl Into<String>,
        keys: IndexMap<String, Vec<String>>,
        priority: u32,
    ) -> Self {
        let keys = keys
            .into_iter()
            .map(|(k, values)| (k, values.into_iter().map(|v| v.to_lowercase()).collect()))
            .collect();
        Self {
            name: name.into(),
            priority,
            keys,
        }
    }

    /// Fraction of configured keys whose value contains an accepted substring.
    pub fn matches(&self, metadata: Option<&Metadata>) -> f64 {
        let Some(metadata) = metadata.filter(|m| !m.is_empty()) else {
            return 0.0;
        };
        if self.keys.is_empty() {
            return 0.0;
        }

        let matched = self
            .keys
            .iter()
            .filter(|(key, accepted)| {
                metadata.get(key.as_str()).is_some_and(|value| {
                    let value = value.to_lowercase();
                    accepted.iter().any(|a| value.contains(a.as_str()))
                })
            })
            .count();

        matched as f64 / self.keys.len() as f64
    }
}

/// A detection rule.
#[derive(Debug, Clone)]
pub enum Rule {
    Pattern(PatternRule),
    Metadata(MetadataRule),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Pattern(r) => &r.name,
            Rule::Metadata(r) => &r.name,
        }
    }

    pub fn priority(&self) -> u32 {
        match self {
            Rule::Pattern(r) => r.priority,
            Rule::Metadata(r) => r.priority,
        }
    }

    /// Score in `[0, 1]`. Never fails.
    pub fn matches(&self, text: &str, metadata: Option<&Metadata>) -> f64 {
        match self {
            Rule::Pattern(r) => r.matches(text),
            Rule::Metadata(r) => r.matches(metadata),
        }
    }
}

impl From<PatternRule> for Rule {
    fn from(rule: PatternRule) -> Self {
        Rule::Pattern(rule)
    }
}

impl From<MetadataRule> for Rule {
    fn from(rule: MetadataRule) -> Self {
        Rule::Metadata(rule)
    }
}

fn default_min_matches() -> usize {
    1
}

fn default_threshold() -> f64 {
    0.5
}

/// Serialisable rule definition, as found in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleDefinition {
    Pattern {
        name: String,
        patterns: Vec<String>,
        #[serde(default)]
        priority: u32,
        #[serde(default = "default_min_matches")]
        min_matches: usize,
        #[serde(default = "default_threshold")]
        threshold: f64,
    },
    Metadata {
        name: String,
        keys: IndexMap<String, Vec<String>>,
        #[serde(default)]
        priority: u32,
    },
}

impl RuleDefinition {
    /// Compile the definition into a rule.
    pub fn build(&self) -> Result<Rule, DetectionError> {
        match self {
            RuleDefinition::Pattern {
                name,
                patterns,
                priority,
                min_matches,
                threshold,
            } => Ok(PatternRule::new(
                name.as_str(),
                patterns.as_slice(),
                *priority,
                *min_matches,
                *threshold,
            )?
            .into()),
            RuleDefinition::Metadata {
                name,
                keys,
                priority,
            } => Ok(MetadataRule::new(name.as_str(), keys.clone(), *priority).into()),
        }
    }
}
