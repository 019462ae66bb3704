//! Cross-field consistency checks on an extracted record.
//!
//! Each check returns a [`ConsistencyCheckResult`] whose `details` carry
//! the parsed and derived values, so a failing check can be diagnosed
//! without re-parsing the record.

use std::str::FromStr;

use chrono::Days;
use indexmap::IndexMap;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::fields::currency::{has_currency_marker, normalize_currency};
use crate::models::config::ConsistencyConfig;
use crate::models::record::{ExtractionRecord, FieldValue};

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyCheckResult {
    pub check: String,
    pub valid: bool,
    pub details: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConsistencyCheckResult {
    fn new(check: &str, valid: bool) -> Self {
        Self {
            check: check.to_string(),
            valid,
            details: Map::new(),
            error: None,
        }
    }

    fn detail(&mut self, key: &str, value: impl Into<Value>) {
        self.details.insert(key.to_string(), value.into());
    }

    fn fail(mut self, error: impl Into<String>) -> Self {
        self.valid = false;
        self.error = Some(error.into());
        self
    }
}

/// Outcome of [`ConsistencyChecker::check_all`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub overall_valid: bool,
    pub checks: IndexMap<String, ConsistencyCheckResult>,
}

impl ConsistencyReport {
    /// Errors of the failed checks, in check order.
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.checks.values().filter_map(|c| c.error.as_deref())
    }
}

fn decimal_detail(value: Option<Decimal>) -> Value {
    value.map_or(Value::Null, |d| Value::String(d.to_string()))
}

fn amount(value: &Option<FieldValue>) -> Option<Decimal> {
    value.as_ref().and_then(FieldValue::to_decimal)
}

/// Verifies that totals, line items, dates, currency and tax agree.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    tolerance: Decimal,
    max_due_days: u64,
}

impl ConsistencyChecker {
    /// Create a checker with a relative tolerance (`0.01` = 1%).
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance: Decimal::from_f64(tolerance).unwrap_or_else(|| Decimal::new(1, 2)),
            max_due_days: ConsistencyConfig::default().max_due_days,
        }
    }

    pub fn from_config(config: &ConsistencyConfig) -> Self {
        Self::new(config.tolerance).with_max_due_days(config.max_due_days)
    }

    /// Longest accepted gap between issue and due date.
    pub fn with_max_due_days(mut self, days: u64) -> Self {
        self.max_due_days = days;
        self
    }

    pub fn tolerance(&self) -> Decimal {
        self.tolerance
    }

    /// Whether two values parse to amounts within the relative tolerance.
    pub fn amounts_equal(&self, a: &FieldValue, b: &FieldValue) -> bool {
        match (a.to_decimal(), b.to_decimal()) {
            (Some(a), Some(b)) => self.decimals_equal(a, b),
            _ => false,
        }
    }

    /// `|a-b| / max(|a|,|b|) <= tolerance`; two zeros are equal.
    pub fn decimals_equal(&self, a: Decimal, b: Decimal) -> bool {
        if a.is_zero() && b.is_zero() {
            return true;
        }
        let max_abs = a.abs().max(b.abs());
        a.checked_sub(b)
            .and_then(|diff| diff.abs().checked_div(max_abs))
            .is_some_and(|relative| relative <= self.tolerance)
    }

    /// `total == subtotal + tax`, with a missing tax counted as zero.
    pub fn check_total_consistency(&self, record: &ExtractionRecord) -> ConsistencyCheckResult {
        let mut result = ConsistencyCheckResult::new("total_consistency", false);
        let total = amount(&record.totals.total);
        let subtotal = amount(&record.totals.subtotal);
        let tax = amount(&record.totals.tax_amount);

        result.detail("parsed_total", decimal_detail(total));
        result.detail("parsed_subtotal", decimal_detail(subtotal));
        result.detail("parsed_tax", decimal_detail(tax));

        let (Some(total), Some(subtotal)) = (total, subtotal) else {
            return result.fail("Missing total or subtotal");
        };
        let tax = tax.unwrap_or(Decimal::ZERO);

        let Some(calculated) = subtotal.checked_add(tax) else {
            return result.fail("Arithmetic overflow adding subtotal and tax");
        };
        result.detail("calculated_total", calculated.to_string());

        if self.decimals_equal(total, calculated) {
            result.valid = true;
            result
        } else {
            result.fail(format!(
                "Total amount inconsistency: {} != {} + {}",
                total, subtotal, tax
            ))
        }
    }

    /// Item amounts add up to the subtotal.
    pub fn check_line_items_sum(&self, record: &ExtractionRecord) -> ConsistencyCheckResult {
        let mut result = ConsistencyCheckResult::new("line_items_sum", false);
        let subtotal = amount(&record.totals.subtotal);
        result.detail("parsed_subtotal", decimal_detail(subtotal));

        let Some(subtotal) = subtotal else {
            return result.fail("Missing subtotal");
        };
        if record.items.is_empty() {
            return result.fail("No line items found");
        }

        let amounts: Vec<Decimal> = record
            .items
            .iter()
            .filter_map(|item| amount(&item.total))
            .collect();
        let sum = amounts
            .iter()
            .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(*a));

        result.detail(
            "item_amounts",
            amounts.iter().map(|a| Value::String(a.to_string())).collect::<Vec<_>>(),
        );

        let Some(sum) = sum else {
            return result.fail("Arithmetic overflow summing line items");
        };
        result.detail("calculated_sum", sum.to_string());

        if self.decimals_equal(subtotal, sum) {
            result.valid = true;
            result
        } else {
            result.fail(format!("Line items sum inconsistency: {} != {}", subtotal, sum))
        }
    }

    /// Issue date not after due date, and due date within the payment window.
    pub fn check_date_consistency(&self, record: &ExtractionRecord) -> ConsistencyCheckResult {
        let mut result = ConsistencyCheckResult::new("date_consistency", true);
        let issue = record.issue_date.as_ref().and_then(FieldValue::to_date);
        let due = record.due_date.as_ref().and_then(FieldValue::to_date);

        result.detail("parsed_issue_date", issue.map_or(Value::Null, |d| d.to_string().into()));
        result.detail("parsed_due_date", due.map_or(Value::Null, |d| d.to_string().into()));

        let (Some(issue), Some(due)) = (issue, due) else {
            result.detail("note", "One or both dates missing, skipping check");
            return result;
        };

        if issue > due {
            return result.fail(format!("Issue date ({}) is after due date ({})", issue, due));
        }

        let latest = issue.checked_add_days(Days::new(self.max_due_days));
        if latest.is_some_and(|latest| due > latest) {
            return result.fail(format!(
                "Due date is more than {} days after issue date",
                self.max_due_days
            ));
        }

        result
    }

    /// Every text-valued monetary field carries a marker of the declared
    /// currency.
    pub fn check_currency_consistency(&self, record: &ExtractionRecord) -> ConsistencyCheckResult {
        let mut result = ConsistencyCheckResult::new("currency_consistency", true);

        let declared = record
            .totals
            .currency
            .clone()
            .or_else(|| record.extra.get("currency").and_then(Value::as_str).map(str::to_string))
            .filter(|c| !c.trim().is_empty());
        let Some(declared) = declared else {
            result.detail("note", "No currency specified, skipping check");
            return result;
        };

        let code = normalize_currency(&declared);
        result.detail("currency", code.clone());

        let totals = &record.totals;
        let mut monetary: Vec<(String, &Option<FieldValue>)> = vec![
            ("totals.total".to_string(), &totals.total),
            ("totals.subtotal".to_string(), &totals.subtotal),
            ("totals.tax_amount".to_string(), &totals.tax_amount),
        ];
        monetary.extend(
            record
                .items
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("items[{}].total", i), &item.total)),
        );

        let inconsistent: Vec<String> = monetary
            .into_iter()
            .filter_map(|(path, value)| {
                let text = value.as_ref()?.as_text()?;
                (!has_currency_marker(text, &code)).then_some(path)
            })
            .collect();

        if inconsistent.is_empty() {
            return result;
        }

        let error = format!("Currency inconsistency in fields: {}", inconsistent.join(", "));
        result.detail("inconsistent_fields", inconsistent);
        result.fail(error)
    }

    /// Tax matches `subtotal * rate / 100`, or is at most 30% of the
    /// subtotal when no rate is given.
    pub fn check_tax_calculation(&self, record: &ExtractionRecord) -> ConsistencyCheckResult {
        let mut result = ConsistencyCheckResult::new("tax_calculation", false);
        let subtotal = amount(&record.totals.subtotal);
        let tax = amount(&record.totals.tax_amount);
        let rate = record.totals.tax_rate.as_ref();

        result.detail("parsed_subtotal", decimal_detail(subtotal));
        result.detail("parsed_tax", decimal_detail(tax));
        result.detail("tax_rate", rate.map_or(Value::Null, |r| r.to_string().into()));

        let (Some(subtotal), Some(tax)) = (subtotal, tax) else {
            return result.fail("Missing subtotal or tax amount");
        };

        if let Some(raw_rate) = rate {
            let Some(rate) =
                parse_rate(raw_rate).and_then(|r| r.checked_div(Decimal::ONE_HUNDRED))
            else {
                return result.fail(format!("Could not parse tax rate: {}", raw_rate));
            };
            let Some(calculated) = subtotal.checked_mul(rate) else {
                return result.fail("Arithmetic overflow computing tax");
            };
            result.detail("parsed_rate", rate.to_string());
            result.detail("calculated_tax", calculated.to_string());

            return if self.decimals_equal(tax, calculated) {
                result.valid = true;
                result
            } else {
                result.fail(format!(
                    "Tax calculation inconsistency: {} != {} * {}",
                    tax, subtotal, rate
                ))
            };
        }

        if subtotal <= Decimal::ZERO || tax < Decimal::ZERO {
            result.valid = true;
            return result;
        }

        let Some(percentage) = tax
            .checked_div(subtotal)
            .and_then(|share| share.checked_mul(Decimal::ONE_HUNDRED))
        else {
            return result.fail("Arithmetic overflow computing tax share");
        };
        result.detail("calculated_tax_percentage", percentage.to_string());

        if percentage <= Decimal::from(30) {
            result.valid = true;
            result
        } else {
            result.fail(format!("Tax amount seems too high: {}% of subtotal", percentage))
        }
    }

    /// Run all five checks; the record is consistent when every one passes.
    pub fn check_all(&self, record: &ExtractionRecord) -> ConsistencyReport {
        let results = [
            self.check_total_consistency(record),
            self.check_line_items_sum(record),
            self.check_date_consistency(record),
            self.check_currency_consistency(record),
            self.check_tax_calculation(record),
        ];

        let overall_valid = results.iter().all(|r| r.valid);
        for failed in results.iter().filter(|r| !r.valid) {
            debug!("Consistency check '{}' failed: {:?}", failed.check, failed.error);
        }
        if !overall_valid {
            let failed = results.iter().filter(|r| !r.valid).count();
            warn!(
                "Record failed {} of {} consistency checks",
                failed,
                results.len()
            );
        }

        ConsistencyReport {
            overall_valid,
            checks: results.into_iter().map(|r| (r.check.clone(), r)).collect(),
        }
    }
}

impl Default for ConsistencyChecker {
    fn default() -> Self {
        Self::from_config(&ConsistencyConfig::default())
    }
}

/// A tax rate in percent: `23`, `"23%"`, `" 8.5 % "`.
fn parse_rate(value: &FieldValue) -> Option<Decimal> {
    match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => Decimal::from_str(s.trim().trim_end_matches('%').trim()).ok(),
    }
}
