//! The structured record produced by an extractor.
//!
//! The record is owned by whatever extractor produced it; the core only
//! reads it. Values keep the form the extractor emitted them in (text as
//! read from the document, or a number), because both the source-text
//! comparison and the currency check need the original spelling.

use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::fields::amounts::parse_amount;
use crate::fields::dates::parse_date;

/// A scalar value emitted by an extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Text as it appeared in the document (`"$1,234.56"`, `"2023-10-15"`).
    Text(String),
    /// Number already parsed by the extractor.
    Number(#[serde(with = "rust_decimal::serde::float")] Decimal),
}

impl FieldValue {
    /// Whether the value carries no content.
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.is_empty())
    }

    /// Interpret the value as a monetary amount.
    pub fn to_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(s) => parse_amount(s),
        }
    }

    /// Interpret the value as a date.
    pub fn to_date(&self) -> Option<chrono::NaiveDate> {
        match self {
            FieldValue::Text(s) => parse_date(s),
            FieldValue::Number(_) => None,
        }
    }

    /// The raw text, if the value is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }

    /// Convert a JSON scalar. Objects, arrays, booleans and nulls yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(FieldValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.to_string().parse().ok().map(FieldValue::Number),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Decimal> for FieldValue {
    fn from(n: Decimal) -> Self {
        FieldValue::Number(n)
    }
}

impl From<i32> for FieldValue {
    fn from(n: i32) -> Self {
        FieldValue::Number(Decimal::from(n))
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Number(Decimal::from(n))
    }
}

/// Seller or buyer details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

/// A single line item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<FieldValue>,

    /// Line amount. Also accepted as `amount` on input.
    #[serde(default, alias = "amount", skip_serializing_if = "Option::is_none")]
    pub total: Option<FieldValue>,

    /// Any further per-item fields the extractor emitted.
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl LineItem {
    /// Line item with only its amount set.
    pub fn with_total(total: impl Into<FieldValue>) -> Self {
        Self {
            total: Some(total.into()),
            ..Self::default()
        }
    }

    /// Scalar sub-fields in declaration order, absent fields skipped.
    pub fn scalar_fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = Vec::new();
        push_field(&mut fields, "description", &self.description);
        push_field(&mut fields, "quantity", &self.quantity);
        push_field(&mut fields, "unit_price", &self.unit_price);
        push_field(&mut fields, "total", &self.total);
        push_extra(&mut fields, &self.extra);
        fields
    }
}

/// Document totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_amount: Option<FieldValue>,

    /// Tax rate in percent (`23`, `"23%"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<FieldValue>,

    /// Grand total. Also accepted as `total_amount` on input.
    #[serde(default, alias = "total_amount", skip_serializing_if = "Option::is_none")]
    pub total: Option<FieldValue>,

    /// Declared currency code or symbol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl Totals {
    /// Totals entries in declaration order, absent fields skipped.
    pub fn scalar_fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = Vec::new();
        push_field(&mut fields, "subtotal", &self.subtotal);
        push_field(&mut fields, "tax_amount", &self.tax_amount);
        push_field(&mut fields, "tax_rate", &self.tax_rate);
        push_field(&mut fields, "total", &self.total);
        if let Some(currency) = &self.currency {
            fields.push(("currency".to_string(), FieldValue::Text(currency.clone())));
        }
        push_extra(&mut fields, &self.extra);
        fields
    }
}

/// Structured output of an extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRecord {
    /// Invoice/receipt number. Also accepted as `invoice_number` on input.
    #[serde(default, alias = "invoice_number", skip_serializing_if = "Option::is_none")]
    pub document_number: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<FieldValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<FieldValue>,

    #[serde(default)]
    pub seller: Party,

    #[serde(default)]
    pub buyer: Party,

    #[serde(default)]
    pub items: Vec<LineItem>,

    #[serde(default)]
    pub totals: Totals,

    /// Further top-level fields (`payment_terms`, ...).
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_json::Value>,
}

impl ExtractionRecord {
    /// Top-level scalar fields in declaration order, absent fields skipped.
    pub fn scalar_fields(&self) -> Vec<(String, FieldValue)> {
        let mut fields = Vec::new();
        push_field(&mut fields, "document_number", &self.document_number);
        push_field(&mut fields, "issue_date", &self.issue_date);
        push_field(&mut fields, "due_date", &self.due_date);
        push_extra(&mut fields, &self.extra);
        fields
    }

    /// Whether the extractor produced nothing at all.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

fn push_field(fields: &mut Vec<(String, FieldValue)>, name: &str, value: &Option<FieldValue>) {
    if let Some(value) = value {
        fields.push((name.to_string(), value.clone()));
    }
}

fn push_extra(fields: &mut Vec<(String, FieldValue)>, extra: &IndexMap<String, serde_json::Value>) {
    for (name, value) in extra {
        if let Some(value) = FieldValue::from_json(value) {
            fields.push((name.clone(), value));
        }
    }
}
