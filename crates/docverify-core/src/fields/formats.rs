//! Format rules for individual extracted values.
//!
//! These checks look at a value in isolation (is it a plausible percentage,
//! date, tax id, ...) and complement the source-text comparison done by
//! [`crate::validation::FieldValidator`].

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use super::dates::parse_date;
use super::patterns::{EMAIL, PHONE, PHONE_SEPARATORS};
use crate::models::record::FieldValue;

/// A named format check.
pub type FormatRule = Arc<dyn Fn(&FieldValue) -> bool + Send + Sync>;

/// Percentage between 0 and 100, with or without a trailing `%`.
pub fn validate_percentage(value: &FieldValue) -> bool {
    let rate = match value {
        FieldValue::Number(n) => Some(*n),
        FieldValue::Text(s) => s.replace('%', "").trim().parse::<Decimal>().ok(),
    };
    rate.is_some_and(|r| r >= Decimal::ZERO && r <= Decimal::ONE_HUNDRED)
}

/// Monetary amount with at most four fractional digits.
pub fn validate_currency_amount(value: &FieldValue) -> bool {
    value.to_decimal().is_some_and(|d| d.scale() <= 4)
}

/// Date in one of the accepted layouts.
pub fn validate_date(value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(s) => parse_date(s).is_some(),
        FieldValue::Number(_) => false,
    }
}

/// Tax identifier, optionally checked against a country's layout.
pub fn validate_tax_id(value: &str, country_code: Option<&str>) -> bool {
    let cleaned: String = value
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        .collect();

    let digits_only =
        |len: usize| cleaned.len() == len && cleaned.chars().all(|c| c.is_ascii_digit());

    match country_code.map(str::to_uppercase).as_deref() {
        Some("PL") => digits_only(10),
        Some("DE") => digits_only(11),
        Some("FR") => digits_only(14),
        _ => cleaned.len() >= 5,
    }
}

/// Phone number in international or local layout.
pub fn validate_phone_number(value: &str) -> bool {
    PHONE.is_match(&PHONE_SEPARATORS.replace_all(value, ""))
}

/// E-mail address.
pub fn validate_email(value: &str) -> bool {
    EMAIL.is_match(value)
}

fn text_rule(check: fn(&str) -> bool) -> FormatRule {
    Arc::new(move |value: &FieldValue| match value {
        FieldValue::Text(s) => check(s),
        FieldValue::Number(_) => false,
    })
}

fn tax_id_rule(country: Option<&'static str>) -> FormatRule {
    Arc::new(move |value: &FieldValue| match value {
        FieldValue::Text(s) => validate_tax_id(s, country),
        FieldValue::Number(n) => validate_tax_id(&n.to_string(), country),
    })
}

/// Result of a single format check.
#[derive(Debug, Clone, Serialize)]
pub struct FormatCheck {
    pub field: String,
    pub value: FieldValue,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Format checks over a set of fields.
#[derive(Debug, Clone, Serialize)]
pub struct FormatReport {
    pub valid: bool,
    pub fields: IndexMap<String, FormatCheck>,
}

/// Registry of named format rules.
#[derive(Clone)]
pub struct FormatValidator {
    rules: IndexMap<String, FormatRule>,
}

impl FormatValidator {
    /// Create a validator with the built-in rules registered.
    pub fn new() -> Self {
        let mut rules: IndexMap<String, FormatRule> = IndexMap::new();
        rules.insert("percentage".into(), Arc::new(validate_percentage));
        rules.insert("currency".into(), Arc::new(validate_currency_amount));
        rules.insert("date".into(), Arc::new(validate_date));
        rules.insert("tax_id".into(), tax_id_rule(None));
        rules.insert("tax_id_pl".into(), tax_id_rule(Some("PL")));
        rules.insert("tax_id_de".into(), tax_id_rule(Some("DE")));
        rules.insert("tax_id_fr".into(), tax_id_rule(Some("FR")));
        rules.insert("phone".into(), text_rule(validate_phone_number));
        rules.insert("email".into(), text_rule(validate_email));
        Self { rules }
    }

    /// Register or replace a format rule.
    pub fn register_custom_validator<F>(&mut self, field_type: impl Into<String>, rule: F)
    where
        F: Fn(&FieldValue) -> bool + Send + Sync + 'static,
    {
        let field_type = field_type.into();
        if self.rules.contains_key(&field_type) {
            warn!("Overriding existing format rule '{}'", field_type);
        }
        info!("Registered format rule '{}'", field_type);
        self.rules.insert(field_type, Arc::new(rule));
    }

    /// Names of all registered rules.
    pub fn field_types(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Check a single value against the rule named `field_type`.
    pub fn validate_field(&self, field: &str, value: &FieldValue, field_type: &str) -> FormatCheck {
        let Some(rule) = self.rules.get(field_type) else {
            warn!("Unknown field type '{}' for field '{}'", field_type, field);
            return FormatCheck {
                field: field.to_string(),
                value: value.clone(),
                valid: false,
                error: Some(format!("Unknown field type: {}", field_type)),
            };
        };

        let valid = rule(value);
        FormatCheck {
            field: field.to_string(),
            value: value.clone(),
            valid,
            error: (!valid).then(|| format!("Invalid {} format", field_type)),
        }
    }

    /// Check every field in `field_types` that is present in `data`.
    pub fn validate_document_data(
        &self,
        data: &IndexMap<String, FieldValue>,
        field_types: &IndexMap<String, String>,
    ) -> FormatReport {
        let mut report = FormatReport {
            valid: true,
            fields: IndexMap::new(),
        };

        for (field, field_type) in field_types {
            if let Some(value) = data.get(field) {
                let check = self.validate_field(field, value, field_type);
                report.valid &= check.valid;
                report.fields.insert(field.clone(), check);
            }
        }

        report
    }
}

impl Default for FormatValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatValidator")
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage() {
        assert!(validate_percentage(&FieldValue::from("23%")));
        assert!(validate_percentage(&FieldValue::from(Decimal::new(8, 0))));
        assert!(!validate_percentage(&FieldValue::from("123")));
        assert!(!validate_percentage(&FieldValue::from("abc")));
    }

    #[test]
    fn test_currency_amount() {
        assert!(validate_currency_amount(&FieldValue::from("$1,234.56")));
        assert!(!validate_currency_amount(&FieldValue::from("1.23456")));
        assert!(!validate_currency_amount(&FieldValue::from("free")));
    }

    #[test]
    fn test_tax_id() {
        assert!(validate_tax_id("526-104-08-28", Some("PL")));
        assert!(!validate_tax_id("526-104-08", Some("PL")));
        assert!(validate_tax_id("12345678901", Some("de")));
        assert!(validate_tax_id("GB123456789", None));
        assert!(!validate_tax_id("A-1", None));
    }

    #[test]
    fn test_phone_and_email() {
        assert!(validate_phone_number("+48 (22) 123-45-67"));
        assert!(!validate_phone_number("12-34"));
        assert!(validate_email("billing@example.com"));
        assert!(!validate_email("billing@example"));
    }

    #[test]
    fn test_unknown_field_type() {
        let validator = FormatValidator::new();
        let check = validator.validate_field("x", &FieldValue::from("1"), "iban");
        assert!(!check.valid);
        assert_eq!(check.error.as_deref(), Some("Unknown field type: iban"));
    }

    #[test]
    fn test_custom_validator_and_document_data() {
        let mut validator = FormatValidator::new();
        validator.register_custom_validator("invoice_no", |v: &FieldValue| {
            v.to_string().starts_with("INV-")
        });

        let mut data = IndexMap::new();
        data.insert("number".to_string(), FieldValue::from("INV-001"));
        data.insert("vat".to_string(), FieldValue::from("230%"));

        let mut types = IndexMap::new();
        types.insert("number".to_string(), "invoice_no".to_string());
        types.insert("vat".to_string(), "percentage".to_string());
        types.insert("missing".to_string(), "date".to_string());

        let report = validator.validate_document_data(&data, &types);
        assert!(!report.valid);
        assert!(report.fields["number"].valid);
        assert!(!report.fields["vat"].valid);
        assert!(!report.fields.contains_key("missing"));
    }
}
