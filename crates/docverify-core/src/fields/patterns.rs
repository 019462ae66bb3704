//! Shared regex patterns for feature extraction and format checks.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Tax identifiers
    pub static ref TAX_ID_PATTERNS: Vec<Regex> = vec![
        // EU VAT number
        Regex::new(r"\b[A-Z]{2}\d{9,12}\b").unwrap(),
        // US SSN layout
        Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap(),
        // PL NIP, short grouping
        Regex::new(r"\b\d{2}-\d{7}\b").unwrap(),
        Regex::new(r"\bTAX ID:?\s*([A-Z0-9\-]+)\b").unwrap(),
    ];

    // Payment terms
    pub static ref PAYMENT_TERMS_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)payment\s+terms").unwrap(),
        Regex::new(r"(?i)due\s+in\s+\d+\s+days").unwrap(),
        Regex::new(r"(?i)net\s+\d+").unwrap(),
        Regex::new(r"(?i)due\s+date").unwrap(),
        Regex::new(r"(?i)termin\s+płatności").unwrap(),
    ];

    // Line item headers and rows
    pub static ref LINE_ITEM_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?i)\b(qty|quantity|ilość)\b.*\b(price|cena)\b.*\b(amount|kwota)\b").unwrap(),
        Regex::new(r"(?i)\b\d+\s*x\s*[\d\.,]+\s*=\s*[\d\.,]+\b").unwrap(),
        Regex::new(r"(?i)\b(item|description|opis)\b.*\b(unit|price|cena)\b").unwrap(),
    ];

    // Table-like layouts
    pub static ref TABLE_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?im)\b(item|description|qty|quantity|price|amount|total)\b.*\n.*\b(item|description|qty|quantity|price|amount|total)\b").unwrap(),
        Regex::new(r"(?im)[-]{3,}.*[-]{3,}").unwrap(),
        Regex::new(r"(?im)[|].*[|]").unwrap(),
        Regex::new(r"(?im)\b\d+\s*\|\s*[\w\s]+\s*\|\s*\d+\s*\|\s*[\d\.,]+\s*\|\s*[\d\.,]+\b").unwrap(),
    ];

    // Cell separators in column-shaped lines
    pub static ref CELL_SEPARATOR: Regex = Regex::new(r"\s{2,}|\t|\|").unwrap();

    // Contact details
    pub static ref EMAIL: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ).unwrap();

    pub static ref PHONE: Regex = Regex::new(
        r"^\+?[0-9]{8,15}$"
    ).unwrap();

    pub static ref PHONE_SEPARATORS: Regex = Regex::new(
        r"[\s\-()]"
    ).unwrap();
}

/// Whether any of `patterns` matches `text`.
pub fn any_match(patterns: &[Regex], text: &str) -> bool {
    patterns.iter().any(|p| p.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_id_patterns() {
        assert!(any_match(&TAX_ID_PATTERNS, "VAT: PL5261040828"));
        assert!(any_match(&TAX_ID_PATTERNS, "TAX ID: 12-3456789"));
        assert!(!any_match(&TAX_ID_PATTERNS, "Thank you for shopping"));
    }

    #[test]
    fn test_payment_terms_patterns() {
        assert!(any_match(&PAYMENT_TERMS_PATTERNS, "Payment due in 30 days"));
        assert!(any_match(&PAYMENT_TERMS_PATTERNS, "Terms: NET 30"));
        assert!(!any_match(&PAYMENT_TERMS_PATTERNS, "Paid in cash"));
    }

    #[test]
    fn test_table_patterns() {
        assert!(any_match(&TABLE_PATTERNS, "| Widget | 2 | 10.00 |"));
        assert!(any_match(&TABLE_PATTERNS, "Description\nTotal due"));
        assert!(!any_match(&TABLE_PATTERNS, "plain sentence"));
    }
}
