//! Amount normalisation for OCR'd monetary strings.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse a monetary string in either European (`1.234,56`) or US
/// (`1,234.56`) notation.
///
/// The rightmost `,` or `.` is taken as the decimal point and every other
/// separator is dropped as thousands grouping. Currency symbols, codes and
/// whitespace are stripped afterwards. A string with a single comma and no
/// fractional intent (`1,234`) is therefore read as `1.234`; callers that
/// care about that case must normalise before calling. When the decimal
/// separator occurs more than once (`1,234,567`) the string is not an
/// amount and `None` is returned.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let decimal_pos = s.rfind([',', '.']);
    if let Some(pos) = decimal_pos {
        let separator = &s[pos..pos + 1];
        if s.matches(separator).count() > 1 {
            return None;
        }
    }

    let mut normalized = String::with_capacity(s.len());
    for (pos, c) in s.char_indices() {
        match c {
            ',' | '.' if Some(pos) == decimal_pos => normalized.push('.'),
            ',' | '.' => {}
            '0'..='9' | '-' => normalized.push(c),
            _ => {}
        }
    }

    if normalized.is_empty() || normalized == "-" || normalized == "." {
        return None;
    }

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_plain_amounts() {
        assert_eq!(parse_amount("123.45"), Some(dec("123.45")));
        assert_eq!(parse_amount("100"), Some(dec("100")));
        assert_eq!(parse_amount("-42.10"), Some(dec("-42.10")));
    }

    #[test]
    fn test_parse_european_format() {
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1 234,56 zł"), Some(dec("1234.56")));
        assert_eq!(parse_amount("12.345.678,90"), Some(dec("12345678.90")));
    }

    #[test]
    fn test_parse_us_format() {
        assert_eq!(parse_amount("$1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("USD 12,345,678.90"), Some(dec("12345678.90")));
    }

    #[test]
    fn test_parse_with_currency_markers() {
        assert_eq!(parse_amount("€100,00"), Some(dec("100.00")));
        assert_eq!(parse_amount("100.00 EUR"), Some(dec("100.00")));
    }

    #[test]
    fn test_thousands_only_group_is_read_as_fraction() {
        // Known limitation of the rightmost-separator heuristic.
        assert_eq!(parse_amount("1,234"), Some(dec("1.234")));
        assert_eq!(parse_amount("1.234"), Some(dec("1.234")));
    }

    #[test]
    fn test_repeated_separator_is_rejected() {
        assert_eq!(parse_amount("1,234,567"), None);
        assert_eq!(parse_amount("1.234.567"), None);
        assert_eq!(parse_amount("$1,234,567"), None);
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount("-"), None);
        assert_eq!(parse_amount("100-"), None);
    }
}
