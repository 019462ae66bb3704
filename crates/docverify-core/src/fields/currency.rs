//! Currency symbols and the markers that identify a currency in text.

/// Known currency symbols and the ISO code they stand for.
pub const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("R$", "BRL"),
    ("zł", "PLN"),
    ("kr", "SEK"),
    ("A$", "AUD"),
    ("C$", "CAD"),
    ("HK$", "HKD"),
    ("S$", "SGD"),
    ("₽", "RUB"),
    ("₩", "KRW"),
    ("₺", "TRY"),
    ("R", "ZAR"),
];

/// Normalise a declared currency (`"eur"`, `"€"`, `" EUR "`) to its ISO code.
pub fn normalize_currency(declared: &str) -> String {
    let declared = declared.trim();
    CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| *symbol == declared)
        .map(|(_, code)| (*code).to_string())
        .unwrap_or_else(|| declared.to_uppercase())
}

/// Strings whose presence marks a value as being in `code`.
///
/// The ISO code itself is always a marker, followed by every symbol mapped
/// to it.
pub fn currency_markers(code: &str) -> Vec<&str> {
    let mut markers = vec![code];
    markers.extend(
        CURRENCY_SYMBOLS
            .iter()
            .filter(|(_, c)| *c == code)
            .map(|(symbol, _)| *symbol),
    );
    markers
}

/// Whether `value` carries any marker of the currency `code`.
///
/// Symbols of other currencies that contain one of the markers (`C$` for
/// `$`, `R$` for `R`) are removed first. Alphabetic markers such as ISO
/// codes, `R` or `kr` only count when no other letter touches them.
pub fn has_currency_marker(value: &str, code: &str) -> bool {
    let markers = currency_markers(code);

    let mut foreign: Vec<&str> = CURRENCY_SYMBOLS
        .iter()
        .filter(|(symbol, c)| *c != code && markers.iter().any(|m| symbol.contains(m)))
        .map(|(symbol, _)| *symbol)
        .collect();
    foreign.sort_by_key(|symbol| std::cmp::Reverse(symbol.len()));

    let mut value = value.to_string();
    for symbol in foreign {
        value = value.replace(symbol, " ");
    }

    markers.into_iter().any(|marker| {
        if marker.chars().all(char::is_alphabetic) {
            value
                .match_indices(marker)
                .any(|(start, _)| stands_alone(&value, start, marker.len()))
        } else {
            value.contains(marker)
        }
    })
}

fn stands_alone(value: &str, start: usize, len: usize) -> bool {
    let before = value[..start].chars().next_back();
    let after = value[start + len..].chars().next();
    !before.is_some_and(char::is_alphabetic) && !after.is_some_and(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("eur"), "EUR");
        assert_eq!(normalize_currency("€"), "EUR");
        assert_eq!(normalize_currency("zł"), "PLN");
        assert_eq!(normalize_currency(" USD "), "USD");
    }

    #[test]
    fn test_currency_markers() {
        assert_eq!(currency_markers("EUR"), vec!["EUR", "€"]);
        assert_eq!(currency_markers("CHF"), vec!["CHF"]);
    }

    #[test]
    fn test_has_currency_marker() {
        assert!(has_currency_marker("€100.00", "EUR"));
        assert!(has_currency_marker("100.00 EUR", "EUR"));
        assert!(!has_currency_marker("$100.00", "EUR"));
        assert!(has_currency_marker("1 230,00 zł", "PLN"));
    }

    #[test]
    fn test_letter_symbol_needs_word_boundary() {
        assert!(has_currency_marker("R 100.00", "ZAR"));
        assert!(has_currency_marker("R100.00", "ZAR"));
        assert!(!has_currency_marker("100.00 EUR", "ZAR"));
        assert!(!has_currency_marker("100.00 EURO", "EUR"));
        assert!(has_currency_marker("250 kr", "SEK"));
        assert!(!has_currency_marker("250 NOK kroner", "SEK"));
    }

    #[test]
    fn test_longer_foreign_symbol_is_not_a_marker() {
        assert!(has_currency_marker("$100.00", "USD"));
        assert!(!has_currency_marker("C$100.00", "USD"));
        assert!(!has_currency_marker("R$100.00", "USD"));
        assert!(!has_currency_marker("HK$100.00", "USD"));
        assert!(has_currency_marker("C$100.00", "CAD"));
        assert!(has_currency_marker("HK$100.00", "HKD"));
        assert!(!has_currency_marker("R$100.00", "ZAR"));
        assert!(has_currency_marker("R$100.00", "BRL"));
    }
}
