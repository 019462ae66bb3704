//! Date parsing for extracted date fields.

use chrono::NaiveDate;

/// Accepted date layouts, tried in order. The first layout that parses wins,
/// so day-first layouts take precedence over month-first ones.
pub const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%m-%d-%Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%m.%d.%Y",
    "%Y.%m.%d",
    "%b %d %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%d %B %Y",
];

/// Parse a date string using [`DATE_FORMATS`].
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_iso() {
        assert_eq!(parse_date("2023-10-15"), Some(ymd(2023, 10, 15)));
        assert_eq!(parse_date(" 2023/10/15 "), Some(ymd(2023, 10, 15)));
    }

    #[test]
    fn test_parse_day_first_wins() {
        assert_eq!(parse_date("03/04/2023"), Some(ymd(2023, 4, 3)));
        assert_eq!(parse_date("15.10.2023"), Some(ymd(2023, 10, 15)));
    }

    #[test]
    fn test_falls_back_to_month_first() {
        assert_eq!(parse_date("10/15/2023"), Some(ymd(2023, 10, 15)));
    }

    #[test]
    fn test_parse_month_names() {
        assert_eq!(parse_date("15 Oct 2023"), Some(ymd(2023, 10, 15)));
        assert_eq!(parse_date("October 15 2023"), Some(ymd(2023, 10, 15)));
    }

    #[test]
    fn test_unparseable() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("tomorrow"), None);
        assert_eq!(parse_date("31/31/2023"), None);
    }
}
