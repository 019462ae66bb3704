//! Parsing and format checks for individual field values.

pub mod amounts;
pub mod currency;
pub mod dates;
pub mod formats;
pub mod patterns;

pub use amounts::parse_amount;
pub use currency::normalize_currency;
pub use dates::parse_date;
pub use formats::{FormatCheck, FormatReport, FormatValidator};
