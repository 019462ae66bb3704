//! Generic regex-driven extractor.

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::debug;

use super::{Extractor, Result};
use crate::classify::structure::{is_column_line, TOTALS_TERMS};
use crate::error::ExtractionError;
use crate::fields::amounts::parse_amount;
use crate::fields::patterns::CELL_SEPARATOR;
use crate::models::record::{ExtractionRecord, FieldValue, LineItem};
use crate::selection::ExtractorSelection;

/// Extractor driven by `field -> regex` rules. The first capture group (or
/// the whole match) becomes the field's value.
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    fields: IndexMap<String, Regex>,
    table_mode: bool,
}

impl PatternExtractor {
    /// Compile field rules. Patterns are case-insensitive.
    pub fn new(rules: &IndexMap<String, String>) -> Result<Self> {
        let fields = rules
            .iter()
            .map(|(field, pattern)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (field.clone(), re))
                    .map_err(|e| ExtractionError::InvalidParameter {
                        name: field.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<IndexMap<_, _>>>()?;

        Ok(Self {
            fields,
            table_mode: false,
        })
    }

    /// Also read line items from column-shaped lines.
    pub fn with_table_mode(mut self, table_mode: bool) -> Self {
        self.table_mode = table_mode;
        self
    }

    /// Build from a selection's field rules and `table_mode` parameter.
    pub fn from_selection(selection: &ExtractorSelection) -> Result<Self> {
        let table_mode = selection
            .params
            .get("table_mode")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Self::new(&selection.rules)?.with_table_mode(table_mode))
    }

    /// Names of the fields this extractor looks for.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl Extractor for PatternExtractor {
    fn name(&self) -> &str {
        "pattern"
    }

    fn extract(&self, text: &str) -> Result<ExtractionRecord> {
        let mut record = ExtractionRecord::default();

        for (field, re) in &self.fields {
            let Some(caps) = re.captures(text) else {
                continue;
            };
            let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            let value = m.as_str().trim();
            if value.is_empty() {
                continue;
            }
            debug!("Field '{}' matched '{}'", field, value);
            assign(&mut record, field, value);
        }

        if self.table_mode {
            record.items = parse_table_items(text);
            debug!("Read {} line items from table rows", record.items.len());
        }

        if record.is_empty() {
            return Err(ExtractionError::NoData);
        }
        Ok(record)
    }
}

fn assign(record: &mut ExtractionRecord, field: &str, value: &str) {
    let text = || Some(FieldValue::from(value));
    match field {
        "document_number" | "invoice_number" => record.document_number = text(),
        "issue_date" => record.issue_date = text(),
        "due_date" => record.due_date = text(),
        "subtotal" => record.totals.subtotal = text(),
        "tax_amount" => record.totals.tax_amount = text(),
        "tax_rate" => record.totals.tax_rate = text(),
        "total" | "total_amount" => record.totals.total = text(),
        "currency" => record.totals.currency = Some(value.to_string()),
        "seller_name" => record.seller.name = Some(value.to_string()),
        "seller_tax_id" => record.seller.tax_id = Some(value.to_string()),
        "buyer_name" => record.buyer.name = Some(value.to_string()),
        "buyer_tax_id" => record.buyer.tax_id = Some(value.to_string()),
        other => {
            record
                .extra
                .insert(other.to_string(), Value::String(value.to_string()));
        }
    }
}

fn is_amount_cell(cell: &str) -> bool {
    (cell.contains('.') || cell.contains(',')) && parse_amount(cell).is_some()
}

fn is_integer_cell(cell: &str) -> bool {
    !cell.is_empty() && cell.chars().all(|c| c.is_ascii_digit())
}

fn is_totals_line(description: &str) -> bool {
    let lower = description.to_lowercase();
    lower
        .split_whitespace()
        .next()
        .map(|word| word.trim_end_matches(':'))
        .is_some_and(|word| TOTALS_TERMS.contains(&word))
}

/// Read item rows: description, optional quantity, optional unit price and
/// a trailing amount.
fn parse_table_items(text: &str) -> Vec<LineItem> {
    text.lines()
        .filter(|line| is_column_line(line))
        .filter_map(parse_item_row)
        .collect()
}

fn parse_item_row(line: &str) -> Option<LineItem> {
    let cells: Vec<&str> = CELL_SEPARATOR
        .split(line)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if cells.len() < 2 {
        return None;
    }

    let description_index = cells
        .iter()
        .position(|c| c.chars().any(char::is_alphabetic))?;
    let description = cells[description_index];
    if is_totals_line(description) {
        return None;
    }

    let rest = &cells[description_index + 1..];
    let amounts: Vec<&str> = rest.iter().copied().filter(|c| is_amount_cell(c)).collect();
    let total = *amounts.last()?;
    let unit_price = (amounts.len() >= 2).then(|| amounts[amounts.len() - 2]);
    let quantity = rest.iter().copied().find(|c| is_integer_cell(c));

    Some(LineItem {
        description: Some(description.into()),
        quantity: quantity.map(FieldValue::from),
        unit_price: unit_price.map(FieldValue::from),
        total: Some(total.into()),
        extra: IndexMap::new(),
    })
}
