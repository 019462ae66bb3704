//! Line-level layout analysis of document text.

use serde::Serialize;

/// Lines needed in a row before a block counts as a table.
const MIN_TABLE_LINES: usize = 3;

/// Words that mark a line as part of a totals block.
pub(crate) const TOTALS_TERMS: &[&str] = &[
    "total", "sum", "amount", "subtotal", "tax", "vat", "net", "gross", "razem", "suma", "kwota",
];

/// A run of consecutive column-shaped lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSpan {
    /// First line index (0-based).
    pub start: usize,
    /// Last line index (inclusive).
    pub end: usize,
}

impl TableSpan {
    /// Number of lines covered.
    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// Layout summary of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStructure {
    pub total_lines: usize,
    pub empty_lines: usize,
    /// Short non-empty lines near the top, as `(index, line)`.
    pub potential_headers: Vec<(usize, String)>,
    pub potential_tables: Vec<TableSpan>,
    /// Lines near the bottom mentioning totals, as `(index, line)`.
    pub potential_totals: Vec<(usize, String)>,
}

impl DocumentStructure {
    pub fn has_tables(&self) -> bool {
        !self.potential_tables.is_empty()
    }
}

/// Whether a line looks like a row of columns.
pub fn is_column_line(line: &str) -> bool {
    line.contains("  ")
        || line.contains('\t')
        || line.matches('|').count() > 1
        || line.matches(':').count() > 1
        || line.matches(',').count() > 2
}

/// Analyse the layout of `text`.
pub fn analyze_structure(text: &str) -> DocumentStructure {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut structure = DocumentStructure {
        total_lines: lines.len(),
        empty_lines: lines.iter().filter(|l| l.trim().is_empty()).count(),
        ..Default::default()
    };

    for (i, line) in lines.iter().take(10).enumerate() {
        if !line.trim().is_empty() && line.chars().count() < 50 {
            structure.potential_headers.push((i, (*line).to_string()));
        }
    }

    let mut run_start = None;
    for (i, line) in lines.iter().enumerate() {
        match (is_column_line(line), run_start) {
            (true, None) => run_start = Some(i),
            (true, Some(_)) => {}
            (false, Some(start)) => {
                if i - start >= MIN_TABLE_LINES {
                    structure.potential_tables.push(TableSpan { start, end: i - 1 });
                }
                run_start = None;
            }
            (false, None) => {}
        }
    }
    if let Some(start) = run_start {
        if lines.len() - start >= MIN_TABLE_LINES {
            structure.potential_tables.push(TableSpan {
                start,
                end: lines.len() - 1,
            });
        }
    }

    let tail_start = lines.len().saturating_sub(15);
    for (i, line) in lines.iter().enumerate().skip(tail_start) {
        let lower = line.to_lowercase();
        if TOTALS_TERMS.iter().any(|term| lower.contains(term)) {
            structure.potential_totals.push((i, (*line).to_string()));
        }
    }

    structure
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detects_table_of_three_lines() {
        let text = "Invoice\nItem  Qty  Price\nWidget  2  10.00\nGadget  1  5.00\nThanks";
        let structure = analyze_structure(text);
        assert_eq!(structure.potential_tables, vec![TableSpan { start: 1, end: 3 }]);
        assert_eq!(structure.potential_tables[0].line_count(), 3);
    }

    #[test]
    fn test_two_lines_are_not_a_table() {
        let text = "Item  Qty\nWidget  2\nend";
        assert!(!analyze_structure(text).has_tables());
    }

    #[test]
    fn test_table_running_to_end_of_text() {
        let text = "header\na | b | c\nd | e | f\ng | h | i";
        let structure = analyze_structure(text);
        assert_eq!(structure.potential_tables, vec![TableSpan { start: 1, end: 3 }]);
    }

    #[test]
    fn test_headers_and_totals() {
        let text = "ACME Corp\n\nSubtotal 100.00\nTax 23.00";
        let structure = analyze_structure(text);
        assert_eq!(structure.total_lines, 4);
        assert_eq!(structure.empty_lines, 1);
        assert_eq!(structure.potential_headers.len(), 3);
        assert_eq!(structure.potential_totals.len(), 2);
    }
}
