use std::fmt;

use serde::{Deserialize, Serialize};

/// A single worksheet cell after loading.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(value) => value.trim().is_empty(),
            Cell::Number(_) | Cell::Bool(_) => false,
        }
    }

    /// Textual rendering used for labels such as item names and outlets.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(value) => value.trim().to_string(),
            Cell::Number(value) => ItemCode::from_number(*value).0,
            Cell::Bool(value) => value.to_string(),
        }
    }

    pub fn as_item_code(&self) -> ItemCode {
        match self {
            Cell::Number(value) => ItemCode::from_number(*value),
            other => ItemCode::normalize(&other.as_text()),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// A table that was read from, or will be materialised as, an Excel sheet.
/// Column names are stored trimmed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    /// One-based worksheet row of each entry in `rows`.
    #[serde(skip)]
    source_rows: Vec<usize>,
}

impl SheetTable {
    pub fn new(sheet_name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            columns: columns.into_iter().map(|name| name.trim().to_string()).collect(),
            rows: Vec::new(),
            source_rows: Vec::new(),
        }
    }

    /// Appends a row that directly follows the previous one, with the header
    /// on worksheet row 1.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        let source_row = self.source_rows.last().map_or(2, |last| last + 1);
        self.push_source_row(source_row, row);
    }

    /// Appends a row read from the given one-based worksheet row.
    pub fn push_source_row(&mut self, source_row: usize, row: Vec<Cell>) {
        self.source_rows.push(source_row);
        self.rows.push(row);
    }

    /// One-based worksheet row that `row` was read from, for error messages.
    pub fn source_row(&self, row: usize) -> usize {
        self.source_rows.get(row).copied().unwrap_or(row + 2)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        const EMPTY: &Cell = &Cell::Empty;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(EMPTY)
    }
}

/// Canonical item code used as the join key across sales, purchase,
/// credit-note and aging sheets.
///
/// Codes are always built through [`ItemCode::normalize`] or
/// [`ItemCode::from_number`] so that `123`, `" 123 "` and `"123.0"` compare
/// equal no matter which sheet they came from.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemCode(String);

impl ItemCode {
    /// Normalizes a textual code: trims surrounding whitespace and drops a
    /// trailing `.0` left behind when a numeric column was stringified.
    /// Leading zeros are kept.
    pub fn normalize(raw: &str) -> Self {
        let trimmed = raw.trim();
        let code = match trimmed.strip_suffix(".0") {
            Some(whole) if !whole.is_empty() && whole.chars().all(|ch| ch.is_ascii_digit()) => {
                whole
            }
            _ => trimmed,
        };
        Self(code.to_string())
    }

    /// Builds a code from a numeric cell. Whole numbers render without a
    /// fractional part.
    pub fn from_number(value: f64) -> Self {
        if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
            Self(format!("{}", value as i64))
        } else {
            Self(value.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ItemCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemCode {
    fn from(raw: &str) -> Self {
        Self::normalize(raw)
    }
}

/// One row per purchased/sold item per outlet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub code: ItemCode,
    pub name: String,
    pub category: String,
    pub outlet: String,
    pub qty_purchased: f64,
    pub qty_sold: f64,
    pub stock: f64,
    pub purchase_value: f64,
    pub sales_value: f64,
    pub profit: f64,
    /// Margin percentage as exported in the source sheet, when present.
    pub stored_margin_pct: Option<f64>,
    pub has_credit_note: bool,
    /// Filled in by the aging merge.
    pub avg_monthly_sales: Option<f64>,
}

impl Record {
    pub fn new(code: impl Into<ItemCode>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Margin percentage: the stored value when the sheet carried one,
    /// otherwise recomputed from profit and sales.
    pub fn margin_pct(&self) -> f64 {
        self.stored_margin_pct
            .unwrap_or_else(|| crate::aggregate::margin_pct(self.profit, self.sales_value))
    }

    pub fn aging_key(&self) -> AgingKey {
        AgingKey::new(&self.name, &self.category, &self.code)
    }
}

/// Stock-aging snapshot for one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingEntry {
    pub name: String,
    pub category: String,
    pub barcode: ItemCode,
    pub stock: f64,
    pub avg_monthly_sales: f64,
}

/// Composite key used to line aging entries up with records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgingKey {
    pub name: String,
    pub category: String,
    pub barcode: ItemCode,
}

impl AgingKey {
    pub fn new(name: &str, category: &str, barcode: &ItemCode) -> Self {
        Self {
            name: name.trim().to_lowercase(),
            category: category.trim().to_lowercase(),
            barcode: barcode.clone(),
        }
    }
}

impl AgingEntry {
    pub fn key(&self) -> AgingKey {
        AgingKey::new(&self.name, &self.category, &self.barcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_textual_codes_normalize_alike() {
        assert_eq!(ItemCode::from_number(123.0), ItemCode::normalize(" 123 "));
        assert_eq!(ItemCode::normalize("123.0"), ItemCode::normalize("123"));
        assert_eq!(ItemCode::normalize("00123").as_str(), "00123");
        assert_eq!(ItemCode::normalize("AB.0").as_str(), "AB.0");
        assert_eq!(ItemCode::from_number(12.5).as_str(), "12.5");
    }

    #[test]
    fn numeric_cells_render_as_whole_codes() {
        assert_eq!(Cell::Number(4501.0).as_item_code().as_str(), "4501");
        assert_eq!(Cell::from(" 4501.0 ").as_item_code().as_str(), "4501");
        assert_eq!(Cell::Number(7.0).as_text(), "7");
    }

    #[test]
    fn short_rows_read_as_empty() {
        let mut table = SheetTable::new("Sheet1", vec![" Items ".into(), "Outlet".into()]);
        table.push_row(vec![Cell::from("Rice")]);
        assert_eq!(table.columns[0], "Items");
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.cell(9, 0), &Cell::Empty);
    }

    #[test]
    fn source_rows_follow_gaps() {
        let mut table = SheetTable::new("Sheet1", vec!["Items".into()]);
        table.push_row(vec![Cell::from("Rice")]);
        table.push_source_row(6, vec![Cell::from("Oil")]);
        table.push_row(vec![Cell::from("Salt")]);
        assert_eq!(table.source_row(0), 2);
        assert_eq!(table.source_row(1), 6);
        assert_eq!(table.source_row(2), 7);
    }

    #[test]
    fn margin_prefers_stored_value() {
        let mut record = Record::new("1", "Widget");
        record.sales_value = 200.0;
        record.profit = 50.0;
        assert_eq!(record.margin_pct(), 25.0);

        record.stored_margin_pct = Some(-4.0);
        assert_eq!(record.margin_pct(), -4.0);
    }

    #[test]
    fn aging_key_ignores_case_and_padding() {
        let code = ItemCode::normalize("77");
        assert_eq!(
            AgingKey::new(" Rice ", "GROCERY", &code),
            AgingKey::new("rice", "grocery", &code)
        );
    }
}
