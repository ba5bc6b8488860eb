//! Turns raw [`SheetTable`]s into typed records through the column-alias map.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{ColumnAliases, Field};
use crate::error::{InsightsError, Result};
use crate::model::{AgingEntry, Cell, ItemCode, Record, SheetTable};

/// Fields a sales/purchase sheet must carry for every view.
pub const BASE_FIELDS: &[Field] = &[Field::ItemName];

/// Fields an aging sheet must carry.
pub const AGING_FIELDS: &[Field] = &[
    Field::ItemCode,
    Field::ItemName,
    Field::Category,
    Field::Stock,
    Field::AvgMonthlySales,
];

/// Resolved positions of the logical fields within one sheet.
#[derive(Debug, Clone, Default)]
pub struct ColumnMap {
    indices: BTreeMap<Field, usize>,
}

impl ColumnMap {
    /// Resolves every known field and fails when any of `required` is absent,
    /// listing all of the missing ones at once.
    pub fn resolve(table: &SheetTable, aliases: &ColumnAliases, required: &[Field]) -> Result<Self> {
        let indices: BTreeMap<Field, usize> = Field::ALL
            .iter()
            .filter_map(|field| {
                aliases
                    .resolve(*field, &table.columns)
                    .map(|index| (*field, index))
            })
            .collect();

        let mut missing: Vec<String> = required
            .iter()
            .filter(|field| !indices.contains_key(*field))
            .map(|field| field.display_name().to_string())
            .collect();
        missing.dedup();
        if !missing.is_empty() {
            return Err(InsightsError::MissingColumns {
                source_name: table.sheet_name.clone(),
                missing,
            });
        }

        debug!(sheet = %table.sheet_name, resolved = indices.len(), "columns resolved");
        Ok(Self { indices })
    }

    pub fn index(&self, field: Field) -> Option<usize> {
        self.indices.get(&field).copied()
    }

    fn text(&self, table: &SheetTable, row: usize, field: Field) -> String {
        self.index(field)
            .map(|column| table.cell(row, column).as_text())
            .unwrap_or_default()
    }

    fn code(&self, table: &SheetTable, row: usize) -> ItemCode {
        self.index(Field::ItemCode)
            .map(|column| table.cell(row, column).as_item_code())
            .unwrap_or_default()
    }

    fn number(&self, table: &SheetTable, row: usize, field: Field) -> Result<f64> {
        match self.index(field) {
            Some(column) => parse_number(
                table.cell(row, column),
                &table.columns[column],
                table.source_row(row),
            ),
            None => Ok(0.0),
        }
    }

    fn optional_number(&self, table: &SheetTable, row: usize, field: Field) -> Result<Option<f64>> {
        match self.index(field) {
            Some(column) => {
                let cell = table.cell(row, column);
                if cell.is_empty() {
                    Ok(None)
                } else {
                    parse_number(cell, &table.columns[column], table.source_row(row)).map(Some)
                }
            }
            None => Ok(None),
        }
    }
}

/// Parses a numeric cell found on worksheet row `source_row`. Blank cells and
/// a lone `-` count as zero; text may carry thousands separators. `NaN` and
/// infinities are rejected.
fn parse_number(cell: &Cell, column: &str, source_row: usize) -> Result<f64> {
    let invalid = |value: String| InsightsError::InvalidValue {
        column: column.to_string(),
        row: source_row,
        value,
    };
    match cell {
        Cell::Empty => Ok(0.0),
        Cell::Number(value) if value.is_finite() => Ok(*value),
        Cell::Number(value) => Err(invalid(value.to_string())),
        Cell::Text(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed == "-" {
                return Ok(0.0);
            }
            let cleaned: String = trimmed.chars().filter(|ch| *ch != ',').collect();
            match cleaned.parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(value),
                _ => Err(invalid(raw.clone())),
            }
        }
        Cell::Bool(value) => Err(invalid(value.to_string())),
    }
}

/// Builds records from a sales or purchase sheet. Fields outside `required`
/// are optional and default to zero or empty when the sheet lacks them.
pub fn records_from_table(
    table: &SheetTable,
    aliases: &ColumnAliases,
    required: &[Field],
) -> Result<Vec<Record>> {
    let columns = ColumnMap::resolve(table, aliases, required)?;
    let mut records = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        records.push(Record {
            code: columns.code(table, row),
            name: columns.text(table, row, Field::ItemName),
            category: columns.text(table, row, Field::Category),
            outlet: columns.text(table, row, Field::Outlet),
            qty_purchased: columns.number(table, row, Field::QtyPurchased)?,
            qty_sold: columns.number(table, row, Field::QtySold)?,
            stock: columns.number(table, row, Field::Stock)?,
            purchase_value: columns.number(table, row, Field::PurchaseValue)?,
            sales_value: columns.number(table, row, Field::SalesValue)?,
            profit: columns.number(table, row, Field::Profit)?,
            stored_margin_pct: columns.optional_number(table, row, Field::MarginPct)?,
            has_credit_note: false,
            avg_monthly_sales: columns.optional_number(table, row, Field::AvgMonthlySales)?,
        });
    }

    debug!(sheet = %table.sheet_name, records = records.len(), "records built");
    Ok(records)
}

/// Extracts the item codes listed in a credit-note sheet. When no item-code
/// column can be resolved the first column is used instead.
pub fn credit_codes_from_table(table: &SheetTable, aliases: &ColumnAliases) -> Result<Vec<ItemCode>> {
    let column = match aliases.resolve(Field::ItemCode, &table.columns) {
        Some(column) => column,
        None if !table.columns.is_empty() => {
            warn!(
                sheet = %table.sheet_name,
                fallback = %table.columns[0],
                "no item code column in credit notes, using first column"
            );
            0
        }
        None => {
            return Err(InsightsError::MissingColumns {
                source_name: table.sheet_name.clone(),
                missing: vec![Field::ItemCode.display_name().to_string()],
            });
        }
    };

    let codes: Vec<ItemCode> = (0..table.len())
        .map(|row| table.cell(row, column).as_item_code())
        .filter(|code| !code.is_empty())
        .collect();
    debug!(sheet = %table.sheet_name, codes = codes.len(), "credit note codes read");
    Ok(codes)
}

/// Builds aging entries from a stock-aging sheet.
pub fn aging_from_table(table: &SheetTable, aliases: &ColumnAliases) -> Result<Vec<AgingEntry>> {
    let columns = ColumnMap::resolve(table, aliases, AGING_FIELDS)?;
    (0..table.len())
        .map(|row| {
            Ok(AgingEntry {
                name: columns.text(table, row, Field::ItemName),
                category: columns.text(table, row, Field::Category),
                barcode: columns.code(table, row),
                stock: columns.number(table, row, Field::Stock)?,
                avg_monthly_sales: columns.number(table, row, Field::AvgMonthlySales)?,
            })
        })
        .collect()
}
