use std::path::Path;

use rust_xlsxwriter::{Format, Table, TableColumn, Workbook};
use tracing::{info, instrument};

use crate::error::Result;
use crate::model::{Cell, SheetTable};

/// Writes the provided tables to the given path, one worksheet per table.
#[instrument(level = "info", skip(tables), fields(path = %path.display()))]
pub fn write_tables(path: &Path, tables: &[SheetTable]) -> Result<()> {
    let mut workbook_writer = Workbook::new();
    let number_format = Format::new().set_num_format("#,##0.00");

    for table in tables {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(sanitize_sheet_name(&table.sheet_name))?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let excel_row = (row_idx + 1) as u32;
            for (col_idx, cell) in row.iter().enumerate() {
                let excel_col = col_idx as u16;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(value) => {
                        worksheet.write_string(excel_row, excel_col, value)?;
                    }
                    Cell::Number(value) => {
                        worksheet.write_number_with_format(
                            excel_row,
                            excel_col,
                            *value,
                            &number_format,
                        )?;
                    }
                    Cell::Bool(value) => {
                        worksheet.write_boolean(excel_row, excel_col, *value)?;
                    }
                }
            }
        }

        if !table.columns.is_empty() && !table.rows.is_empty() {
            let columns: Vec<TableColumn> = table
                .columns
                .iter()
                .map(|header| TableColumn::new().set_header(header))
                .collect();
            let mut excel_table = Table::new();
            excel_table.set_autofilter(true).set_columns(&columns);
            let col_end = (table.columns.len() as u16).saturating_sub(1);
            let row_end = table.rows.len() as u32;
            worksheet.add_table(0, 0, row_end, col_end, &excel_table)?;
        }
    }

    workbook_writer.save(path)?;
    info!(sheets = tables.len(), "workbook written");
    Ok(())
}

/// Writes a single table.
pub fn write_table(path: &Path, table: &SheetTable) -> Result<()> {
    write_tables(path, std::slice::from_ref(table))
}

/// Excel rejects sheet names longer than 31 characters or containing any of
/// `: \ / ? * [ ]`.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        return "Sheet1".to_string();
    }
    trimmed.chars().take(31).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_are_made_excel_safe() {
        assert_eq!(sanitize_sheet_name("Purchase/Sold [top]"), "Purchase_Sold _top_");
        assert_eq!(sanitize_sheet_name("   "), "Sheet1");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), 31);
    }
}
