use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::{debug, instrument};

use crate::error::{InsightsError, Result};
use crate::model::{Cell, SheetTable};

/// Identifies one worksheet to load: the workbook path, an optional sheet
/// name (the first sheet otherwise) and the zero-based header row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SheetRequest {
    pub path: PathBuf,
    pub sheet: Option<String>,
    pub header_row: usize,
}

impl SheetRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: None,
            header_row: 0,
        }
    }

    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    pub fn with_header_row(mut self, header_row: usize) -> Self {
        self.header_row = header_row;
        self
    }
}

/// Reads a worksheet into a [`SheetTable`]. Column names are trimmed and
/// fully blank data rows are dropped.
#[instrument(level = "debug", skip_all, fields(path = %request.path.display()))]
pub fn read_sheet(request: &SheetRequest) -> Result<SheetTable> {
    if !request.path.exists() {
        return Err(InsightsError::MissingInput(request.path.clone()));
    }

    let mut workbook: Xlsx<_> = open_workbook(&request.path)?;
    let sheet_name = match &request.sheet {
        Some(name) => name.clone(),
        None => workbook.sheet_names().first().cloned().ok_or_else(|| {
            InsightsError::InvalidWorkbook(format!(
                "workbook {} contains no sheets",
                request.path.display()
            ))
        })?,
    };

    let range = read_required_sheet(&mut workbook, &sheet_name)?;
    // Zero-based worksheet row of the header, accounting for leading rows
    // outside the used range.
    let header_index = range.start().map_or(0, |(row, _)| row as usize) + request.header_row;
    let mut rows = range.rows().skip(request.header_row);
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| convert_cell(cell).as_text())
            .collect(),
        None => {
            return Err(InsightsError::InvalidWorkbook(format!(
                "sheet '{sheet_name}' in {} has no header row {}",
                request.path.display(),
                request.header_row + 1
            )));
        }
    };

    let mut table = SheetTable::new(sheet_name, headers);
    for (offset, row) in rows.enumerate() {
        let cells: Vec<Cell> = row.iter().map(convert_cell).collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        table.push_source_row(header_index + offset + 2, cells);
    }

    debug!(
        sheet = %table.sheet_name,
        columns = table.columns.len(),
        rows = table.len(),
        "sheet loaded"
    );
    Ok(table)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| InsightsError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(InsightsError::from)?;
    Ok(range)
}

fn convert_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::String(value) => Cell::Text(value.clone()),
        DataType::Float(value) => Cell::Number(*value),
        DataType::Int(value) => Cell::Number(*value as f64),
        DataType::Bool(value) => Cell::Bool(*value),
        DataType::Empty => Cell::Empty,
        other => Cell::Text(other.to_string()),
    }
}

/// Memoizes loaded sheets keyed by path, sheet and header row, so a workbook
/// backing several inputs is only parsed once per run.
#[derive(Debug, Default)]
pub struct WorkbookCache {
    tables: HashMap<SheetRequest, SheetTable>,
}

impl WorkbookCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, request: &SheetRequest) -> Result<&SheetTable> {
        match self.tables.entry(request.clone()) {
            Entry::Occupied(entry) => {
                debug!(path = %request.path.display(), "sheet served from cache");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let table = read_sheet(request)?;
                Ok(entry.insert(table))
            }
        }
    }
}
