use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, InsightsError>;

/// Error type covering the different failure cases that can occur when the
/// tool loads spreadsheets, reconciles them, or writes reports.
#[derive(Debug, Error)]
pub enum InsightsError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when a report cannot be formatted as text.
    #[error("formatting error: {0}")]
    Format(#[from] std::fmt::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet cannot be located or has no header row.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when one or more required columns are absent from a sheet.
    #[error("{source_name} is missing required column(s): {}", missing.join(", "))]
    MissingColumns {
        source_name: String,
        missing: Vec<String>,
    },

    /// Raised when a numeric cell holds text that cannot be parsed.
    #[error("invalid value '{value}' in column {column} at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// Raised when the configuration file is structurally valid JSON but
    /// semantically unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
