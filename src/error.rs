use chrono::NaiveDate;
use thiserror::Error;

/// Per-file failures. The display text is what ends up in the error log.
#[derive(Error, Debug)]
pub enum CensusError {
    #[error("Worksheet '{0}' not found")]
    MissingSheet(String),

    #[error("Worksheet '{0}' is empty")]
    EmptySheet(String),

    #[error("Worksheet '{sheet}' has no column '{column}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Worksheet '{sheet}' row {row} has data in column {column}, beyond the {width} header columns")]
    RowShape {
        sheet: String,
        row: usize,
        column: usize,
        width: usize,
    },

    #[error("Birth date {birth_date} in roster row {row} lies after the reference date {reference_date}")]
    BirthAfterCutoff {
        row: usize,
        birth_date: NaiveDate,
        reference_date: NaiveDate,
    },

    #[error("Could not read workbook: {0}")]
    Workbook(#[from] calamine::Error),
}
