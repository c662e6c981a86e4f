// Error types for the ingestion pipeline and the snapshot store.
//
// Row-level problems are `FieldError`s. The sheet parser wraps them into
// `LoadError::Row` so every message carries the sheet name and row number.
use std::fmt;
use thiserror::Error;

/// The validated columns that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Date,
    Bays,
    Price,
    MonthlyBudget,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Date => "date",
            Field::Bays => "bays count",
            Field::Price => "price",
            Field::MonthlyBudget => "monthly budget",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// The date token is empty or is not made of two `-` separated parts.
    #[error("invalid date format: {value:?}, expected Week-Day (e.g. 1-5)")]
    Format { value: String },

    /// The date parts are not integers or fall outside week 1-52 / day 1-7.
    #[error("invalid date values: week {week}, day {day}; week should be 1-52, day should be 1-7")]
    Range { week: String, day: String },

    #[error("missing {0}")]
    MissingField(Field),

    #[error("invalid {field}: {value}")]
    InvalidField { field: Field, value: String },
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("row {row} in sheet {sheet:?}: {source}")]
    Row {
        sheet: String,
        row: usize,
        #[source]
        source: FieldError,
    },

    #[error("sheet {sheet:?} is empty or contains only headers")]
    EmptySheet { sheet: String },

    /// The bytes are not a workbook container at all.
    #[error("not a spreadsheet: {0}")]
    UnrecognizedFormat(String),

    /// This build has no spreadsheet decoder.
    #[cfg_attr(feature = "xlsx", allow(dead_code))]
    #[error("unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[cfg(feature = "xlsx")]
    #[error("failed to decode workbook: {0}")]
    Decode(#[from] calamine::Error),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
}

impl LoadError {
    /// Sheet and row the error points at, when it came from a specific row.
    pub fn location(&self) -> Option<(&str, usize)> {
        match self {
            LoadError::Row { sheet, row, .. } => Some((sheet.as_str(), *row)),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
