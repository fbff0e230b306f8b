use crate::{crypto::CkksError, keys::KeyError};
use thiserror::Error;

/// Statistics failures. Input-data errors, fatal for the whole report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Length mismatch: {left} reference value(s) vs {right} pipeline value(s)")]
    LengthMismatch { left: usize, right: usize },

    #[error("Division by zero: reference value at index {index} is zero")]
    DivisionByZero { index: usize },

    #[error("Cannot summarize an empty sequence")]
    Empty,
}

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing column {0:?}")]
    MissingColumn(String),

    #[error("Row {row}: cannot parse {column:?} value {value:?}")]
    Parse {
        row: usize,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Ckks(#[from] CkksError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

pub type BatchResult<T> = Result<T, BatchError>;
