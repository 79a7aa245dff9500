//! Error taxonomy shared by the matrix, the text form and the cache adapter.
//!
//! Every variant is a contract violation or a topology/data mismatch, never
//! a transient condition. Callers propagate with `?`; nothing here is retried.

use std::fmt;

/// Which axis of the matrix an index refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Site,
    Unit,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Site => f.write_str("site"),
            Axis::Unit => f.write_str("unit"),
        }
    }
}

/// Alignment-related errors
#[derive(Debug, thiserror::Error)]
pub enum AlignmentError {
    #[error("{axis} index {index} out of range (len {len})")]
    Index { axis: Axis, index: usize, len: usize },

    #[error("Shape mismatch for {what}: expected {expected}, got {actual}")]
    Shape {
        what: &'static str,
        expected: String,
        actual: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Symbol '{symbol}' is not part of the {data_type} alphabet")]
    Symbol { symbol: char, data_type: String },

    #[error("Code {code} is outside the {data_type} alphabet ({code_count} codes)")]
    Code {
        code: u32,
        data_type: String,
        code_count: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AlignmentError {
    pub(crate) fn shape(what: &'static str, expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        AlignmentError::Shape {
            what,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
