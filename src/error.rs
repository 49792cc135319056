//! Centralized error handling for the datainsight engine.
//!
//! Every engine operation follows a validate → compute → commit discipline, so a failure
//! is always reported *before* the working dataset is replaced. The variants of
//! [`EngineError`] map onto the three failure families callers care about:
//!
//! - [`EngineError::Validation`]: preconditions unmet (nothing loaded, unknown column,
//!   not enough numeric columns or rows, sample size out of range).
//! - [`EngineError::TypeConversion`]: a requested cast is impossible for at least one
//!   value; the whole conversion request is rejected.
//! - [`EngineError::Computation`]: numerical failure (constant columns, degenerate
//!   clustering input).
//!
//! ```
//! use datainsight::error::{EngineError, ErrorKind};
//!
//! let err = EngineError::validation("Column 'age' not found");
//! assert_eq!(err.kind(), ErrorKind::Validation);
//! assert_eq!(err.to_string(), "Validation error: Column 'age' not found");
//! ```
//!
//! `Io` and `Config` cover the ambient layers (settings files, pipeline specs, the CSV
//! adapter) and never originate inside the in-memory operations.

use polars::prelude::PolarsError;
use serde::Serialize;
use std::fmt;

/// Main error type for engine operations.
#[derive(Debug)]
pub enum EngineError {
    /// Preconditions unmet; the dataset was not touched.
    Validation(String),

    /// A cast could not be applied to every value of a column.
    TypeConversion(String),

    /// Numerical failure while computing a result.
    Computation(String),

    /// I/O errors (settings, pipeline specs, CSV files)
    Io(std::io::Error),

    /// Malformed configuration or pipeline spec
    Config(String),
}

/// Discriminant of [`EngineError`], convenient for matching and for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    TypeConversion,
    Computation,
    Io,
    Config,
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::TypeConversion(_) => ErrorKind::TypeConversion,
            Self::Computation(_) => ErrorKind::Computation,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "Validation error: {msg}"),
            Self::TypeConversion(msg) => write!(f, "Type conversion error: {msg}"),
            Self::Computation(msg) => write!(f, "Computation error: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("JSON error: {err}"))
    }
}

/// Polars failures inside an operation are computation errors; the CSV adapter maps its
/// own read and write failures to [`EngineError::Io`].
impl From<PolarsError> for EngineError {
    fn from(err: PolarsError) -> Self {
        match err {
            PolarsError::IO { error, .. } => {
                Self::Io(std::io::Error::new(error.kind(), error.to_string()))
            }
            other => Self::Computation(other.to_string()),
        }
    }
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
