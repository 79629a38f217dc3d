//! Error types for the match engine.
//!
//! Bad cell data never surfaces here: scoring degrades per filter instead.
//! These errors cover caller mistakes (invalid filters, config, lookups).

use pyo3::exceptions::{PyKeyError, PyValueError};
use pyo3::PyErr;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A range attribute that is not of the form `"min-max"`.
    #[error("invalid range format: '{0}', expected 'min-max'")]
    InvalidRange(String),

    /// Caller-supplied input violates a documented constraint.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.message().to_string())
    }
}

impl From<EngineError> for PyErr {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(_) => PyKeyError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}
