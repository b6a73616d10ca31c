//! Error types shared across the value/column model.

/// Errors produced while validating or coercing values against a schema.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("TypeMismatch: column {column} expects {expected}, got {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("NullViolation: {0}")]
    NullViolation(String),

    #[error("InvalidFlagCombination: {0}")]
    InvalidFlagCombination(String),

    #[error("DuplicateColumn: {0}")]
    DuplicateColumn(String),

    #[error("ArityMismatch: expected {expected} values, got {found}")]
    ArityMismatch { expected: usize, found: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
