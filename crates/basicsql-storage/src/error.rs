//! Error types for the codec and table-file layer.

/// Errors produced by `basicsql-storage`.
///
/// Mirrors the spec §7 Schema/Runtime taxonomy: everything a table file can
/// refuse, plus `#[from]` wiring for the lower-level value/column checks in
/// `basicsql-core`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] basicsql_core::Error),

    #[error("DuplicatePrimaryKey: {column}={value}")]
    DuplicatePrimaryKey { column: String, value: String },

    #[error("NotFound: row {0}")]
    NotFound(u64),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;
