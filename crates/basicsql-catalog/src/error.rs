//! Catalog-level error kinds (spec §7, "Catalog" family).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("UnknownDatabase: {0}")]
    UnknownDatabase(String),

    #[error("UnknownTable: {0}")]
    UnknownTable(String),

    #[error("AlreadyExists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Storage(#[from] basicsql_storage::Error),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
