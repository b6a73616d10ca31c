//! Errors the executor can raise, wrapping every lower layer (spec §7).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Catalog(#[from] basicsql_catalog::Error),

    #[error(transparent)]
    Storage(#[from] basicsql_storage::Error),

    #[error(transparent)]
    Schema(#[from] basicsql_core::Error),

    #[error("UnknownColumn: {0}")]
    UnknownColumn(String),
}

pub type Result<T> = std::result::Result<T, Error>;
