//! Errors from the user store (spec §4.6, §7 Protocol/Runtime errors).

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("AlreadyExists: {0}")]
    AlreadyExists(String),

    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corruption: {0}")]
    Corruption(String),
}

pub type Result<T> = std::result::Result<T, Error>;
