//! Database/table namespace and on-disk layout (spec §4.2, component C4).

pub mod catalog;
pub mod error;

pub use catalog::{Catalog, DEFAULT_DATABASE};
pub use error::{Error, Result};
