//! Binary codec and per-table file storage (spec §4.1, components C2/C3).

pub mod codec;
pub mod error;
pub mod table;

pub use codec::{Header, MAGIC, VERSION};
pub use error::{Error, Result};
pub use table::{Row, TableFile};
