pub mod engine;
pub mod error;
pub mod executor;
pub mod result;
pub mod session;

pub use engine::Engine;
pub use error::{Error, Result};
pub use result::SqlResult;
pub use session::Session;
