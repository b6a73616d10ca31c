pub mod connection;
pub mod server;

pub use server::{Server, DEFAULT_BIND};
