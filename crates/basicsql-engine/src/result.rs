//! Structured outcome of `Engine::execute` (spec §6): the shape every
//! collaborator (TCP server, interactive shell) renders into its own
//! surface without touching the executor again.

use basicsql_core::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum SqlResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Mutation {
        rows_affected: u64,
        generated: Option<(String, Value)>,
    },
    Tables(Vec<String>),
    Databases(Vec<String>),
    Ok,
    Error(String),
}

impl SqlResult {
    pub fn is_success(&self) -> bool {
        !matches!(self, SqlResult::Error(_))
    }
}
