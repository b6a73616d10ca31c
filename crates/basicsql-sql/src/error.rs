//! Parse errors: offending token's byte offset plus an expected-set (spec §4.3).

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("Parse at {offset}: expected {}, found {found}", expected.join(" or "))]
pub struct ParseError {
    pub offset: usize,
    pub expected: Vec<String>,
    pub found: String,
}

impl ParseError {
    pub fn new(offset: usize, expected: Vec<String>, found: String) -> Self {
        Self {
            offset,
            expected,
            found,
        }
    }
}

pub type Result<T> = std::result::Result<T, ParseError>;
