//! Token stream produced by the lexer (spec §4.3).

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    Integer(i128),
    Decimal(f64),
    Str(String),
    LParen,
    RParen,
    Comma,
    Star,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Minus,
    Semicolon,
    Eof,
}

impl TokenKind {
    /// Human-readable label for error messages (`expected` sets).
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier `{s}`"),
            TokenKind::Integer(n) => format!("integer `{n}`"),
            TokenKind::Decimal(n) => format!("decimal `{n}`"),
            TokenKind::Str(s) => format!("string '{s}'"),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Star => "'*'".to_string(),
            TokenKind::Eq => "'='".to_string(),
            TokenKind::NotEq => "'!=' or '<>'".to_string(),
            TokenKind::Lt => "'<'".to_string(),
            TokenKind::LtEq => "'<='".to_string(),
            TokenKind::Gt => "'>'".to_string(),
            TokenKind::GtEq => "'>='".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

/// A token together with the byte offset in the source it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
}
