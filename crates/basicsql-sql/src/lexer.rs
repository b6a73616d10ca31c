//! Lexer: turns SQL source text into a token stream (spec §4.3).
//!
//! Whitespace-insensitive; keywords are not distinguished from identifiers
//! at this layer (the parser matches identifier text case-insensitively
//! against the keyword it expects in a given grammar position).

use crate::error::ParseError;
use crate::token::{Token, TokenKind};

pub fn lex(input: &str) -> Result<Vec<Token>, ParseError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;

        if c == '\'' {
            let (text, next) = lex_string(input, i)?;
            tokens.push(Token {
                kind: TokenKind::Str(text),
                offset: start,
            });
            i = next;
            continue;
        }

        if c.is_ascii_digit() {
            let (kind, next) = lex_number(input, i);
            tokens.push(Token { kind, offset: start });
            i = next;
            continue;
        }

        if c == '_' || c.is_ascii_alphabetic() {
            let next = find_ident_end(input, i);
            let text = input[i..next].to_string();
            tokens.push(Token {
                kind: TokenKind::Ident(text),
                offset: start,
            });
            i = next;
            continue;
        }

        match c {
            '(' => {
                tokens.push(Token { kind: TokenKind::LParen, offset: start });
                i += 1;
            }
            ')' => {
                tokens.push(Token { kind: TokenKind::RParen, offset: start });
                i += 1;
            }
            ',' => {
                tokens.push(Token { kind: TokenKind::Comma, offset: start });
                i += 1;
            }
            ';' => {
                tokens.push(Token { kind: TokenKind::Semicolon, offset: start });
                i += 1;
            }
            '*' => {
                tokens.push(Token { kind: TokenKind::Star, offset: start });
                i += 1;
            }
            '-' => {
                tokens.push(Token { kind: TokenKind::Minus, offset: start });
                i += 1;
            }
            '=' => {
                tokens.push(Token { kind: TokenKind::Eq, offset: start });
                i += 1;
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::NotEq, offset: start });
                    i += 2;
                } else {
                    return Err(ParseError::new(start, vec!["'!='".into()], "'!'".into()));
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::LtEq, offset: start });
                    i += 2;
                } else if bytes.get(i + 1) == Some(&b'>') {
                    tokens.push(Token { kind: TokenKind::NotEq, offset: start });
                    i += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Lt, offset: start });
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    tokens.push(Token { kind: TokenKind::GtEq, offset: start });
                    i += 2;
                } else {
                    tokens.push(Token { kind: TokenKind::Gt, offset: start });
                    i += 1;
                }
            }
            other => {
                return Err(ParseError::new(
                    start,
                    vec!["a token".into()],
                    format!("'{other}'"),
                ));
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}

fn find_ident_end(input: &str, start: usize) -> usize {
    let bytes = input.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c == '_' || c.is_ascii_alphanumeric() {
            i += 1;
        } else {
            break;
        }
    }
    i
}

fn lex_number(input: &str, start: usize) -> (TokenKind, usize) {
    let bytes = input.as_bytes();
    let mut i = start;
    while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
        i += 1;
    }
    let mut is_decimal = false;
    if i < bytes.len() && bytes[i] == b'.' && i + 1 < bytes.len() && (bytes[i + 1] as char).is_ascii_digit() {
        is_decimal = true;
        i += 1;
        while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
            i += 1;
        }
    }
    let text = &input[start..i];
    if is_decimal {
        (TokenKind::Decimal(text.parse().unwrap_or(0.0)), i)
    } else {
        (TokenKind::Integer(text.parse().unwrap_or(0)), i)
    }
}

/// Lex a single-quoted string starting at `start` (the opening `'`).
/// `''` is an embedded literal quote (spec §4.3).
fn lex_string(input: &str, start: usize) -> Result<(String, usize), ParseError> {
    let bytes = input.as_bytes();
    let mut i = start + 1;
    let mut text = String::new();
    loop {
        if i >= bytes.len() {
            return Err(ParseError::new(
                start,
                vec!["closing \"'\"".into()],
                "end of input".into(),
            ));
        }
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                text.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            break;
        }
        // Re-decode as UTF-8 one char at a time to stay correct on multi-byte input.
        let rest = &input[i..];
        let ch = rest.chars().next().unwrap();
        text.push(ch);
        i += ch.len_utf8();
    }
    Ok((text, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_keywords_as_identifiers() {
        let tokens = lex("SELECT * FROM t").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Ident("SELECT".into()));
        assert_eq!(tokens[1].kind, TokenKind::Star);
    }

    #[test]
    fn lexes_string_with_embedded_quote() {
        let tokens = lex("'it''s'").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Str("it's".into()));
    }

    #[test]
    fn lexes_integer_and_decimal_literals() {
        let tokens = lex("42 3.5").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Integer(42));
        assert_eq!(tokens[1].kind, TokenKind::Decimal(3.5));
    }

    #[test]
    fn lexes_all_comparison_operators() {
        let tokens = lex("= != <> < <= > >=").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::NotEq,
                TokenKind::Lt,
                TokenKind::LtEq,
                TokenKind::Gt,
                TokenKind::GtEq,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_parse_error() {
        assert!(lex("'abc").is_err());
    }

    #[test]
    fn records_byte_offsets() {
        let tokens = lex("  id").unwrap();
        assert_eq!(tokens[0].offset, 2);
    }
}
