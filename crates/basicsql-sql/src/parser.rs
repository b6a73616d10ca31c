//! Recursive-descent parser for the BasicSQL grammar (spec §4.3).
//!
//! `AND` binds tighter than `OR`; parenthesized predicates are accepted even
//! though the grammar does not require them.

use basicsql_core::DataType;

use crate::ast::{ColumnDef, CompareOp, Literal, OrderBy, Predicate, SelectColumns, Statement};
use crate::error::{ParseError, Result};
use crate::lexer::lex;
use crate::token::{Token, TokenKind};

pub fn parse(sql: &str) -> Result<Statement> {
    let tokens = lex(sql)?;
    let mut parser = Parser { tokens, pos: 0 };
    let statement = parser.parse_statement()?;
    parser.eat(&TokenKind::Semicolon);
    parser.expect_eof()?;
    Ok(statement)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error_expected(vec![kind.describe()]))
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.peek().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error_expected(vec!["end of statement".into()]))
        }
    }

    fn error_expected(&self, expected: Vec<String>) -> ParseError {
        ParseError::new(self.peek().offset, expected, self.peek().kind.describe())
    }

    /// Consume an identifier that matches `keyword` case-insensitively.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let TokenKind::Ident(s) = &self.peek().kind {
            if s.eq_ignore_ascii_case(keyword) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_expected(vec![format!("keyword {keyword}")]))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().kind.clone() {
            TokenKind::Ident(s) => {
                self.advance();
                Ok(s)
            }
            _ => Err(self.error_expected(vec!["identifier".into()])),
        }
    }

    fn parse_statement(&mut self) -> Result<Statement> {
        if self.eat_keyword("CREATE") {
            self.expect_keyword("TABLE")?;
            return self.parse_create_table();
        }
        if self.eat_keyword("INSERT") {
            self.expect_keyword("INTO")?;
            return self.parse_insert();
        }
        if self.eat_keyword("SELECT") {
            return self.parse_select();
        }
        if self.eat_keyword("UPDATE") {
            return self.parse_update();
        }
        if self.eat_keyword("DELETE") {
            self.expect_keyword("FROM")?;
            return self.parse_delete();
        }
        if self.eat_keyword("SHOW") {
            if self.eat_keyword("TABLES") {
                return Ok(Statement::ShowTables);
            }
            if self.eat_keyword("DATABASES") {
                return Ok(Statement::ShowDatabases);
            }
            return Err(self.error_expected(vec!["TABLES".into(), "DATABASES".into()]));
        }
        if self.eat_keyword("USE") {
            let database = self.expect_ident()?;
            return Ok(Statement::Use { database });
        }
        Err(self.error_expected(vec![
            "CREATE".into(),
            "INSERT".into(),
            "SELECT".into(),
            "UPDATE".into(),
            "DELETE".into(),
            "SHOW".into(),
            "USE".into(),
        ]))
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        let table = self.expect_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut columns = Vec::new();
        loop {
            columns.push(self.parse_column_def()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        self.expect(TokenKind::RParen)?;
        Ok(Statement::CreateTable { table, columns })
    }

    fn parse_column_def(&mut self) -> Result<ColumnDef> {
        let name = self.expect_ident()?;
        let data_type = self.parse_data_type()?;
        let mut column = ColumnDef {
            name,
            data_type,
            not_null: false,
            primary_key: false,
            auto_increment: false,
        };
        loop {
            if self.eat_keyword("NOT") {
                self.expect_keyword("NULL")?;
                column.not_null = true;
            } else if self.eat_keyword("PRIMARY") {
                self.expect_keyword("KEY")?;
                column.primary_key = true;
            } else if self.eat_keyword("AUTO_INCREMENT") {
                column.auto_increment = true;
            } else {
                break;
            }
        }
        Ok(column)
    }

    fn parse_data_type(&mut self) -> Result<DataType> {
        for (keyword, ty) in [
            ("INTEGER", DataType::Integer),
            ("LONG", DataType::Long),
            ("TEXT", DataType::Text),
            ("REAL", DataType::Real),
        ] {
            if self.eat_keyword(keyword) {
                return Ok(ty);
            }
        }
        Err(self.error_expected(vec![
            "INTEGER".into(),
            "LONG".into(),
            "TEXT".into(),
            "REAL".into(),
        ]))
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        let table = self.expect_ident()?;
        let mut columns = None;
        if self.eat(&TokenKind::LParen) {
            let mut names = Vec::new();
            loop {
                names.push(self.expect_ident()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RParen)?;
            columns = Some(names);
        }
        self.expect_keyword("VALUES")?;
        self.expect(TokenKind::LParen)?;
        let mut values = Vec::new();
        loop {
            values.push(self.parse_literal()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        self.expect(TokenKind::RParen)?;
        Ok(Statement::Insert {
            table,
            columns,
            values,
        })
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        if self.eat_keyword("NULL") {
            return Ok(Literal::Null);
        }
        let negative = self.eat(&TokenKind::Minus);
        match self.peek().kind.clone() {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Literal::Integer(if negative { -n } else { n }))
            }
            TokenKind::Decimal(n) => {
                self.advance();
                Ok(Literal::Decimal(if negative { -n } else { n }))
            }
            TokenKind::Str(s) => {
                if negative {
                    return Err(self.error_expected(vec!["a number after '-'".into()]));
                }
                self.advance();
                Ok(Literal::Str(s))
            }
            _ => Err(self.error_expected(vec!["a literal".into()])),
        }
    }

    fn parse_select(&mut self) -> Result<Statement> {
        let columns = if self.eat(&TokenKind::Star) {
            SelectColumns::All
        } else {
            let mut names = vec![self.expect_ident()?];
            while self.eat(&TokenKind::Comma) {
                names.push(self.expect_ident()?);
            }
            SelectColumns::Named(names)
        };
        self.expect_keyword("FROM")?;
        let table = self.expect_ident()?;

        let predicate = if self.eat_keyword("WHERE") {
            Some(self.parse_predicate()?)
        } else {
            None
        };

        let order_by = if self.eat_keyword("ORDER") {
            self.expect_keyword("BY")?;
            let column = self.expect_ident()?;
            let descending = if self.eat_keyword("DESC") {
                true
            } else {
                self.eat_keyword("ASC");
                false
            };
            Some(OrderBy { column, descending })
        } else {
            None
        };

        let limit = if self.eat_keyword("LIMIT") {
            match self.peek().kind.clone() {
                TokenKind::Integer(n) => {
                    self.advance();
                    Some(n as i64)
                }
                _ => return Err(self.error_expected(vec!["an integer".into()])),
            }
        } else {
            None
        };

        Ok(Statement::Select {
            columns,
            table,
            predicate,
            order_by,
            limit,
        })
    }

    fn parse_update(&mut self) -> Result<Statement> {
        let table = self.expect_ident()?;
        self.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.expect_ident()?;
            self.expect(TokenKind::Eq)?;
            let literal = self.parse_literal()?;
            assignments.push((column, literal));
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            break;
        }
        let predicate = if self.eat_keyword("WHERE") {
            Some(self.parse_predicate()?)
        } else {
            None
        };
        Ok(Statement::Update {
            table,
            assignments,
            predicate,
        })
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        let table = self.expect_ident()?;
        let predicate = if self.eat_keyword("WHERE") {
            Some(self.parse_predicate()?)
        } else {
            None
        };
        Ok(Statement::Delete { table, predicate })
    }

    /// `<term> (AND|OR <term>)*` with `AND` binding tighter than `OR`.
    fn parse_predicate(&mut self) -> Result<Predicate> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Predicate> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("OR") {
            let right = self.parse_and()?;
            left = Predicate::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut left = self.parse_term()?;
        while self.eat_keyword("AND") {
            let right = self.parse_term()?;
            left = Predicate::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Predicate> {
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_predicate()?;
            self.expect(TokenKind::RParen)?;
            return Ok(inner);
        }
        let column = self.expect_ident()?;
        let op = self.parse_compare_op()?;
        let literal = self.parse_literal()?;
        Ok(Predicate::Compare { column, op, literal })
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp> {
        if self.eat_keyword("LIKE") {
            return Ok(CompareOp::Like);
        }
        let op = match self.peek().kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::NotEq => CompareOp::NotEq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::LtEq => CompareOp::LtEq,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::GtEq => CompareOp::GtEq,
            _ => {
                return Err(self.error_expected(vec![
                    "'='".into(),
                    "'!='".into(),
                    "'<>'".into(),
                    "'<'".into(),
                    "'<='".into(),
                    "'>'".into(),
                    "'>='".into(),
                    "LIKE".into(),
                ]))
            }
        };
        self.advance();
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create_table_with_flags() {
        let stmt = parse(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTO_INCREMENT, name TEXT NOT NULL)",
        )
        .unwrap();
        match stmt {
            Statement::CreateTable { table, columns } => {
                assert_eq!(table, "t");
                assert_eq!(columns.len(), 2);
                assert!(columns[0].primary_key && columns[0].auto_increment);
                assert!(columns[1].not_null);
            }
            _ => panic!("wrong statement kind"),
        }
    }

    #[test]
    fn parses_insert_with_explicit_columns() {
        let stmt = parse("INSERT INTO t (name) VALUES ('a')").unwrap();
        match stmt {
            Statement::Insert { table, columns, values } => {
                assert_eq!(table, "t");
                assert_eq!(columns, Some(vec!["name".to_string()]));
                assert_eq!(values, vec![Literal::Str("a".into())]);
            }
            _ => panic!("wrong statement kind"),
        }
    }

    #[test]
    fn parses_select_with_where_order_limit() {
        let stmt =
            parse("SELECT * FROM t WHERE id >= 2 AND name != 'x' ORDER BY id DESC LIMIT 5")
                .unwrap();
        match stmt {
            Statement::Select {
                columns,
                predicate,
                order_by,
                limit,
                ..
            } => {
                assert_eq!(columns, SelectColumns::All);
                assert!(predicate.is_some());
                assert_eq!(
                    order_by,
                    Some(OrderBy {
                        column: "id".into(),
                        descending: true
                    })
                );
                assert_eq!(limit, Some(5));
            }
            _ => panic!("wrong statement kind"),
        }
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let stmt = parse("SELECT * FROM t WHERE a = 1 OR b = 2 AND c = 3").unwrap();
        let Statement::Select { predicate: Some(p), .. } = stmt else {
            panic!("expected select with predicate")
        };
        match p {
            Predicate::Or(left, right) => {
                assert!(matches!(*left, Predicate::Compare { .. }));
                assert!(matches!(*right, Predicate::And(_, _)));
            }
            _ => panic!("expected top-level OR"),
        }
    }

    #[test]
    fn parenthesized_predicate_is_accepted() {
        let stmt = parse("SELECT * FROM t WHERE (a = 1 OR b = 2) AND c = 3").unwrap();
        let Statement::Select { predicate: Some(p), .. } = stmt else {
            panic!("expected select with predicate")
        };
        assert!(matches!(p, Predicate::And(_, _)));
    }

    #[test]
    fn negative_integer_literal_parses() {
        let stmt = parse("SELECT * FROM t WHERE a = -5").unwrap();
        let Statement::Select { predicate: Some(Predicate::Compare { literal, .. }), .. } = stmt
        else {
            panic!("expected compare predicate")
        };
        assert_eq!(literal, Literal::Integer(-5));
    }

    #[test]
    fn parse_error_reports_offset_and_expected() {
        let err = parse("CREATE TALBE t (id INTEGER)").unwrap_err();
        assert_eq!(err.offset, 7);
        assert!(!err.expected.is_empty());
    }

    #[test]
    fn show_tables_and_databases_and_use() {
        assert_eq!(parse("SHOW TABLES").unwrap(), Statement::ShowTables);
        assert_eq!(parse("SHOW DATABASES").unwrap(), Statement::ShowDatabases);
        assert_eq!(
            parse("USE mydb").unwrap(),
            Statement::Use { database: "mydb".into() }
        );
    }
}
