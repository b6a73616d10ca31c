//! Abstract syntax tree for the supported statement set (spec §4.3).

use basicsql_core::DataType;

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        values: Vec<Literal>,
    },
    Select {
        columns: SelectColumns,
        table: String,
        predicate: Option<Predicate>,
        order_by: Option<OrderBy>,
        limit: Option<i64>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Literal)>,
        predicate: Option<Predicate>,
    },
    Delete {
        table: String,
        predicate: Option<Predicate>,
    },
    ShowTables,
    ShowDatabases,
    Use {
        database: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectColumns {
    All,
    Named(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
}

/// A literal as it appears in source text, before coercion to a column's
/// declared type (spec §4.4 does the coercion, not the parser).
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Integer(i128),
    Decimal(f64),
    Str(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Like,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Compare {
        column: String,
        op: CompareOp,
        literal: Literal,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}
