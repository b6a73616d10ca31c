//! Turns a parsed statement into a result or mutation against the catalog
//! and table layer (spec §4.4).

use std::cmp::Ordering;
use std::sync::Arc;

use basicsql_catalog::Catalog;
use basicsql_core::{Column, DataType, Tri, Value};
use basicsql_sql::{CompareOp, Literal, OrderBy, Predicate, SelectColumns, Statement};
use basicsql_storage::{Row, TableFile};

use crate::error::{Error, Result};
use crate::result::SqlResult;
use crate::session::Session;

pub fn dispatch(catalog: &Catalog, session: &mut Session, statement: Statement) -> Result<SqlResult> {
    match statement {
        Statement::CreateTable { table, columns } => create_table(catalog, session, table, columns),
        Statement::Insert { table, columns, values } => insert(catalog, session, table, columns, values),
        Statement::Select { columns, table, predicate, order_by, limit } => {
            select(catalog, session, table, columns, predicate, order_by, limit)
        }
        Statement::Update { table, assignments, predicate } => {
            update(catalog, session, table, assignments, predicate)
        }
        Statement::Delete { table, predicate } => delete(catalog, session, table, predicate),
        Statement::ShowTables => {
            let tables = catalog.list_tables(session.database())?;
            Ok(SqlResult::Tables(tables))
        }
        Statement::ShowDatabases => Ok(SqlResult::Databases(catalog.list_databases())),
        Statement::Use { database } => {
            let canonical = catalog.use_database(&database)?;
            session.set_database(canonical);
            Ok(SqlResult::Ok)
        }
    }
}

fn create_table(
    catalog: &Catalog,
    session: &Session,
    table: String,
    columns: Vec<basicsql_sql::ColumnDef>,
) -> Result<SqlResult> {
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|c| Column {
            name: c.name,
            data_type: c.data_type,
            not_null: c.not_null,
            primary_key: c.primary_key,
            auto_increment: c.auto_increment,
        })
        .collect();
    catalog.create_table(session.database(), &table, columns)?;
    Ok(SqlResult::Mutation { rows_affected: 0, generated: None })
}

fn insert(
    catalog: &Catalog,
    session: &Session,
    table: String,
    columns: Option<Vec<String>>,
    values: Vec<Literal>,
) -> Result<SqlResult> {
    let table_file = catalog.get_table(session.database(), &table)?;
    let schema = table_file.columns();

    let target_names = columns.unwrap_or_else(|| schema.iter().map(|c| c.name.clone()).collect());
    if target_names.len() != values.len() {
        return Err(Error::Schema(basicsql_core::Error::ArityMismatch {
            expected: target_names.len(),
            found: values.len(),
        }));
    }

    let mut row: Vec<Option<Value>> = vec![None; schema.len()];
    let mut explicit = vec![false; schema.len()];
    for (name, literal) in target_names.into_iter().zip(values.into_iter()) {
        let idx = column_index(&schema, &name)?;
        let value = coerce_literal(&literal, &schema[idx])?;
        row[idx] = Some(value);
        explicit[idx] = true;
    }

    let mut generated = None;
    for (idx, column) in schema.iter().enumerate() {
        if let Some(value) = &row[idx] {
            if column.auto_increment && explicit[idx] {
                if let Some(n) = as_i64(value) {
                    table_file.bump_auto_at_least(n)?;
                }
            }
            continue;
        }
        if column.auto_increment {
            let next = table_file.next_auto()?;
            let value = match column.data_type {
                DataType::Long => Value::Integer64(next),
                _ => Value::Integer32(next as i32),
            };
            generated = Some((column.name.clone(), value.clone()));
            row[idx] = Some(value);
        } else if column.not_null {
            return Err(Error::Schema(basicsql_core::Error::NullViolation(column.name.clone())));
        } else {
            row[idx] = Some(Value::Null);
        }
    }

    let row: Vec<Value> = row.into_iter().map(|v| v.unwrap_or(Value::Null)).collect();
    table_file.insert(row)?;
    Ok(SqlResult::Mutation { rows_affected: 1, generated })
}

fn select(
    catalog: &Catalog,
    session: &Session,
    table: String,
    columns: SelectColumns,
    predicate: Option<Predicate>,
    order_by: Option<OrderBy>,
    limit: Option<i64>,
) -> Result<SqlResult> {
    let table_file = catalog.get_table(session.database(), &table)?;
    let schema = table_file.columns();

    let mut matching = filter_rows(&table_file, &schema, predicate.as_ref())?;

    if let Some(order) = &order_by {
        let idx = column_index(&schema, &order.column)?;
        matching.sort_by(|a, b| compare_for_order(&a.values[idx], &b.values[idx], order.descending));
    }

    if let Some(limit) = limit {
        let limit = limit.max(0) as usize;
        matching.truncate(limit);
    }

    let output_names: Vec<String> = match &columns {
        SelectColumns::All => schema.iter().map(|c| c.name.clone()).collect(),
        SelectColumns::Named(names) => names.clone(),
    };
    let output_indices: Vec<usize> = output_names
        .iter()
        .map(|name| column_index(&schema, name))
        .collect::<Result<Vec<_>>>()?;

    let rows: Vec<Vec<Value>> = matching
        .into_iter()
        .map(|row| output_indices.iter().map(|&i| row.values[i].clone()).collect())
        .collect();

    Ok(SqlResult::Rows { columns: output_names, rows })
}

fn update(
    catalog: &Catalog,
    session: &Session,
    table: String,
    assignments: Vec<(String, Literal)>,
    predicate: Option<Predicate>,
) -> Result<SqlResult> {
    let table_file = catalog.get_table(session.database(), &table)?;
    let schema = table_file.columns();

    let mut resolved = Vec::with_capacity(assignments.len());
    for (name, literal) in assignments {
        let idx = column_index(&schema, &name)?;
        let value = coerce_literal(&literal, &schema[idx])?;
        resolved.push((idx, value));
    }

    let matching = filter_rows(&table_file, &schema, predicate.as_ref())?;
    let mut count = 0u64;
    for row in matching {
        let mut new_values = row.values.clone();
        for (idx, value) in &resolved {
            new_values[*idx] = value.clone();
            if schema[*idx].auto_increment {
                if let Some(n) = as_i64(value) {
                    table_file.bump_auto_at_least(n)?;
                }
            }
        }
        table_file.update(row.row_id, new_values)?;
        count += 1;
    }
    Ok(SqlResult::Mutation { rows_affected: count, generated: None })
}

fn delete(
    catalog: &Catalog,
    session: &Session,
    table: String,
    predicate: Option<Predicate>,
) -> Result<SqlResult> {
    let table_file = catalog.get_table(session.database(), &table)?;
    let schema = table_file.columns();
    let matching = filter_rows(&table_file, &schema, predicate.as_ref())?;
    let mut count = 0u64;
    for row in matching {
        table_file.delete(row.row_id)?;
        count += 1;
    }
    Ok(SqlResult::Mutation { rows_affected: count, generated: None })
}

fn filter_rows(table_file: &Arc<TableFile>, schema: &[Column], predicate: Option<&Predicate>) -> Result<Vec<Row>> {
    let rows = table_file.scan()?;
    let Some(predicate) = predicate else {
        return Ok(rows);
    };
    let mut matched = Vec::new();
    for row in rows {
        if eval_predicate(predicate, schema, &row.values)?.is_true() {
            matched.push(row);
        }
    }
    Ok(matched)
}

fn eval_predicate(predicate: &Predicate, schema: &[Column], row: &[Value]) -> Result<Tri> {
    match predicate {
        Predicate::And(left, right) => {
            Ok(eval_predicate(left, schema, row)?.and(eval_predicate(right, schema, row)?))
        }
        Predicate::Or(left, right) => {
            Ok(eval_predicate(left, schema, row)?.or(eval_predicate(right, schema, row)?))
        }
        Predicate::Compare { column, op, literal } => {
            let idx = column_index(schema, column)?;
            let cell = &row[idx];
            let operand = literal_to_value(literal);
            Ok(compare(cell, *op, &operand))
        }
    }
}

fn compare(cell: &Value, op: CompareOp, operand: &Value) -> Tri {
    match op {
        CompareOp::Eq => cell.tri_eq(operand),
        CompareOp::NotEq => match cell.tri_eq(operand) {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Unknown => Tri::Unknown,
        },
        CompareOp::Lt => order_tri(cell, operand, |o| o == Ordering::Less),
        CompareOp::LtEq => order_tri(cell, operand, |o| o != Ordering::Greater),
        CompareOp::Gt => order_tri(cell, operand, |o| o == Ordering::Greater),
        CompareOp::GtEq => order_tri(cell, operand, |o| o != Ordering::Less),
        CompareOp::Like => match (cell, operand) {
            (Value::Null, _) | (_, Value::Null) => Tri::Unknown,
            (Value::Text(text), Value::Text(pattern)) => Tri::from_bool(like_match(text, pattern)),
            _ => Tri::Unknown,
        },
    }
}

fn order_tri(a: &Value, b: &Value, accept: impl Fn(Ordering) -> bool) -> Tri {
    match a.partial_compare(b) {
        Some(ordering) => Tri::from_bool(accept(ordering)),
        None => Tri::Unknown,
    }
}

/// `%` matches zero or more characters, `_` matches exactly one; no escape
/// character (spec §4.3).
fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    like_match_from(&text, 0, &pattern, 0)
}

fn like_match_from(text: &[char], ti: usize, pattern: &[char], pi: usize) -> bool {
    if pi == pattern.len() {
        return ti == text.len();
    }
    match pattern[pi] {
        '%' => {
            for skip in 0..=(text.len() - ti) {
                if like_match_from(text, ti + skip, pattern, pi + 1) {
                    return true;
                }
            }
            false
        }
        '_' => ti < text.len() && like_match_from(text, ti + 1, pattern, pi + 1),
        c => ti < text.len() && text[ti] == c && like_match_from(text, ti + 1, pattern, pi + 1),
    }
}

fn compare_for_order(a: &Value, b: &Value, descending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = a.partial_compare(b).unwrap_or(Ordering::Equal);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        }
    }
}

fn column_index(schema: &[Column], name: &str) -> Result<usize> {
    schema
        .iter()
        .position(|c| c.name_eq(name))
        .ok_or_else(|| Error::UnknownColumn(name.to_string()))
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer32(v) => Some(*v as i64),
        Value::Integer64(v) => Some(*v),
        _ => None,
    }
}

/// Untyped literal-to-value conversion used for predicate comparisons, where
/// cross-variant numeric promotion (spec §3) does the rest of the work.
fn literal_to_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Decimal(n) => Value::Real(*n),
        Literal::Str(s) => Value::Text(s.clone()),
        Literal::Integer(n) => {
            if let Ok(v) = i32::try_from(*n) {
                Value::Integer32(v)
            } else if let Ok(v) = i64::try_from(*n) {
                Value::Integer64(v)
            } else {
                Value::Real(*n as f64)
            }
        }
    }
}

/// Typed literal coercion for INSERT/UPDATE against a column's declared type
/// (spec §4.4).
fn coerce_literal(literal: &Literal, column: &Column) -> Result<Value> {
    if matches!(literal, Literal::Null) {
        return Ok(Value::Null);
    }
    let value = match (column.data_type, literal) {
        (DataType::Integer, Literal::Integer(n)) => i32::try_from(*n).map(Value::Integer32).map_err(|_| {
            basicsql_core::Error::TypeMismatch {
                column: column.name.clone(),
                expected: "INTEGER",
                found: "LONG",
            }
        })?,
        (DataType::Long, Literal::Integer(n)) => i64::try_from(*n).map(Value::Integer64).map_err(|_| {
            basicsql_core::Error::TypeMismatch {
                column: column.name.clone(),
                expected: "LONG",
                found: "out-of-range integer",
            }
        })?,
        (DataType::Real, Literal::Integer(n)) => Value::Real(*n as f64),
        (DataType::Real, Literal::Decimal(n)) => Value::Real(*n),
        (DataType::Text, Literal::Str(s)) => Value::Text(s.clone()),
        _ => {
            return Err(Error::Schema(basicsql_core::Error::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type.name(),
                found: literal_type_name(literal),
            }))
        }
    };
    Ok(value)
}

fn literal_type_name(literal: &Literal) -> &'static str {
    match literal {
        Literal::Integer(_) => "INTEGER",
        Literal::Decimal(_) => "REAL",
        Literal::Str(_) => "TEXT",
        Literal::Null => "NULL",
    }
}
