//! Column definitions and schema-level invariants (spec §3).

use crate::error::{Error, Result};
use crate::value::Value;

/// Declared column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataType {
    Integer,
    Long,
    Text,
    Real,
}

impl DataType {
    pub fn name(self) -> &'static str {
        match self {
            DataType::Integer => "INTEGER",
            DataType::Long => "LONG",
            DataType::Text => "TEXT",
            DataType::Real => "REAL",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INTEGER" => Some(DataType::Integer),
            "LONG" => Some(DataType::Long),
            "TEXT" => Some(DataType::Text),
            "REAL" => Some(DataType::Real),
            _ => None,
        }
    }

    /// Whether a bare `Value` variant is an acceptable storage shape for this
    /// declared type (distinct from literal coercion, which happens earlier).
    pub fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (DataType::Integer, Value::Integer32(_)) => true,
            (DataType::Long, Value::Integer64(_)) => true,
            (DataType::Long, Value::Integer32(_)) => true,
            (DataType::Real, Value::Real(_)) => true,
            (DataType::Real, Value::Integer32(_)) => true,
            (DataType::Real, Value::Integer64(_)) => true,
            (DataType::Text, Value::Text(_)) => true,
            _ => false,
        }
    }
}

/// A column definition. Name matching is case-insensitive but first-seen
/// casing is preserved in storage (spec §4.2).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub not_null: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
            primary_key: false,
            auto_increment: false,
        }
    }

    pub fn name_eq(&self, other: &str) -> bool {
        self.name.eq_ignore_ascii_case(other)
    }

    /// Validate this single column's flag combination (spec §3):
    /// `primary_key` implies `not_null`; `auto_increment` implies `not_null`
    /// and a declared type of INTEGER or LONG.
    pub fn validate(&self) -> Result<()> {
        if self.primary_key && !self.not_null {
            return Err(Error::InvalidFlagCombination(format!(
                "{}: PRIMARY KEY implies NOT NULL",
                self.name
            )));
        }
        if self.auto_increment {
            if !self.not_null {
                return Err(Error::InvalidFlagCombination(format!(
                    "{}: AUTO_INCREMENT implies NOT NULL",
                    self.name
                )));
            }
            if !matches!(self.data_type, DataType::Integer | DataType::Long) {
                return Err(Error::InvalidFlagCombination(format!(
                    "{}: AUTO_INCREMENT requires INTEGER or LONG",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

/// Validate a whole column list: per-column invariants, no duplicate names
/// (case-insensitive), at most one primary key, at most one auto-increment.
pub fn validate_columns(columns: &[Column]) -> Result<()> {
    for column in columns {
        column.validate()?;
    }

    let mut seen = std::collections::HashSet::new();
    for column in columns {
        let key = column.name.to_ascii_lowercase();
        if !seen.insert(key) {
            return Err(Error::DuplicateColumn(column.name.clone()));
        }
    }

    let primary_keys = columns.iter().filter(|c| c.primary_key).count();
    if primary_keys > 1 {
        return Err(Error::InvalidFlagCombination(
            "at most one column may be PRIMARY KEY".into(),
        ));
    }
    let auto_increments = columns.iter().filter(|c| c.auto_increment).count();
    if auto_increments > 1 {
        return Err(Error::InvalidFlagCombination(
            "at most one column may be AUTO_INCREMENT".into(),
        ));
    }

    Ok(())
}

/// Validate a full row against its schema: arity, per-column type/nullability.
pub fn validate_row(columns: &[Column], row: &[Value]) -> Result<()> {
    if row.len() != columns.len() {
        return Err(Error::ArityMismatch {
            expected: columns.len(),
            found: row.len(),
        });
    }
    for (column, value) in columns.iter().zip(row.iter()) {
        if value.is_null() {
            if column.not_null {
                return Err(Error::NullViolation(column.name.clone()));
            }
            continue;
        }
        if !column.data_type.accepts(value) {
            return Err(Error::TypeMismatch {
                column: column.name.clone(),
                expected: column.data_type.name(),
                found: value.type_name(),
            });
        }
    }
    Ok(())
}
