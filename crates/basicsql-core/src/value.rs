//! Tagged value type and three-valued comparison.

use std::cmp::Ordering;
use std::fmt;

/// A single cell value. Variants mirror the wire/storage tags in
/// `basicsql-storage` (`0=null,1=i32,2=i64,3=real,4=text`).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Null,
    Integer32(i32),
    Integer64(i64),
    Real(f64),
    Text(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer32(_) => "INTEGER",
            Value::Integer64(_) => "LONG",
            Value::Real(_) => "REAL",
            Value::Text(_) => "TEXT",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric value promoted to `f64`, if this value is numeric.
    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer32(v) => Some(*v as f64),
            Value::Integer64(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Three-valued comparison: `None` means "unknown" (either side is NULL).
    ///
    /// Cross-variant numeric comparisons promote to `f64` per spec §3; text
    /// compares by code point; `Null` never orders against anything.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => {
                let (a, b) = (self.as_f64()?, other.as_f64()?);
                a.partial_cmp(&b)
            }
        }
    }

    /// Equality under the same three-valued rules as `partial_compare`.
    pub fn tri_eq(&self, other: &Value) -> Tri {
        if self.is_null() || other.is_null() {
            return Tri::Unknown;
        }
        match self.partial_compare(other) {
            Some(Ordering::Equal) => Tri::True,
            Some(_) => Tri::False,
            None => Tri::Unknown,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer32(v) => write!(f, "{v}"),
            Value::Integer64(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Outcome of evaluating a predicate: the filter step keeps only `True`.
///
/// Kept as an explicit tri-state rather than `Option<bool>` so that `NOT`
/// cannot accidentally fold `Unknown` into `true` (spec §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    True,
    False,
    Unknown,
}

impl Tri {
    pub fn from_bool(b: bool) -> Self {
        if b { Tri::True } else { Tri::False }
    }

    pub fn is_true(self) -> bool {
        matches!(self, Tri::True)
    }

    pub fn and(self, other: Tri) -> Tri {
        use Tri::*;
        match (self, other) {
            (False, _) | (_, False) => False,
            (True, True) => True,
            _ => Unknown,
        }
    }

    pub fn or(self, other: Tri) -> Tri {
        use Tri::*;
        match (self, other) {
            (True, _) | (_, True) => True,
            (False, False) => False,
            _ => Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_width_integers_compare_numerically() {
        let a = Value::Integer32(5);
        let b = Value::Integer64(5);
        assert_eq!(a.partial_compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn real_promotion_orders_correctly() {
        let a = Value::Integer32(2);
        let b = Value::Real(2.5);
        assert_eq!(a.partial_compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn null_comparison_is_unknown() {
        assert_eq!(Value::Null.partial_compare(&Value::Integer32(1)), None);
        assert_eq!(Value::Null.tri_eq(&Value::Integer32(1)), Tri::Unknown);
    }

    #[test]
    fn tri_and_or_short_circuit_on_false_true() {
        assert_eq!(Tri::False.and(Tri::Unknown), Tri::False);
        assert_eq!(Tri::True.or(Tri::Unknown), Tri::True);
        assert_eq!(Tri::Unknown.and(Tri::True), Tri::Unknown);
    }

    #[test]
    fn text_compares_by_code_point() {
        let a = Value::Text("a".into());
        let b = Value::Text("b".into());
        assert_eq!(a.partial_compare(&b), Some(Ordering::Less));
    }
}
