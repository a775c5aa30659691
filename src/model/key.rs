//! Row keys drawn from the index column

use std::cmp::Ordering;

use serde::Serialize;

use super::table::{compare_int_float, CellValue};

/// Key of a row, totally ordered so that diff output can be sorted
///
/// Keys of different types sort by type first:
/// empty < bool < number < date < datetime < string.
/// Integers and floats share one numeric ordering, so `1` and `1.0` are the
/// same key.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct RowKey(pub CellValue);

impl RowKey {
    /// The underlying cell value
    pub fn value(&self) -> &CellValue {
        &self.0
    }

    fn rank(&self) -> u8 {
        match self.0 {
            CellValue::Null => 0,
            CellValue::Bool(_) => 1,
            CellValue::Int(_) | CellValue::Float(_) => 2,
            CellValue::Date(_) => 3,
            CellValue::DateTime(_) => 4,
            CellValue::String(_) => 5,
        }
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (CellValue::Bool(a), CellValue::Bool(b)) => a.cmp(b),
            (CellValue::Int(a), CellValue::Int(b)) => a.cmp(b),
            (CellValue::Float(a), CellValue::Float(b)) => compare_floats(*a, *b),
            // NaN sorts after every integer
            (CellValue::Int(a), CellValue::Float(b)) => {
                compare_int_float(*a, *b).unwrap_or(Ordering::Less)
            }
            (CellValue::Float(a), CellValue::Int(b)) => {
                compare_int_float(*b, *a).map_or(Ordering::Greater, Ordering::reverse)
            }
            (CellValue::Date(a), CellValue::Date(b)) => a.cmp(b),
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a.cmp(b),
            (CellValue::String(a), CellValue::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RowKey {}

/// Float ordering where all NaNs are equal and sort last, and `-0.0 == 0.0`
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

impl std::fmt::Display for RowKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl From<CellValue> for RowKey {
    fn from(value: CellValue) -> Self {
        RowKey(value)
    }
}

impl From<&str> for RowKey {
    fn from(s: &str) -> Self {
        RowKey(CellValue::from(s))
    }
}

impl From<String> for RowKey {
    fn from(s: String) -> Self {
        RowKey(CellValue::from(s))
    }
}

impl From<i64> for RowKey {
    fn from(i: i64) -> Self {
        RowKey(CellValue::Int(i))
    }
}
