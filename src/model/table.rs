//! Cell, Row, and Dataset data structures

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::key::RowKey;

/// A cell value with type information
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// The empty sentinel
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(Cow<'static, str>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl PartialEq for CellValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (CellValue::Null, CellValue::Null) => true,
            (CellValue::Bool(a), CellValue::Bool(b)) => a == b,
            (CellValue::Int(a), CellValue::Int(b)) => a == b,
            (CellValue::Float(a), CellValue::Float(b)) => {
                // Handle NaN comparison
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (CellValue::String(a), CellValue::String(b)) => a == b,
            (CellValue::Date(a), CellValue::Date(b)) => a == b,
            (CellValue::DateTime(a), CellValue::DateTime(b)) => a == b,
            // Spreadsheets store every number as a double
            (CellValue::Int(a), CellValue::Float(b)) | (CellValue::Float(b), CellValue::Int(a)) => {
                compare_int_float(*a, *b) == Some(Ordering::Equal)
            }
            _ => false,
        }
    }
}

impl Eq for CellValue {}

/// Exact ordering of an integer against a float, `None` when the float is NaN
///
/// Casting the integer to `f64` rounds above 2^53 and would make distinct
/// integers equal to the same float.
pub(crate) fn compare_int_float(i: i64, f: f64) -> Option<Ordering> {
    // 2^63, the first float past i64::MAX
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;

    if f.is_nan() {
        return None;
    }
    if f >= LIMIT {
        return Some(Ordering::Less);
    }
    if f < -LIMIT {
        return Some(Ordering::Greater);
    }

    let whole = f.trunc();
    Some(match i.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&f).unwrap_or(Ordering::Equal),
        unequal => unequal,
    })
}

impl CellValue {
    /// Check if the value is the empty sentinel
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Canonical textual form, used for rendering changed cells
    pub fn display(&self) -> Cow<'_, str> {
        match self {
            CellValue::Null => Cow::Borrowed(""),
            CellValue::Bool(b) => Cow::Owned(b.to_string()),
            CellValue::Int(i) => Cow::Owned(i.to_string()),
            CellValue::Float(f) => Cow::Owned(f.to_string()),
            CellValue::String(s) => Cow::Borrowed(s.as_ref()),
            CellValue::Date(d) => Cow::Owned(d.to_string()),
            CellValue::DateTime(dt) => Cow::Owned(dt.to_string()),
        }
    }

    /// Whether this is text containing `needle`
    pub fn text_contains(&self, needle: char) -> bool {
        match self {
            CellValue::String(s) => s.contains(needle),
            _ => false,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(Cow::Owned(s.to_string()))
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::String(Cow::Owned(s))
    }
}

impl From<i64> for CellValue {
    fn from(i: i64) -> Self {
        CellValue::Int(i)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Float(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl<T> From<Option<T>> for CellValue
where
    T: Into<CellValue>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => CellValue::Null,
        }
    }
}

/// A keyed row of a dataset
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Value of the index column
    pub key: RowKey,
    /// Cell values in the dataset's column order, index column excluded
    pub cells: Vec<CellValue>,
    /// Original line/row number in source file (1-indexed)
    pub source_line: usize,
}

impl Row {
    /// Get a cell value by column index
    pub fn get(&self, index: usize) -> Option<&CellValue> {
        self.cells.get(index)
    }
}

/// A keyed table: one comparison input
///
/// Rows keep their source order; lookups by key go through an ordered index,
/// so iterating [`Dataset::iter_by_key`] yields rows in ascending key order.
/// When a key repeats, the last row wins for lookups and the key is recorded
/// in [`Dataset::duplicate_keys`].
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Display name, usually the source file stem
    pub name: String,
    /// Name of the index column the keys were drawn from
    pub key_column: String,
    /// Value column names, index column excluded
    pub columns: Vec<String>,
    /// All rows in source order
    pub rows: Vec<Row>,
    index: BTreeMap<RowKey, usize>,
    duplicate_keys: Vec<RowKey>,
}

impl Dataset {
    /// Create an empty dataset
    pub fn new(name: impl Into<String>, key_column: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            key_column: key_column.into(),
            columns,
            rows: Vec::new(),
            index: BTreeMap::new(),
            duplicate_keys: Vec::new(),
        }
    }

    /// Add a row; short rows are padded with the empty sentinel
    pub fn add_row(&mut self, key: RowKey, mut cells: Vec<CellValue>, source_line: usize) {
        if cells.len() < self.columns.len() {
            cells.resize(self.columns.len(), CellValue::Null);
        }

        let idx = self.rows.len();
        if self.index.insert(key.clone(), idx).is_some() {
            self.duplicate_keys.push(key.clone());
        }
        self.rows.push(Row {
            key,
            cells,
            source_line,
        });
    }

    /// Builder-style variant of [`Dataset::add_row`]
    pub fn with_row(mut self, key: impl Into<RowKey>, cells: Vec<CellValue>) -> Self {
        let line = self.rows.len() + 2;
        self.add_row(key.into(), cells, line);
        self
    }

    /// Look up a row by key
    pub fn get(&self, key: &RowKey) -> Option<&Row> {
        self.index.get(key).map(|&idx| &self.rows[idx])
    }

    /// Check whether a key is present
    pub fn contains_key(&self, key: &RowKey) -> bool {
        self.index.contains_key(key)
    }

    /// Rows in ascending key order, one per distinct key
    pub fn iter_by_key(&self) -> impl Iterator<Item = &Row> {
        self.index.values().map(move |&idx| &self.rows[idx])
    }

    /// Keys in ascending order
    pub fn keys(&self) -> impl Iterator<Item = &RowKey> {
        self.index.keys()
    }

    /// Keys that appeared more than once, in the order they were repeated
    pub fn duplicate_keys(&self) -> &[RowKey] {
        &self.duplicate_keys
    }

    /// Get column index by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows, duplicates included
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Number of value columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cross_type_numeric_equality() {
        assert_eq!(CellValue::Int(3), CellValue::Float(3.0));
        assert_ne!(CellValue::Int(3), CellValue::from("3"));
        assert_eq!(CellValue::Float(f64::NAN), CellValue::Float(f64::NAN));
        assert_ne!(CellValue::Int(3), CellValue::Float(3.5));
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let two_53 = 1i64 << 53;
        let float = CellValue::Float(two_53 as f64);

        assert_eq!(CellValue::Int(two_53), float);
        assert_ne!(CellValue::Int(two_53 + 1), float);
        assert_ne!(float, CellValue::Int(two_53 + 1));
        assert_ne!(CellValue::Int(i64::MAX), CellValue::Float(i64::MAX as f64));
    }

    #[test]
    fn test_compare_int_float() {
        assert_eq!(compare_int_float(2, 2.5), Some(Ordering::Less));
        assert_eq!(compare_int_float(3, 2.5), Some(Ordering::Greater));
        assert_eq!(compare_int_float(-2, -2.5), Some(Ordering::Greater));
        assert_eq!(compare_int_float(-3, -2.5), Some(Ordering::Less));
        assert_eq!(compare_int_float(-2, -2.0), Some(Ordering::Equal));
        assert_eq!(compare_int_float(i64::MAX, 1e19), Some(Ordering::Less));
        assert_eq!(compare_int_float(i64::MIN, -1e19), Some(Ordering::Greater));
        assert_eq!(compare_int_float(0, f64::NAN), None);
    }

    #[test]
    fn test_null_displays_empty() {
        assert_eq!(CellValue::Null.display(), "");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
    }

    #[test]
    fn test_rows_iterate_by_key() {
        let ds = Dataset::new("t", "id", columns(&["x"]))
            .with_row("c", vec![CellValue::Int(3)])
            .with_row("a", vec![CellValue::Int(1)])
            .with_row("b", vec![CellValue::Int(2)]);

        let keys: Vec<String> = ds.iter_by_key().map(|r| r.key.to_string()).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(ds.rows[0].key, RowKey::from("c"));
    }

    #[test]
    fn test_short_rows_are_padded() {
        let ds = Dataset::new("t", "id", columns(&["x", "y", "z"]))
            .with_row(1i64, vec![CellValue::Int(1)]);

        let row = ds.get(&RowKey::from(1i64)).unwrap();
        assert_eq!(row.cells.len(), 3);
        assert!(row.get(2).unwrap().is_null());
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let ds = Dataset::new("t", "id", columns(&["x"]))
            .with_row("a", vec![CellValue::Int(1)])
            .with_row("a", vec![CellValue::Int(2)]);

        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.key_count(), 1);
        assert_eq!(ds.duplicate_keys(), &[RowKey::from("a")]);
        assert_eq!(ds.get(&RowKey::from("a")).unwrap().cells[0], CellValue::Int(2));
    }
}
