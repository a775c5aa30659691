//! Diff engine for comparing keyed datasets

pub mod cell_diff;
mod row_diff;
mod schema_diff;

use std::collections::BTreeSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::{Dataset, RowKey};

pub use cell_diff::{compare_cells, DiffCell, CHANGE_MARKER};
pub use row_diff::{DiffRow, RowMerger, RowStatus};
pub use schema_diff::ColumnLayout;

/// Errors raised by a strict diff
#[derive(Debug, Error)]
pub enum DiffError {
    #[error("dataset '{dataset}' has duplicate keys in column '{column}': {}", format_keys(.keys))]
    DuplicateKeys {
        dataset: String,
        column: String,
        keys: Vec<RowKey>,
    },
}

fn format_keys(keys: &[RowKey]) -> String {
    const SHOWN: usize = 5;
    let mut listed: Vec<String> = keys.iter().take(SHOWN).map(|k| k.to_string()).collect();
    if keys.len() > SHOWN {
        listed.push(format!("... ({} total)", keys.len()));
    }
    listed.join(", ")
}

/// Statistics about the diff
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub rows_new: usize,
    pub rows_changed: usize,
    pub rows_unchanged: usize,
    /// Keys only in the old dataset; never rendered as rows
    pub rows_removed: usize,
    pub cells_changed: usize,
    pub old_row_count: usize,
    pub new_row_count: usize,
    /// Unchanged text cells that already contain the change marker
    pub marker_collisions: usize,
}

impl DiffStats {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.rows_new > 0 || self.rows_removed > 0 || self.rows_changed > 0
    }
}

/// Result of comparing two datasets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffResult {
    /// Name of the index column
    pub key_column: String,
    /// Output columns: the new dataset's value columns, in order
    pub columns: Vec<String>,
    /// Merged rows, ascending by key
    pub rows: Vec<DiffRow>,
    /// Keys classified as new
    pub new_keys: BTreeSet<RowKey>,
    /// Keys present only in the old dataset, ascending
    pub removed_keys: Vec<RowKey>,
    /// Old-only columns, absent from the merged rows
    pub old_only_columns: Vec<String>,
    pub stats: DiffStats,
}

impl DiffResult {
    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.stats.has_changes()
    }

    pub fn is_new(&self, key: &RowKey) -> bool {
        self.new_keys.contains(key)
    }

    /// Get the merged row for a key
    pub fn row(&self, key: &RowKey) -> Option<&DiffRow> {
        self.rows
            .binary_search_by(|row| row.key.cmp(key))
            .ok()
            .map(|idx| &self.rows[idx])
    }
}

/// Options for a diff run
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffOptions {
    /// Reject datasets with duplicate keys instead of letting the last row win
    pub strict_keys: bool,
}

/// Main diff engine
#[derive(Debug, Clone, Default)]
pub struct DiffEngine {
    options: DiffOptions,
}

impl DiffEngine {
    /// Create a new diff engine with options
    pub fn new(options: DiffOptions) -> Self {
        Self { options }
    }

    /// Compare two datasets
    pub fn diff(&self, old: &Dataset, new: &Dataset) -> Result<DiffResult, DiffError> {
        if self.options.strict_keys {
            check_unique_keys(old)?;
            check_unique_keys(new)?;
        }
        Ok(self.merge(old, new))
    }

    fn merge(&self, old: &Dataset, new: &Dataset) -> DiffResult {
        let layout = ColumnLayout::compare(old, new);
        let merger = RowMerger::new(&layout);

        let mut stats = DiffStats {
            old_row_count: old.row_count(),
            new_row_count: new.row_count(),
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(new.key_count());
        let mut new_keys = BTreeSet::new();

        for new_row in new.iter_by_key() {
            let row = match old.get(&new_row.key) {
                Some(old_row) => {
                    let row = merger.common_row(old_row, new_row);
                    let changed = row.changed_cells();
                    if changed > 0 {
                        stats.rows_changed += 1;
                        stats.cells_changed += changed;
                    } else {
                        stats.rows_unchanged += 1;
                    }
                    row
                }
                None => {
                    stats.rows_new += 1;
                    new_keys.insert(new_row.key.clone());
                    merger.new_row(new_row)
                }
            };

            stats.marker_collisions += row
                .cells
                .iter()
                .filter_map(DiffCell::value)
                .filter(|v| v.text_contains(CHANGE_MARKER))
                .count();

            rows.push(row);
        }

        let removed_keys: Vec<RowKey> = old
            .keys()
            .filter(|key| !new.contains_key(key))
            .cloned()
            .collect();
        stats.rows_removed = removed_keys.len();

        if stats.marker_collisions > 0 {
            log::warn!(
                "{} unchanged cell(s) of '{}' already contain '{}' and will look changed",
                stats.marker_collisions,
                new.name,
                CHANGE_MARKER
            );
        }
        log::debug!(
            "'{}' vs '{}': {} shared column(s)",
            old.name,
            new.name,
            layout.shared_count()
        );
        if !layout.new_only.is_empty() {
            log::debug!(
                "columns only in '{}' are copied without comparison: {:?}",
                new.name,
                layout.new_only
            );
        }
        if !layout.old_only.is_empty() {
            log::debug!(
                "columns only in '{}' are not carried into the diff: {:?}",
                old.name,
                layout.old_only
            );
        }

        DiffResult {
            key_column: new.key_column.clone(),
            columns: new.columns.clone(),
            rows,
            new_keys,
            removed_keys,
            old_only_columns: layout.old_only,
            stats,
        }
    }
}

fn check_unique_keys(dataset: &Dataset) -> Result<(), DiffError> {
    if dataset.duplicate_keys().is_empty() {
        return Ok(());
    }
    Err(DiffError::DuplicateKeys {
        dataset: dataset.name.clone(),
        column: dataset.key_column.clone(),
        keys: dataset.duplicate_keys().to_vec(),
    })
}

/// Convenience function to compute a lenient diff
pub fn compute_diff(old: &Dataset, new: &Dataset) -> DiffResult {
    DiffEngine::default().merge(old, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    fn dataset(name: &str, columns: &[&str]) -> Dataset {
        Dataset::new(name, "id", columns.iter().map(|s| s.to_string()).collect())
    }

    fn ints(values: &[i64]) -> Vec<CellValue> {
        values.iter().map(|&v| CellValue::Int(v)).collect()
    }

    fn rendered(row: &DiffRow) -> Vec<String> {
        row.cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_basic_example() {
        let old = dataset("old", &["x", "y"]).with_row("A", ints(&[1, 2]));
        let new = dataset("new", &["x", "y"])
            .with_row("A", ints(&[1, 3]))
            .with_row("B", ints(&[5, 9]));

        let diff = compute_diff(&old, &new);

        assert_eq!(diff.rows.len(), 2);
        let a = diff.row(&RowKey::from("A")).unwrap();
        assert_eq!(a.status, RowStatus::Common);
        assert_eq!(a.cells[0], DiffCell::Unchanged(CellValue::Int(1)));
        assert_eq!(rendered(a), vec!["1", "2→3"]);

        let b = diff.row(&RowKey::from("B")).unwrap();
        assert!(b.is_new());
        assert_eq!(
            b.cells,
            vec![
                DiffCell::Unchanged(CellValue::Int(5)),
                DiffCell::Unchanged(CellValue::Int(9))
            ]
        );

        assert_eq!(diff.new_keys.len(), 1);
        assert!(diff.is_new(&RowKey::from("B")));
        assert_eq!(diff.stats.rows_new, 1);
        assert_eq!(diff.stats.rows_changed, 1);
        assert_eq!(diff.stats.cells_changed, 1);
    }

    #[test]
    fn test_diff_is_idempotent() {
        let old = dataset("old", &["x", "y"])
            .with_row("A", ints(&[1, 2]))
            .with_row("C", ints(&[0, 0]));
        let new = dataset("new", &["y", "z"])
            .with_row("B", ints(&[7, 8]))
            .with_row("A", ints(&[4, 4]));

        assert_eq!(compute_diff(&old, &new), compute_diff(&old, &new));
    }

    #[test]
    fn test_rows_sorted_by_key() {
        let old = dataset("old", &["x"]).with_row(2i64, ints(&[1]));
        let new = dataset("new", &["x"])
            .with_row(30i64, ints(&[1]))
            .with_row(2i64, ints(&[2]))
            .with_row(4i64, ints(&[1]));

        let diff = compute_diff(&old, &new);
        let keys: Vec<RowKey> = diff.rows.iter().map(|r| r.key.clone()).collect();
        assert_eq!(
            keys,
            vec![RowKey::from(2i64), RowKey::from(4i64), RowKey::from(30i64)]
        );
    }

    #[test]
    fn test_removed_rows_are_excluded_but_listed() {
        let old = dataset("old", &["x"])
            .with_row("keep", ints(&[1]))
            .with_row("gone", ints(&[2]));
        let new = dataset("new", &["x"]).with_row("keep", ints(&[1]));

        let diff = compute_diff(&old, &new);

        assert!(diff.row(&RowKey::from("gone")).is_none());
        assert_eq!(diff.rows.len(), 1);
        assert_eq!(diff.removed_keys, vec![RowKey::from("gone")]);
        assert_eq!(diff.stats.rows_removed, 1);
        assert_eq!(diff.stats.rows_unchanged, 1);
        assert!(diff.has_changes());
    }

    #[test]
    fn test_exclusive_columns() {
        let old = dataset("old", &["shared", "old_only"]).with_row("A", ints(&[1, 100]));
        let new = dataset("new", &["new_only", "shared"]).with_row("A", ints(&[50, 2]));

        let diff = compute_diff(&old, &new);

        assert_eq!(diff.columns, vec!["new_only", "shared"]);
        assert_eq!(diff.old_only_columns, vec!["old_only"]);
        let a = &diff.rows[0];
        assert_eq!(rendered(a), vec!["50", "1→2"]);
    }

    #[test]
    fn test_new_row_is_verbatim_including_empty_cells() {
        let old = dataset("old", &["x"]);
        let new = dataset("new", &["x", "y"]).with_row("A", vec![CellValue::from("v")]);

        let diff = compute_diff(&old, &new);

        let a = &diff.rows[0];
        assert!(a.is_new());
        assert_eq!(
            a.cells,
            vec![
                DiffCell::Unchanged(CellValue::from("v")),
                DiffCell::Unchanged(CellValue::Null)
            ]
        );
    }

    #[test]
    fn test_unchanged_rows_carry_no_marker() {
        let old = dataset("old", &["x", "y"]).with_row("A", vec!["a".into(), CellValue::Null]);
        let new = dataset("new", &["x", "y"]).with_row("A", vec!["a".into(), CellValue::Null]);

        let diff = compute_diff(&old, &new);

        assert!(!diff.has_changes());
        assert!(diff.rows[0].cells.iter().all(|c| !c.to_string().contains(CHANGE_MARKER)));
    }

    #[test]
    fn test_marker_collisions_are_counted() {
        let old = dataset("old", &["x"]).with_row("A", vec!["a→b".into()]);
        let new = dataset("new", &["x"]).with_row("A", vec!["a→b".into()]);

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.stats.marker_collisions, 1);
        assert_eq!(diff.stats.cells_changed, 0);
    }

    #[test]
    fn test_lenient_duplicate_keys_last_wins() {
        let old = dataset("old", &["x"]).with_row("A", ints(&[1]));
        let new = dataset("new", &["x"])
            .with_row("A", ints(&[5]))
            .with_row("A", ints(&[1]));

        let diff = compute_diff(&old, &new);
        assert_eq!(diff.rows.len(), 1);
        assert!(!diff.rows[0].cells[0].is_changed());
    }

    #[test]
    fn test_strict_rejects_duplicate_keys() {
        let old = dataset("old", &["x"]).with_row("A", ints(&[1]));
        let new = dataset("new", &["x"])
            .with_row("A", ints(&[5]))
            .with_row("A", ints(&[1]));

        let engine = DiffEngine::new(DiffOptions { strict_keys: true });
        let err = engine.diff(&old, &new).unwrap_err();
        match &err {
            DiffError::DuplicateKeys { dataset, keys, .. } => {
                assert_eq!(dataset, "new");
                assert_eq!(keys, &vec![RowKey::from("A")]);
            }
        }
        assert!(err.to_string().contains("duplicate keys in column 'id': A"));
    }
}
