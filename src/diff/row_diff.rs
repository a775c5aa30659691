//! Row merging for keys of the new dataset

use serde::Serialize;

use crate::model::{CellValue, Row, RowKey};

use super::cell_diff::{compare_cells, DiffCell};
use super::schema_diff::ColumnLayout;

/// Whether a merged row existed in the old dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    /// Key only exists in the new dataset
    New,
    /// Key exists in both datasets
    Common,
}

/// One merged row of the diff table, aligned with the new dataset's columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffRow {
    pub key: RowKey,
    pub status: RowStatus,
    pub cells: Vec<DiffCell>,
}

impl DiffRow {
    pub fn is_new(&self) -> bool {
        self.status == RowStatus::New
    }

    /// Number of changed cells in this row
    pub fn changed_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_changed()).count()
    }
}

/// Builds merged rows from matched row pairs
pub struct RowMerger<'a> {
    layout: &'a ColumnLayout,
}

impl<'a> RowMerger<'a> {
    pub fn new(layout: &'a ColumnLayout) -> Self {
        Self { layout }
    }

    /// Row present only in the new dataset: copied verbatim
    pub fn new_row(&self, new_row: &Row) -> DiffRow {
        let cells = (0..self.layout.old_index.len())
            .map(|idx| DiffCell::Unchanged(cell_or_empty(new_row, idx)))
            .collect();

        DiffRow {
            key: new_row.key.clone(),
            status: RowStatus::New,
            cells,
        }
    }

    /// Row present in both datasets: shared columns diffed, new-only columns copied
    pub fn common_row(&self, old_row: &Row, new_row: &Row) -> DiffRow {
        let cells = self
            .layout
            .old_index
            .iter()
            .enumerate()
            .map(|(new_idx, old_idx)| {
                let new_value = cell_or_empty(new_row, new_idx);
                match old_idx {
                    Some(old_idx) => compare_cells(&cell_or_empty(old_row, *old_idx), &new_value),
                    None => DiffCell::Unchanged(new_value),
                }
            })
            .collect();

        DiffRow {
            key: new_row.key.clone(),
            status: RowStatus::Common,
            cells,
        }
    }
}

fn cell_or_empty(row: &Row, idx: usize) -> CellValue {
    row.get(idx).cloned().unwrap_or(CellValue::Null)
}
