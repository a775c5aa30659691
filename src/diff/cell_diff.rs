//! Cell-level comparison logic

use std::fmt;

use serde::Serialize;

use crate::model::CellValue;

/// Separator between old and new text in a changed cell
pub const CHANGE_MARKER: char = '→';

/// One cell of the merged diff table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DiffCell {
    /// Value is the same in both datasets, or was copied from one of them
    Unchanged(CellValue),
    /// Value differs between the datasets
    Changed { old: CellValue, new: CellValue },
}

impl DiffCell {
    pub fn is_changed(&self) -> bool {
        matches!(self, DiffCell::Changed { .. })
    }

    /// The value carried by an unchanged cell
    pub fn value(&self) -> Option<&CellValue> {
        match self {
            DiffCell::Unchanged(v) => Some(v),
            DiffCell::Changed { .. } => None,
        }
    }
}

impl fmt::Display for DiffCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffCell::Unchanged(v) => write!(f, "{}", v.display()),
            DiffCell::Changed { old, new } => {
                write!(f, "{}{}{}", old.display(), CHANGE_MARKER, new.display())
            }
        }
    }
}

/// Compare a shared-column cell of a row present in both datasets
pub fn compare_cells(old: &CellValue, new: &CellValue) -> DiffCell {
    if old == new {
        DiffCell::Unchanged(new.clone())
    } else {
        DiffCell::Changed {
            old: old.clone(),
            new: new.clone(),
        }
    }
}
