//! Column alignment between two datasets

use indexmap::IndexSet;

use crate::model::Dataset;

/// How the columns of the new dataset line up with the old one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    /// For each new column, the index of the same column in the old dataset
    pub old_index: Vec<Option<usize>>,
    /// Columns only the old dataset has
    pub old_only: Vec<String>,
    /// Columns only the new dataset has
    pub new_only: Vec<String>,
}

impl ColumnLayout {
    /// Number of new columns that are compared against the old dataset
    pub fn shared_count(&self) -> usize {
        self.old_index.iter().filter(|idx| idx.is_some()).count()
    }

    pub fn compare(old: &Dataset, new: &Dataset) -> Self {
        let old_names: IndexSet<&str> = old.columns.iter().map(String::as_str).collect();
        let new_names: IndexSet<&str> = new.columns.iter().map(String::as_str).collect();

        let old_index = new
            .columns
            .iter()
            .map(|name| old.column_index(name))
            .collect();

        let old_only = old
            .columns
            .iter()
            .filter(|name| !new_names.contains(name.as_str()))
            .cloned()
            .collect();

        let new_only = new
            .columns
            .iter()
            .filter(|name| !old_names.contains(name.as_str()))
            .cloned()
            .collect();

        Self {
            old_index,
            old_only,
            new_only,
        }
    }
}
