//! Parser layer for reading spreadsheet exports into keyed datasets

mod csv;
mod excel;

use std::path::Path;

use anyhow::{bail, Result};
use indexmap::IndexSet;

use crate::config::{Config, SheetSelector};
use crate::model::{CellValue, Dataset, RowKey};

pub use self::csv::CsvParser;
pub use self::excel::ExcelParser;

/// Trait for parsing tabular data files
pub trait Parser: Send + Sync {
    /// Read one sheet of a file into a dataset keyed by `config.index_column`
    fn parse(&self, path: &Path, sheet: &SheetSelector, config: &Config) -> Result<Dataset>;

    /// Check if this parser can handle the given file extension
    fn supports_extension(&self, ext: &str) -> bool;
}

/// Factory for creating parsers based on file extension
pub struct ParserFactory {
    parsers: Vec<Box<dyn Parser>>,
}

impl Default for ParserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ParserFactory {
    /// Create a new parser factory with all supported parsers
    pub fn new() -> Self {
        Self {
            parsers: vec![Box::new(ExcelParser), Box::new(CsvParser)],
        }
    }

    /// Get a parser for the given file path
    pub fn get_parser(&self, path: &Path) -> Result<&dyn Parser> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        for parser in &self.parsers {
            if parser.supports_extension(&ext) {
                return Ok(parser.as_ref());
            }
        }

        bail!(
            "Unsupported file format: {}",
            path.extension()
                .and_then(|e| e.to_str())
                .unwrap_or("unknown")
        )
    }

    /// Parse a file using the appropriate parser
    pub fn parse(&self, path: &Path, sheet: &SheetSelector, config: &Config) -> Result<Dataset> {
        let parser = self.get_parser(path)?;
        parser.parse(path, sheet, config)
    }
}

/// Dataset name for a source file: its stem
pub fn dataset_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Typed value for a fill given on the command line (`0` is an integer, `n/a` text)
pub fn parse_fill_value(s: &str) -> CellValue {
    self::csv::parse_cell_value(s)
}

/// Header cells as column names; blanks become `ColumnN`, repeats get `.N`
fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: IndexSet<String> = IndexSet::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());

    for (i, name) in raw.into_iter().enumerate() {
        let name = name.trim().to_string();
        let base = if name.is_empty() {
            format!("Column{}", i + 1)
        } else {
            name
        };

        let mut candidate = base.clone();
        let mut n = 1;
        while seen.contains(&candidate) {
            candidate = format!("{}.{}", base, n);
            n += 1;
        }
        seen.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// Shared by all parsers: turn a header and raw rows into a keyed dataset
///
/// `rows` yields `(source_line, cells)`, cells aligned with `header`.
pub(crate) fn build_dataset<I>(
    name: String,
    header: Vec<String>,
    rows: I,
    config: &Config,
) -> Result<Dataset>
where
    I: IntoIterator<Item = (usize, Vec<CellValue>)>,
{
    let header = normalize_headers(header);
    let Some(key_idx) = header.iter().position(|c| c == &config.index_column) else {
        bail!(
            "Index column '{}' not found (columns: {})",
            config.index_column,
            header.join(", ")
        );
    };

    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != key_idx)
        .map(|(_, c)| c.clone())
        .collect();
    let width = header.len();
    let mut dataset = Dataset::new(name, config.index_column.clone(), columns);

    for (line, mut cells) in rows {
        if cells.iter().all(CellValue::is_null) {
            continue;
        }
        cells.resize(width, CellValue::Null);

        let key = RowKey(cells.remove(key_idx));
        if !config.fill_missing.is_null() {
            for cell in cells.iter_mut().filter(|c| c.is_null()) {
                *cell = config.fill_missing.clone();
            }
        }
        dataset.add_row(key, cells, line);
    }

    if let Some(summary) = duplicate_summary(&dataset) {
        log::warn!("{}", summary);
    }
    log::debug!(
        "loaded '{}': {} rows, {} value columns",
        dataset.name,
        dataset.row_count(),
        dataset.column_count()
    );

    Ok(dataset)
}

/// Warning text for a dataset with repeated keys, naming where the kept row is
fn duplicate_summary(dataset: &Dataset) -> Option<String> {
    let first = dataset.duplicate_keys().first()?;
    let line = dataset.get(first).map_or(0, |row| row.source_line);
    Some(format!(
        "'{}' repeats {} key(s) in column '{}' (first: '{}', kept from line {}); the last occurrence wins",
        dataset.name,
        dataset.duplicate_keys().len(),
        dataset.key_column,
        first,
        line
    ))
}
