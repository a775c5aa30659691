//! CSV file parser

use std::borrow::Cow;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::config::{Config, SheetSelector};
use crate::model::{CellValue, Dataset};

use super::{build_dataset, dataset_name, Parser};

/// Parser for CSV files; a CSV file has exactly one sheet, at position 0
pub struct CsvParser;

impl Parser for CsvParser {
    fn parse(&self, path: &Path, sheet: &SheetSelector, config: &Config) -> Result<Dataset> {
        if *sheet != SheetSelector::Index(0) {
            bail!("CSV files have a single sheet (#0), {} requested", sheet);
        }

        let file =
            File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
        let reader = BufReader::new(file);
        let delimiter = if has_extension(path, "tsv") { b'\t' } else { b',' };
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(reader);

        let header: Vec<String> = csv_reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (line_num, result) in csv_reader.records().enumerate() {
            let record = result.with_context(|| format!("Failed to read CSV row {}", line_num + 2))?; // +2 for 1-indexing and header
            let cells: Vec<CellValue> = record.iter().map(parse_cell_value).collect();
            rows.push((line_num + 2, cells));
        }

        build_dataset(dataset_name(path), header, rows, config)
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "csv" | "tsv" | "txt")
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Parse a string value into a CellValue with type inference
///
/// A typed value is only kept when it renders back to exactly the source
/// text. `007`, `1.50`, `1e3`, `TRUE` and padded text stay strings, so two
/// spellings of a number never collapse into one key or hide a change.
pub(crate) fn parse_cell_value(s: &str) -> CellValue {
    if s.is_empty() {
        return CellValue::Null;
    }

    let typed = infer_type(s);
    if typed.display() == s {
        typed
    } else {
        CellValue::String(Cow::Owned(s.to_string()))
    }
}

fn infer_type(s: &str) -> CellValue {
    match s {
        "true" => return CellValue::Bool(true),
        "false" => return CellValue::Bool(false),
        _ => {}
    }

    if let Ok(i) = s.parse::<i64>() {
        return CellValue::Int(i);
    }

    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return CellValue::Float(f);
        }
    }

    if let Ok(date) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return CellValue::Date(date);
    }
    if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return CellValue::DateTime(dt);
    }

    CellValue::String(Cow::Owned(s.to_string()))
}
