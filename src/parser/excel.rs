//! Excel file parser (xlsx, xlsm, xls, ods)

use std::borrow::Cow;
use std::path::Path;

use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::Timelike;

use crate::config::{Config, SheetSelector};
use crate::model::{CellValue, Dataset};

use super::{build_dataset, dataset_name, Parser};

/// Parser for Excel files
pub struct ExcelParser;

impl Parser for ExcelParser {
    fn parse(&self, path: &Path, sheet: &SheetSelector, config: &Config) -> Result<Dataset> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open Excel file: {}", path.display()))?;

        let sheets = workbook.sheet_names();
        let sheet_name = match sheet {
            SheetSelector::Index(i) => match sheets.get(*i) {
                Some(name) => name.clone(),
                None => bail!(
                    "Workbook has {} sheet(s), no {}",
                    sheets.len(),
                    sheet
                ),
            },
            SheetSelector::Name(name) => {
                if !sheets.iter().any(|s| s == name) {
                    bail!("No {} in workbook (sheets: {})", sheet, sheets.join(", "));
                }
                name.clone()
            }
        };

        let range: Range<Data> = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

        log::debug!("reading sheet '{}' of {}", sheet_name, path.display());
        parse_range(dataset_name(path), range, config)
            .with_context(|| format!("In sheet '{}'", sheet_name))
    }

    fn supports_extension(&self, ext: &str) -> bool {
        matches!(ext.to_lowercase().as_str(), "xlsx" | "xls" | "ods" | "xlsm")
    }
}

fn parse_range(name: String, range: Range<Data>, config: &Config) -> Result<Dataset> {
    if range.is_empty() {
        bail!("Empty sheet");
    }

    // Line numbers are 1-indexed and relative to the sheet, not the used range
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    let mut rows = range.rows();
    let header_row = rows.next().context("No header row found")?;
    let header: Vec<String> = header_row.iter().map(cell_to_string).collect();

    let data = rows
        .enumerate()
        .map(|(i, row)| (first_row + i + 2, row.iter().map(convert_cell).collect::<Vec<_>>()));

    build_dataset(name, header, data, config)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(_) => convert_cell(cell).to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        // Only the empty string is empty; padded text is compared as written
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::String(Cow::Owned(s.clone())),
        Data::Float(f) => {
            // Check if it's actually an integer
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                CellValue::Int(*f as i64)
            } else {
                CellValue::Float(*f)
            }
        }
        Data::Int(i) => CellValue::Int(*i),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.num_seconds_from_midnight() == 0 && dt.nanosecond() == 0 => {
                CellValue::Date(dt.date())
            }
            Some(dt) => CellValue::DateTime(dt),
            None => CellValue::String(Cow::Owned(format!("{:?}", cell))),
        },
        Data::DateTimeIso(s) => {
            if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                CellValue::DateTime(dt)
            } else if let Ok(d) = chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                CellValue::Date(d)
            } else {
                CellValue::String(Cow::Owned(s.clone()))
            }
        }
        Data::DurationIso(s) => CellValue::String(Cow::Owned(s.clone())),
        Data::Error(e) => CellValue::String(Cow::Owned(format!("#{:?}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowKey;
    use rust_xlsxwriter::{Workbook, Worksheet};

    fn write_sheet(ws: &mut Worksheet, rows: &[&[&str]]) {
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                match value.parse::<f64>() {
                    Ok(n) => ws.write_number(r as u32, c as u16, n).unwrap(),
                    Err(_) => ws.write_string(r as u32, c as u16, *value).unwrap(),
                };
            }
        }
    }

    fn workbook(path: &Path) {
        let mut wb = Workbook::new();
        let first = wb.add_worksheet().set_name("Prod").unwrap();
        write_sheet(
            first,
            &[&["Account", "Owner", "Balance"], &["100", "ann", "2.5"], &["7", "", "3"]],
        );
        let second = wb.add_worksheet().set_name("Test").unwrap();
        write_sheet(second, &[&["Owner", "Account"], &["bob", "1"]]);
        wb.save(path).unwrap();
    }

    fn config() -> Config {
        Config::new("a.xlsx".into(), "b.xlsx".into(), "Account")
    }

    #[test]
    fn test_reads_sheet_by_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.xlsx");
        workbook(&path);

        let ds = ExcelParser
            .parse(&path, &SheetSelector::Index(0), &config())
            .unwrap();

        assert_eq!(ds.name, "accounts");
        assert_eq!(ds.columns, vec!["Owner", "Balance"]);
        let row = ds.get(&RowKey::from(100i64)).unwrap();
        assert_eq!(row.cells, vec![CellValue::from("ann"), CellValue::Float(2.5)]);
        let row = ds.get(&RowKey::from(7i64)).unwrap();
        assert_eq!(row.cells, vec![CellValue::Null, CellValue::Int(3)]);
        assert_eq!(row.source_line, 3);
    }

    #[test]
    fn test_reads_sheet_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.xlsx");
        workbook(&path);

        let ds = ExcelParser
            .parse(&path, &SheetSelector::Name("Test".into()), &config())
            .unwrap();
        assert_eq!(ds.columns, vec!["Owner"]);
        assert!(ds.contains_key(&RowKey::from(1i64)));
    }

    #[test]
    fn test_missing_sheet_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.xlsx");
        workbook(&path);

        let err = ExcelParser
            .parse(&path, &SheetSelector::Index(5), &config())
            .unwrap_err();
        assert!(err.to_string().contains("no sheet #5"));

        let err = ExcelParser
            .parse(&path, &SheetSelector::Name("Nope".into()), &config())
            .unwrap_err();
        assert!(err.to_string().contains("Prod, Test"));
    }

    #[test]
    fn test_missing_index_column_names_the_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.xlsx");
        workbook(&path);

        let cfg = Config::new("a.xlsx".into(), "b.xlsx".into(), "Balance");
        let err = ExcelParser
            .parse(&path, &SheetSelector::Index(1), &cfg)
            .unwrap_err();
        let msg = format!("{:#}", err);
        assert!(msg.contains("sheet 'Test'"));
        assert!(msg.contains("'Balance'"));
    }

    #[test]
    fn test_convert_integral_float() {
        assert_eq!(convert_cell(&Data::Float(4.0)), CellValue::Int(4));
        assert_eq!(convert_cell(&Data::String(String::new())), CellValue::Null);
    }

    #[test]
    fn test_whitespace_text_is_not_empty() {
        assert_eq!(convert_cell(&Data::String("  ".into())), CellValue::from("  "));

        let old = Dataset::new("old", "id", vec!["note".into()])
            .with_row(1i64, vec![convert_cell(&Data::String("  ".into()))]);
        let new = Dataset::new("new", "id", vec!["note".into()])
            .with_row(1i64, vec![convert_cell(&Data::Empty)]);
        let diff = crate::diff::compute_diff(&old, &new);
        assert_eq!(diff.stats.cells_changed, 1);
        assert_eq!(diff.rows[0].cells[0].to_string(), "  →");
    }
}
