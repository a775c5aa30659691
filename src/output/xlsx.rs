//! Result workbook: the diff sheet plus both source sheets

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rust_xlsxwriter::{
    Color, ColNum, ConditionalFormatText, ConditionalFormatTextRule, Format, RowNum, Workbook,
    Worksheet,
};

use crate::diff::{DiffCell, DiffResult, CHANGE_MARKER};
use crate::model::{CellValue, Dataset, Row};

/// Name of the merged diff sheet
pub const DIFF_SHEET: &str = "DIFF";

const MAX_SHEET_NAME: usize = 31;
const MAX_ROWS: usize = 1_048_576;
const MAX_COLS: usize = 16_384;

/// Cell formats for one kind of row; dates need their own number format
struct RowFormats {
    text: Format,
    date: Format,
    datetime: Format,
}

impl RowFormats {
    fn new(base: Format) -> Self {
        Self {
            date: base.clone().set_num_format("yyyy-mm-dd"),
            datetime: base.clone().set_num_format("yyyy-mm-dd hh:mm:ss"),
            text: base,
        }
    }
}

struct Formats {
    header: Format,
    plain: RowFormats,
    changed: Format,
    new_row: RowFormats,
}

impl Formats {
    fn new() -> Self {
        Self {
            header: Format::new().set_bold(),
            plain: RowFormats::new(Format::new()),
            changed: Format::new()
                .set_font_color(Color::RGB(0xFF0000))
                .set_background_color(Color::RGB(0xB1B3B3)),
            new_row: RowFormats::new(
                Format::new()
                    .set_background_color(Color::RGB(0x32CD32))
                    .set_bold(),
            ),
        }
    }
}

/// Write the result workbook for one unit
///
/// The workbook is saved next to `path` under a temporary name and renamed
/// into place, so a failed save never leaves a file under the final name.
pub fn write_diff_workbook(
    path: &Path,
    diff: &DiffResult,
    old: &Dataset,
    new: &Dataset,
) -> Result<()> {
    let formats = Formats::new();
    let [diff_name, new_name, old_name] = sheet_names(&old.name, &new.name);

    let mut workbook = Workbook::new();

    let mut diff_sheet = Worksheet::new();
    diff_sheet.set_name(&diff_name)?;
    write_diff_sheet(&mut diff_sheet, diff, &formats)?;
    workbook.push_worksheet(diff_sheet);

    let mut new_sheet = Worksheet::new();
    new_sheet.set_name(&new_name)?;
    write_dataset_sheet(&mut new_sheet, new, &formats)?;
    workbook.push_worksheet(new_sheet);

    let mut old_sheet = Worksheet::new();
    old_sheet.set_name(&old_name)?;
    write_dataset_sheet(&mut old_sheet, old, &formats)?;
    workbook.push_worksheet(old_sheet);

    let partial = partial_path(path);
    if let Err(e) = workbook.save(&partial) {
        let _ = fs::remove_file(&partial);
        return Err(e).with_context(|| format!("Failed to save workbook {}", partial.display()));
    }
    fs::rename(&partial, path)
        .with_context(|| format!("Failed to move workbook into place: {}", path.display()))?;

    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}

fn write_diff_sheet(sheet: &mut Worksheet, diff: &DiffResult, formats: &Formats) -> Result<()> {
    write_header(sheet, &diff.key_column, &diff.columns, formats)?;
    let last_col = col_num(diff.columns.len())?;

    for (i, row) in diff.rows.iter().enumerate() {
        let r = row_num(i + 1)?;
        let format = if row.is_new() {
            sheet.set_row_format(r, &formats.new_row.text)?;
            &formats.new_row
        } else {
            &formats.plain
        };

        write_value(sheet, r, 0, row.key.value(), format)?;
        for (c, cell) in row.cells.iter().enumerate() {
            let c = col_num(c + 1)?;
            match cell {
                DiffCell::Unchanged(value) => write_value(sheet, r, c, value, format)?,
                DiffCell::Changed { .. } => {
                    sheet.write_string_with_format(r, c, cell.to_string().as_str(), &format.text)?;
                }
            }
        }
    }

    let highlight = ConditionalFormatText::new()
        .set_rule(ConditionalFormatTextRule::Contains(CHANGE_MARKER.to_string()))
        .set_format(&formats.changed);
    let last_row = row_num(diff.rows.len().max(1))?;
    sheet.add_conditional_format(0, 0, last_row, last_col, &highlight)?;
    sheet.set_freeze_panes(1, 1)?;

    Ok(())
}

fn write_dataset_sheet(sheet: &mut Worksheet, dataset: &Dataset, formats: &Formats) -> Result<()> {
    write_header(sheet, &dataset.key_column, &dataset.columns, formats)?;
    for (i, row) in dataset.rows.iter().enumerate() {
        write_row(sheet, row_num(i + 1)?, row, &formats.plain)?;
    }
    Ok(())
}

fn write_header(
    sheet: &mut Worksheet,
    key_column: &str,
    columns: &[String],
    formats: &Formats,
) -> Result<()> {
    sheet.write_string_with_format(0, 0, key_column, &formats.header)?;
    for (c, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col_num(c + 1)?, name.as_str(), &formats.header)?;
    }
    Ok(())
}

fn write_row(sheet: &mut Worksheet, r: RowNum, row: &Row, format: &RowFormats) -> Result<()> {
    write_value(sheet, r, 0, row.key.value(), format)?;
    for (c, value) in row.cells.iter().enumerate() {
        write_value(sheet, r, col_num(c + 1)?, value, format)?;
    }
    Ok(())
}

fn write_value(
    sheet: &mut Worksheet,
    r: RowNum,
    c: ColNum,
    value: &CellValue,
    format: &RowFormats,
) -> Result<()> {
    match value {
        CellValue::Null => {
            sheet.write_blank(r, c, &format.text)?;
        }
        CellValue::Bool(b) => {
            sheet.write_boolean_with_format(r, c, *b, &format.text)?;
        }
        CellValue::Int(i) => {
            sheet.write_number_with_format(r, c, *i as f64, &format.text)?;
        }
        CellValue::Float(f) if f.is_finite() => {
            sheet.write_number_with_format(r, c, *f, &format.text)?;
        }
        CellValue::Date(d) => {
            sheet.write_datetime_with_format(r, c, d, &format.date)?;
        }
        CellValue::DateTime(dt) => {
            sheet.write_datetime_with_format(r, c, dt, &format.datetime)?;
        }
        _ => {
            sheet.write_string_with_format(r, c, value.display().as_ref(), &format.text)?;
        }
    }
    Ok(())
}

fn row_num(i: usize) -> Result<RowNum> {
    if i >= MAX_ROWS {
        bail!("Too many rows for a worksheet: {}", i + 1);
    }
    Ok(i as RowNum)
}

fn col_num(i: usize) -> Result<ColNum> {
    if i >= MAX_COLS {
        bail!("Too many columns for a worksheet: {}", i + 1);
    }
    Ok(i as ColNum)
}

/// Names for the diff, new and old sheets, valid and distinct in Excel
pub fn sheet_names(old_name: &str, new_name: &str) -> [String; 3] {
    let mut used: Vec<String> = Vec::with_capacity(3);
    let diff = unique_sheet_name(DIFF_SHEET, &mut used);
    let new = unique_sheet_name(new_name, &mut used);
    let old = unique_sheet_name(old_name, &mut used);
    [diff, new, old]
}

fn unique_sheet_name(raw: &str, used: &mut Vec<String>) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base = if cleaned.is_empty() { "Sheet" } else { cleaned };

    let mut candidate: String = base.chars().take(MAX_SHEET_NAME).collect();
    let mut n = 2;
    // Excel compares sheet names case-insensitively
    while used.iter().any(|u| u.to_lowercase() == candidate.to_lowercase()) {
        let suffix = format!(" ({})", n);
        let keep = MAX_SHEET_NAME - suffix.chars().count();
        candidate = base.chars().take(keep).collect::<String>() + &suffix;
        n += 1;
    }
    used.push(candidate.clone());
    candidate
}
