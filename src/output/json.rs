//! JSON run summary

use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use termcolor::WriteColor;

use crate::diff::DiffStats;
use crate::model::RowKey;
use crate::runner::UnitOutcome;

use super::ReportFormatter;

/// JSON summary formatter
pub struct JsonReport {
    pretty: bool,
}

impl JsonReport {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonReport {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonUnit<'a> {
    label: &'a str,
    sheet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<&'a DiffStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_keys: Option<&'a [RowKey]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    removed_keys: Option<&'a [RowKey]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    old_file: String,
    new_file: String,
    units: Vec<JsonUnit<'a>>,
}

impl ReportFormatter for JsonReport {
    fn render(
        &self,
        outcomes: &[UnitOutcome],
        old_path: &Path,
        new_path: &Path,
        writer: &mut dyn WriteColor,
    ) -> Result<()> {
        let units = outcomes
            .iter()
            .map(|outcome| {
                let mut unit = JsonUnit {
                    label: &outcome.unit.label,
                    sheet: outcome.unit.sheet.to_string(),
                    output: None,
                    stats: None,
                    new_keys: None,
                    removed_keys: None,
                    error: None,
                };
                match &outcome.result {
                    Ok(report) => {
                        unit.output = Some(report.output_path.display().to_string());
                        unit.stats = Some(&report.stats);
                        unit.new_keys = Some(report.new_keys.as_slice());
                        unit.removed_keys = Some(report.removed_keys.as_slice());
                    }
                    Err(e) => unit.error = Some(format!("{:#}", e)),
                }
                unit
            })
            .collect();

        let summary = JsonSummary {
            old_file: old_path.display().to_string(),
            new_file: new_path.display().to_string(),
            units,
        };

        if self.pretty {
            serde_json::to_writer_pretty(&mut *writer, &summary)?;
        } else {
            serde_json::to_writer(&mut *writer, &summary)?;
        }
        writeln!(writer)?;

        Ok(())
    }
}
