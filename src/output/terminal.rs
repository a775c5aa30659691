//! Colored terminal summary

use std::path::Path;

use anyhow::Result;
use termcolor::{Color, ColorSpec, WriteColor};

use crate::runner::{UnitOutcome, UnitReport};

use super::ReportFormatter;

/// Terminal summary with colors
pub struct TerminalReport;

impl TerminalReport {
    pub fn new() -> Self {
        Self
    }

    fn write_header(&self, writer: &mut dyn WriteColor, old_path: &Path, new_path: &Path) -> Result<()> {
        writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            writer,
            " xldiff: {} → {}",
            old_path.display(),
            new_path.display()
        )?;
        writeln!(writer, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(writer)?;
        Ok(())
    }

    fn write_status(&self, writer: &mut dyn WriteColor, ok: bool) -> Result<()> {
        let (color, text) = if ok {
            (Color::Green, "ok")
        } else {
            (Color::Red, "FAILED")
        };
        writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(writer, "{}", text)?;
        writer.reset()?;
        writeln!(writer)?;
        Ok(())
    }

    fn write_report(&self, writer: &mut dyn WriteColor, report: &UnitReport) -> Result<()> {
        let stats = &report.stats;
        writeln!(
            writer,
            "  {} new, {} changed ({} cells), {} unchanged (out of {} → {} rows)",
            stats.rows_new,
            stats.rows_changed,
            stats.cells_changed,
            stats.rows_unchanged,
            stats.old_row_count,
            stats.new_row_count
        )?;

        if stats.rows_removed > 0 {
            writer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
            writeln!(
                writer,
                "  {} row(s) only in the old file are not shown",
                stats.rows_removed
            )?;
            writer.reset()?;
        }
        if !report.old_only_columns.is_empty() {
            writer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
            writeln!(
                writer,
                "  old-only column(s) not shown: {}",
                report.old_only_columns.join(", ")
            )?;
            writer.reset()?;
        }

        writeln!(writer, "  → {}", report.output_path.display())?;
        Ok(())
    }
}

impl Default for TerminalReport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for TerminalReport {
    fn render(
        &self,
        outcomes: &[UnitOutcome],
        old_path: &Path,
        new_path: &Path,
        writer: &mut dyn WriteColor,
    ) -> Result<()> {
        self.write_header(writer, old_path, new_path)?;

        for outcome in outcomes {
            write!(writer, "{} ({}): ", outcome.unit.label, outcome.unit.sheet)?;
            self.write_status(writer, outcome.is_ok())?;
            match &outcome.result {
                Ok(report) => self.write_report(writer, report)?,
                Err(e) => writeln!(writer, "  {:#}", e)?,
            }
            writeln!(writer)?;
        }

        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        writeln!(
            writer,
            "{} of {} unit(s) completed",
            outcomes.len() - failed,
            outcomes.len()
        )?;
        Ok(())
    }
}
