//! Output: result workbooks and the run summary

mod json;
mod terminal;
mod xlsx;

use std::io::IsTerminal;
use std::path::Path;

use anyhow::Result;
use termcolor::{ColorChoice, StandardStream, WriteColor};

use crate::config::ReportFormat;
use crate::parser::dataset_name;
use crate::runner::UnitOutcome;

pub use json::JsonReport;
pub use terminal::TerminalReport;
pub use xlsx::{sheet_names, write_diff_workbook, DIFF_SHEET};

/// Deterministic workbook name for one unit of a file pair
pub fn output_file_name(old_path: &Path, new_path: &Path, label: &str) -> String {
    format!(
        "{} vs {} - {}.xlsx",
        dataset_name(old_path),
        dataset_name(new_path),
        label
    )
}

/// Trait for run summary formatters
pub trait ReportFormatter {
    /// Render the outcomes of all units to a writer
    fn render(
        &self,
        outcomes: &[UnitOutcome],
        old_path: &Path,
        new_path: &Path,
        writer: &mut dyn WriteColor,
    ) -> Result<()>;
}

/// Factory for creating report formatters
pub struct ReportFactory;

impl ReportFactory {
    /// Create a report formatter based on format type
    pub fn create(format: ReportFormat) -> Box<dyn ReportFormatter> {
        match format {
            ReportFormat::Terminal => Box::new(TerminalReport::new()),
            ReportFormat::Json => Box::new(JsonReport::new()),
        }
    }
}

/// Render the run summary to stdout
pub fn render_to_stdout(
    outcomes: &[UnitOutcome],
    old_path: &Path,
    new_path: &Path,
    format: ReportFormat,
) -> Result<()> {
    let color = color_choice(format, std::io::stdout().is_terminal());
    let formatter = ReportFactory::create(format);
    let mut stdout = StandardStream::stdout(color);
    formatter.render(outcomes, old_path, new_path, &mut stdout)
}

/// termcolor's `Auto` only looks at `TERM`, so piped output is checked here
fn color_choice(format: ReportFormat, is_terminal: bool) -> ColorChoice {
    match format {
        ReportFormat::Terminal if is_terminal => ColorChoice::Auto,
        ReportFormat::Terminal | ReportFormat::Json => ColorChoice::Never,
    }
}
