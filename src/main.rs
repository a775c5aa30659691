//! xldiff - keyed cell-level diff for spreadsheet exports

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use env_logger::Env;

use xldiff::config::{default_units, Config, ReportFormat, UnitSpec};
use xldiff::output::render_to_stdout;
use xldiff::runner::run_units;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliReportFormat {
    Terminal,
    Json,
}

impl From<CliReportFormat> for ReportFormat {
    fn from(f: CliReportFormat) -> Self {
        match f {
            CliReportFormat::Terminal => ReportFormat::Terminal,
            CliReportFormat::Json => ReportFormat::Json,
        }
    }
}

/// Compare two spreadsheet exports keyed by a common index column
#[derive(Parser, Debug)]
#[command(name = "xldiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Old workbook (xlsx, xlsm, xls, ods, csv)
    #[arg(short, long = "old-excel", value_name = "OLD_FILE")]
    old: PathBuf,

    /// New workbook to compare against the old one
    #[arg(short, long = "new-excel", value_name = "NEW_FILE")]
    new: PathBuf,

    /// Common index column used to match rows
    #[arg(short, long, value_name = "COLUMN")]
    index: String,

    /// Comparison unit as LABEL=SHEET (sheet position or name); repeatable.
    /// Defaults to PROD=0 and TEST=1
    #[arg(short, long = "unit", value_name = "LABEL=SHEET")]
    units: Vec<UnitSpec>,

    /// Directory the result workbooks are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Number of units compared in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Fail a unit when either file repeats a key
    #[arg(long)]
    strict_keys: bool,

    /// Value written into empty source cells before comparing (e.g. 0)
    #[arg(long, value_name = "VALUE")]
    fill_missing: Option<String>,

    /// Run summary format
    #[arg(short, long, value_enum, default_value = "terminal")]
    report: CliReportFormat,
}

fn main() -> ExitCode {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    match run() {
        Ok(true) => ExitCode::SUCCESS,
        // At least one unit failed
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<bool> {
    let cli = Cli::parse();

    let units = if cli.units.is_empty() {
        default_units()
    } else {
        cli.units
    };

    let mut config = Config::new(cli.old.clone(), cli.new.clone(), cli.index)
        .with_units(units)
        .with_output_dir(cli.output_dir)
        .with_strict_keys(cli.strict_keys)
        .with_report_format(cli.report.into());
    if let Some(jobs) = cli.jobs {
        config = config.with_jobs(jobs);
    }
    if let Some(fill) = cli.fill_missing {
        config = config.with_fill_missing(xldiff::parser::parse_fill_value(&fill));
    }

    log::info!(
        "comparing {} with {} on '{}' ({} unit(s))",
        config.old_file.display(),
        config.new_file.display(),
        config.index_column,
        config.units.len()
    );

    let outcomes = run_units(&config)?;
    render_to_stdout(&outcomes, &cli.old, &cli.new, config.report_format)?;

    Ok(outcomes.iter().all(|o| o.is_ok()))
}
