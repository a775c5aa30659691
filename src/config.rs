//! Configuration handling for xldiff

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::CellValue;

/// How the run summary is printed once all units finish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Terminal,
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "terminal" => Ok(ReportFormat::Terminal),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

/// Which section of a source file a unit reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSelector {
    /// Zero-based sheet position
    Index(usize),
    /// Sheet name
    Name(String),
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::Index(i) => write!(f, "sheet #{}", i),
            SheetSelector::Name(name) => write!(f, "sheet '{}'", name),
        }
    }
}

impl std::str::FromStr for SheetSelector {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConfigError::EmptySheet);
        }
        Ok(match s.parse::<usize>() {
            Ok(i) => SheetSelector::Index(i),
            Err(_) => SheetSelector::Name(s.to_string()),
        })
    }
}

/// One comparison unit: a label and the sheet read from both files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// Label used in logs and in the output file name
    pub label: String,
    pub sheet: SheetSelector,
}

impl UnitSpec {
    pub fn new(label: impl Into<String>, sheet: SheetSelector) -> Self {
        Self {
            label: label.into(),
            sheet,
        }
    }
}

impl std::str::FromStr for UnitSpec {
    type Err = ConfigError;

    /// Parse `LABEL=SHEET`, where SHEET is a position or a sheet name
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (label, sheet) = s
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedUnit(s.to_string()))?;
        let label = label.trim();
        if label.is_empty() {
            return Err(ConfigError::MalformedUnit(s.to_string()));
        }
        Ok(UnitSpec::new(label, sheet.parse()?))
    }
}

/// Invalid configuration
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unit must look like LABEL=SHEET, got '{0}'")]
    MalformedUnit(String),
    #[error("sheet selector is empty")]
    EmptySheet,
    #[error("no comparison units configured")]
    NoUnits,
    #[error("unit label '{0}' is used more than once")]
    DuplicateLabel(String),
    #[error("unit label '{0}' cannot be used in a file name")]
    InvalidLabel(String),
    #[error("index column name is empty")]
    EmptyIndexColumn,
}

/// The units compared when none are given: the first two sheets
pub fn default_units() -> Vec<UnitSpec> {
    vec![
        UnitSpec::new("PROD", SheetSelector::Index(0)),
        UnitSpec::new("TEST", SheetSelector::Index(1)),
    ]
}

/// Configuration for a comparison run
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the old/original file
    pub old_file: PathBuf,
    /// Path to the new file
    pub new_file: PathBuf,
    /// Column whose values key the rows of both files
    pub index_column: String,
    /// Comparison units, run independently
    pub units: Vec<UnitSpec>,
    /// Directory the result workbooks are written to
    pub output_dir: PathBuf,
    /// Worker threads; `None` lets the pool decide
    pub jobs: Option<usize>,
    /// Fail a unit when a file repeats a key
    pub strict_keys: bool,
    /// Value substituted for empty source cells
    pub fill_missing: CellValue,
    /// Run summary format
    pub report_format: ReportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            old_file: PathBuf::new(),
            new_file: PathBuf::new(),
            index_column: String::new(),
            units: default_units(),
            output_dir: PathBuf::from("."),
            jobs: None,
            strict_keys: false,
            fill_missing: CellValue::Null,
            report_format: ReportFormat::default(),
        }
    }
}

impl Config {
    /// Create a new Config with file paths and the index column
    pub fn new(old_file: PathBuf, new_file: PathBuf, index_column: impl Into<String>) -> Self {
        Self {
            old_file,
            new_file,
            index_column: index_column.into(),
            ..Default::default()
        }
    }

    /// Replace the comparison units
    pub fn with_units(mut self, units: Vec<UnitSpec>) -> Self {
        self.units = units;
        self
    }

    /// Set the output directory
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.output_dir = dir;
        self
    }

    /// Set the number of worker threads
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Reject duplicate keys
    pub fn with_strict_keys(mut self, strict: bool) -> Self {
        self.strict_keys = strict;
        self
    }

    /// Set the value used for empty source cells
    pub fn with_fill_missing(mut self, value: CellValue) -> Self {
        self.fill_missing = value;
        self
    }

    /// Set the run summary format
    pub fn with_report_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    /// Check the unit list and index column before any file is touched
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index_column.trim().is_empty() {
            return Err(ConfigError::EmptyIndexColumn);
        }
        if self.units.is_empty() {
            return Err(ConfigError::NoUnits);
        }

        let mut seen = rustc_hash::FxHashSet::default();
        for unit in &self.units {
            if unit.label.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']) {
                return Err(ConfigError::InvalidLabel(unit.label.clone()));
            }
            if !seen.insert(unit.label.as_str()) {
                return Err(ConfigError::DuplicateLabel(unit.label.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unit_by_position_and_name() {
        assert_eq!(
            "PROD=0".parse::<UnitSpec>().unwrap(),
            UnitSpec::new("PROD", SheetSelector::Index(0))
        );
        assert_eq!(
            "Staging = Sheet 2".parse::<UnitSpec>().unwrap(),
            UnitSpec::new("Staging", SheetSelector::Name("Sheet 2".into()))
        );
    }

    #[test]
    fn test_parse_unit_errors() {
        assert_eq!(
            "PROD".parse::<UnitSpec>(),
            Err(ConfigError::MalformedUnit("PROD".into()))
        );
        assert_eq!("=1".parse::<UnitSpec>(), Err(ConfigError::MalformedUnit("=1".into())));
        assert_eq!("PROD= ".parse::<UnitSpec>(), Err(ConfigError::EmptySheet));
    }

    #[test]
    fn test_default_units_are_first_two_sheets() {
        let config = Config::new("a.xlsx".into(), "b.xlsx".into(), "Account Number");
        assert_eq!(config.units, default_units());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_units() {
        let base = Config::new("a.xlsx".into(), "b.xlsx".into(), "id");

        let dup = base.clone().with_units(vec![
            UnitSpec::new("A", SheetSelector::Index(0)),
            UnitSpec::new("A", SheetSelector::Index(1)),
        ]);
        assert_eq!(dup.validate(), Err(ConfigError::DuplicateLabel("A".into())));

        let slash = base.clone().with_units(vec![UnitSpec::new("a/b", SheetSelector::Index(0))]);
        assert_eq!(slash.validate(), Err(ConfigError::InvalidLabel("a/b".into())));

        assert_eq!(base.clone().with_units(vec![]).validate(), Err(ConfigError::NoUnits));

        let no_index = Config::new("a.xlsx".into(), "b.xlsx".into(), " ");
        assert_eq!(no_index.validate(), Err(ConfigError::EmptyIndexColumn));
    }

    #[test]
    fn test_report_format_from_str() {
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("html".parse::<ReportFormat>().is_err());
    }
}
