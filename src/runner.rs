//! Comparison-unit driver: one isolated task per unit on a bounded pool

use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;

use crate::config::{Config, UnitSpec};
use crate::diff::{DiffEngine, DiffOptions, DiffStats};
use crate::model::RowKey;
use crate::output::{output_file_name, write_diff_workbook};
use crate::parser::ParserFactory;

/// What a successful unit produced
#[derive(Debug, Clone)]
pub struct UnitReport {
    /// Path of the written workbook
    pub output_path: PathBuf,
    pub stats: DiffStats,
    pub new_keys: Vec<RowKey>,
    pub removed_keys: Vec<RowKey>,
    pub old_only_columns: Vec<String>,
}

/// Result of one comparison unit
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit: UnitSpec,
    pub result: Result<UnitReport>,
}

impl UnitOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run every configured unit and collect the outcomes in configuration order
///
/// Returns an error only when the run cannot start at all. A unit that fails
/// to load, diff or save reports the failure in its own outcome.
pub fn run_units(config: &Config) -> Result<Vec<UnitOutcome>> {
    config.validate()?;
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;

    let mut builder =
        rayon::ThreadPoolBuilder::new().thread_name(|i| format!("xldiff-unit-{}", i));
    if let Some(jobs) = config.jobs {
        builder = builder.num_threads(jobs);
    }
    let pool = builder.build().context("Failed to start worker pool")?;

    let factory = ParserFactory::new();
    let outcomes: Vec<UnitOutcome> = pool.install(|| {
        config
            .units
            .par_iter()
            .map(|unit| UnitOutcome {
                unit: unit.clone(),
                result: run_isolated(&factory, config, unit),
            })
            .collect()
    });

    Ok(outcomes)
}

fn run_isolated(factory: &ParserFactory, config: &Config, unit: &UnitSpec) -> Result<UnitReport> {
    match panic::catch_unwind(AssertUnwindSafe(|| run_unit(factory, config, unit))) {
        Ok(result) => {
            if let Err(e) = &result {
                log::error!("[{}] failed: {:#}", unit.label, e);
            }
            result
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("[{}] panicked: {}", unit.label, message);
            Err(anyhow!("Unit '{}' panicked: {}", unit.label, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run_unit(factory: &ParserFactory, config: &Config, unit: &UnitSpec) -> Result<UnitReport> {
    log::info!("[{}] reading {}", unit.label, unit.sheet);

    let old = factory
        .parse(&config.old_file, &unit.sheet, config)
        .with_context(|| {
            format!(
                "Failed to load {} of old file {} (index column '{}')",
                unit.sheet,
                config.old_file.display(),
                config.index_column
            )
        })?;
    let new = factory
        .parse(&config.new_file, &unit.sheet, config)
        .with_context(|| {
            format!(
                "Failed to load {} of new file {} (index column '{}')",
                unit.sheet,
                config.new_file.display(),
                config.index_column
            )
        })?;

    log::info!(
        "[{}] comparing {} old rows with {} new rows",
        unit.label,
        old.row_count(),
        new.row_count()
    );
    let engine = DiffEngine::new(DiffOptions {
        strict_keys: config.strict_keys,
    });
    let diff = engine.diff(&old, &new)?;
    log::info!(
        "[{}] {} new rows, {} changed cells",
        unit.label,
        diff.stats.rows_new,
        diff.stats.cells_changed
    );

    let output_path = config.output_dir.join(output_file_name(
        &config.old_file,
        &config.new_file,
        &unit.label,
    ));
    write_diff_workbook(&output_path, &diff, &old, &new)?;
    log::info!("[{}] saved {}", unit.label, output_path.display());

    Ok(UnitReport {
        output_path,
        stats: diff.stats,
        new_keys: diff.new_keys.into_iter().collect(),
        removed_keys: diff.removed_keys,
        old_only_columns: diff.old_only_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SheetSelector;
    use std::io::Write;
    use std::path::Path;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_failing_unit_does_not_affect_others() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_csv(dir.path(), "jan.csv", "id,v\n1,a\n2,b\n");
        let new = write_csv(dir.path(), "feb.csv", "id,v\n1,a\n2,c\n3,d\n");

        let config = Config::new(old, new, "id")
            .with_output_dir(dir.path().join("out"))
            .with_jobs(2)
            .with_units(vec![
                UnitSpec::new("MAIN", SheetSelector::Index(0)),
                UnitSpec::new("EXTRA", SheetSelector::Index(1)),
            ]);

        let outcomes = run_units(&config).unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].unit.label, "MAIN");
        let report = outcomes[0].result.as_ref().unwrap();
        assert_eq!(report.output_path, dir.path().join("out").join("jan vs feb - MAIN.xlsx"));
        assert!(report.output_path.exists());
        assert_eq!(report.stats.rows_new, 1);
        assert_eq!(report.stats.cells_changed, 1);
        assert_eq!(report.new_keys, vec![RowKey::from(3i64)]);

        assert_eq!(outcomes[1].unit.label, "EXTRA");
        let err = outcomes[1].result.as_ref().unwrap_err();
        assert!(format!("{:#}", err).contains("single sheet"));
        assert!(!dir.path().join("out").join("jan vs feb - EXTRA.xlsx").exists());
    }

    #[test]
    fn test_strict_keys_fails_the_unit() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_csv(dir.path(), "a.csv", "id,v\n1,a\n1,b\n");
        let new = write_csv(dir.path(), "b.csv", "id,v\n1,a\n");

        let config = Config::new(old, new, "id")
            .with_output_dir(dir.path().to_path_buf())
            .with_strict_keys(true)
            .with_units(vec![UnitSpec::new("ONLY", SheetSelector::Index(0))]);

        let outcomes = run_units(&config).unwrap();
        let err = outcomes[0].result.as_ref().unwrap_err();
        assert!(err.to_string().contains("duplicate keys"));
    }

    #[test]
    fn test_invalid_config_fails_before_running() {
        let config = Config::new("a.csv".into(), "b.csv".into(), "id").with_units(vec![]);
        assert!(run_units(&config).is_err());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
