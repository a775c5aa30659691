//! xldiff - keyed cell-level diff for spreadsheet exports
//!
//! Compares two versions of a keyed table, sheet by sheet, and writes one
//! workbook per sheet that marks changed cells as `old→new` and highlights
//! rows that are new in the second version.

pub mod config;
pub mod diff;
pub mod model;
pub mod output;
pub mod parser;
pub mod runner;

pub use config::Config;
pub use diff::{compute_diff, DiffEngine, DiffResult};
pub use model::{CellValue, Dataset, RowKey};
pub use runner::run_units;
