//! Data model for keyed tabular data

mod key;
mod table;

pub use key::RowKey;
pub use table::{CellValue, Dataset, Row};
