// Pipeline ingestion: reading raw test results from the lab export workbook

pub mod spreadsheet;

pub use spreadsheet::{load_test_results, LoadedResults};
