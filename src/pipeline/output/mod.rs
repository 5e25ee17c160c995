// Pipeline output: destinations for the follow-up report

pub mod spreadsheet;

use crate::db::DatabaseManager;
use crate::error::Result;
use crate::types::ReportRow;

pub use spreadsheet::SpreadsheetReportSink;

/// A destination the finished report is written to in one bulk operation
pub trait ReportSink {
    /// Short label used in logs and metrics
    fn name(&self) -> &'static str;

    fn write_report(&mut self, rows: &[ReportRow]) -> Result<usize>;
}

/// Appends the report to the persistent table inside one transaction
pub struct DatabaseReportSink<'a> {
    db: &'a mut DatabaseManager,
    replace: bool,
}

impl<'a> DatabaseReportSink<'a> {
    pub fn new(db: &'a mut DatabaseManager, replace: bool) -> Self {
        Self { db, replace }
    }
}

impl ReportSink for DatabaseReportSink<'_> {
    fn name(&self) -> &'static str {
        "database"
    }

    fn write_report(&mut self, rows: &[ReportRow]) -> Result<usize> {
        self.db.write_report(rows, self.replace)
    }
}
