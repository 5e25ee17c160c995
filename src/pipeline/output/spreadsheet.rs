use std::path::{Path, PathBuf};

use calamine::{open_workbook, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::constants::REPORT_HEADERS;
use crate::error::{LabError, Result};
use crate::pipeline::ingestion::spreadsheet::cell_text;
use crate::pipeline::output::ReportSink;
use crate::types::ReportRow;

/// Writes the report to an `.xlsx` file, overwriting it on every run
pub struct SpreadsheetReportSink {
    path: PathBuf,
    sheet: String,
}

impl SpreadsheetReportSink {
    pub fn new(path: impl Into<PathBuf>, sheet: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sheet: sheet.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReportSink for SpreadsheetReportSink {
    fn name(&self) -> &'static str {
        "spreadsheet"
    }

    fn write_report(&mut self, rows: &[ReportRow]) -> Result<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&self.sheet)?;

        for (col, header) in REPORT_HEADERS.iter().enumerate() {
            worksheet.write_string(0, col as u16, *header)?;
        }
        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            worksheet.write_string(r, 0, &row.phone)?;
            worksheet.write_string(r, 1, &row.name)?;
            worksheet.write_string(r, 2, &row.test_name)?;
            worksheet.write_string(r, 3, row.classification.label())?;
        }

        workbook.save(&self.path)?;
        info!("Wrote {} report rows to {}", rows.len(), self.path.display());
        Ok(rows.len())
    }
}

/// Read a report spreadsheet written by [`SpreadsheetReportSink`]
pub fn read_report(path: &Path, sheet: &str) -> Result<Vec<ReportRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range(sheet)?;

    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| LabError::EmptySheet(sheet.to_string()))?;
    for (idx, expected) in REPORT_HEADERS.iter().enumerate() {
        if cell_text(header.get(idx)) != *expected {
            return Err(LabError::MissingColumn {
                sheet: sheet.to_string(),
                column: expected.to_string(),
            });
        }
    }

    rows.map(|row| {
        Ok(ReportRow {
            phone: cell_text(row.first()),
            name: cell_text(row.get(1)),
            test_name: cell_text(row.get(2)),
            classification: cell_text(row.get(3)).parse()?,
        })
    })
    .collect()
}
