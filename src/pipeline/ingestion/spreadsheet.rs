use crate::config::InputConfig;
use crate::error::{LabError, Result};
use crate::types::TestResult;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::path::Path;
use tracing::{debug, info, warn};

/// Rows read from the input sheet, plus how many were unusable
#[derive(Debug, Default)]
pub struct LoadedResults {
    pub results: Vec<TestResult>,
    /// Rows with an empty patient or test id
    pub malformed_rows: usize,
    /// 1-based sheet row numbers of those rows
    pub malformed_row_numbers: Vec<usize>,
}

/// Read test results from the configured sheet. Columns are located by
/// their header label, not by position.
pub fn load_test_results(input: &InputConfig) -> Result<LoadedResults> {
    info!(
        "Reading sheet '{}' from {}",
        input.sheet,
        input.path.display()
    );
    let range = open_sheet(&input.path, &input.sheet)?;
    results_from_range(&range, input)
}

fn open_sheet(path: &Path, sheet: &str) -> Result<Range<Data>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let range = workbook.worksheet_range(sheet)?;
    Ok(range)
}

pub(crate) fn results_from_range(range: &Range<Data>, input: &InputConfig) -> Result<LoadedResults> {
    let mut rows = range.rows();
    let header = rows
        .next()
        .ok_or_else(|| LabError::EmptySheet(input.sheet.clone()))?;

    let patient_idx = column_index(header, &input.patient_column, &input.sheet)?;
    let test_idx = column_index(header, &input.test_column, &input.sheet)?;
    let value_idx = column_index(header, &input.value_column, &input.sheet)?;

    // The range begins at the first non-empty cell, not necessarily row 1
    let header_row = range.start().map_or(0, |(row, _)| row as usize) + 1;

    let mut loaded = LoadedResults::default();
    for (offset, row) in rows.enumerate() {
        let row_number = header_row + offset + 1;
        let patient_id = cell_text(row.get(patient_idx));
        let test_id = cell_text(row.get(test_idx));
        let raw_value = cell_text(row.get(value_idx));

        if patient_id.is_empty() && test_id.is_empty() && raw_value.is_empty() {
            continue;
        }
        if patient_id.is_empty() || test_id.is_empty() {
            warn!(
                row = row_number,
                "Skipping row without patient or test id"
            );
            loaded.malformed_rows += 1;
            loaded.malformed_row_numbers.push(row_number);
            continue;
        }

        debug!(row = row_number, %patient_id, %test_id, %raw_value, "Loaded test result");
        loaded.results.push(TestResult {
            patient_id,
            test_id,
            raw_value,
        });
    }

    info!(
        "Loaded {} test results ({} malformed rows skipped)",
        loaded.results.len(),
        loaded.malformed_rows
    );
    Ok(loaded)
}

fn column_index(header: &[Data], label: &str, sheet: &str) -> Result<usize> {
    header
        .iter()
        .position(|cell| cell_text(Some(cell)) == label.trim())
        .ok_or_else(|| LabError::MissingColumn {
            sheet: sheet.to_string(),
            column: label.to_string(),
        })
}

/// Text form of a cell. Whole floats drop their fraction so that a numeric
/// id cell `7.0` reads as `7`.
pub(crate) fn cell_text(cell: Option<&Data>) -> String {
    match cell {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.trim().to_string(),
        Some(Data::Int(i)) => i.to_string(),
        Some(Data::Float(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Some(Data::Float(f)) => f.to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: Vec<Vec<Data>>) -> Range<Data> {
        let height = rows.len() as u32;
        let width = rows.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        let mut range = Range::new((0, 0), (height - 1, width - 1));
        for (r, row) in rows.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((r as u32, c as u32), cell);
            }
        }
        range
    }

    fn s(v: &str) -> Data {
        Data::String(v.to_string())
    }

    #[test]
    fn test_columns_found_by_label_not_position() {
        let range = sheet(vec![
            vec![s("Значение"), s("Код пациента"), s("Анализ")],
            vec![s("12,5"), Data::Float(1.0), s("A")],
            vec![Data::Float(50.0), Data::Int(1), s("B")],
        ]);
        let loaded = results_from_range(&range, &InputConfig::default()).unwrap();
        assert_eq!(
            loaded.results,
            vec![
                TestResult::new("1", "A", "12,5"),
                TestResult::new("1", "B", "50"),
            ]
        );
    }

    #[test]
    fn test_missing_column_is_reported() {
        let range = sheet(vec![vec![s("Код пациента"), s("Анализ")]]);
        let err = results_from_range(&range, &InputConfig::default()).unwrap_err();
        match err {
            LabError::MissingColumn { column, .. } => assert_eq!(column, "Значение"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rows_without_ids_are_counted_and_blank_rows_ignored() {
        let range = sheet(vec![
            vec![s("Код пациента"), s("Анализ"), s("Значение")],
            vec![Data::Empty, s("A"), s("5")],
            vec![Data::Empty, Data::Empty, Data::Empty],
            vec![s("2"), s("A"), Data::Empty],
        ]);
        let loaded = results_from_range(&range, &InputConfig::default()).unwrap();
        assert_eq!(loaded.malformed_rows, 1);
        assert_eq!(loaded.malformed_row_numbers, vec![2]);
        assert_eq!(loaded.results, vec![TestResult::new("2", "A", "")]);
    }

    #[test]
    fn test_row_numbers_follow_sheet_position() {
        // Header on sheet row 4, after three empty rows
        let mut range = Range::new((3, 0), (6, 2));
        let cells = [
            [s("Код пациента"), s("Анализ"), s("Значение")],
            [s("1"), s("A"), s("5")],
            [s("1"), Data::Empty, s("7")],
            [Data::Empty, s("B"), s("9")],
        ];
        for (r, row) in cells.into_iter().enumerate() {
            for (c, cell) in row.into_iter().enumerate() {
                range.set_value((3 + r as u32, c as u32), cell);
            }
        }

        let loaded = results_from_range(&range, &InputConfig::default()).unwrap();
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.malformed_rows, 2);
        assert_eq!(loaded.malformed_row_numbers, vec![6, 7]);
    }

    #[test]
    fn test_cell_text_formats_numbers() {
        assert_eq!(cell_text(Some(&Data::Float(7.0))), "7");
        assert_eq!(cell_text(Some(&Data::Float(12.5))), "12.5");
        assert_eq!(cell_text(Some(&s("  Пол  "))), "Пол");
        assert_eq!(cell_text(None), "");
    }
}
