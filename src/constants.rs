//! Column labels and fixed vocabulary shared across the pipeline stages.
//! Input labels match the header row of the lab export workbook.

// Input sheet
pub const DEFAULT_INPUT_PATH: &str = "data/medicine.xlsx";
pub const DEFAULT_INPUT_SHEET: &str = "hard";
pub const PATIENT_COLUMN: &str = "Код пациента";
pub const TEST_COLUMN: &str = "Анализ";
pub const VALUE_COLUMN: &str = "Значение";

// Canonical marker symbols for qualitative results
pub const POSITIVE_SYMBOL: &str = "+";
pub const NEGATIVE_SYMBOL: &str = "-";

// Marker prefixes, matched against the case-folded raw value
pub const POSITIVE_PREFIX: &str = "п";
pub const NEGATIVE_PREFIX: &str = "о";

// Reference data (SQLite)
pub const DEFAULT_DB_PATH: &str = "data/lab.db";
pub const REFERENCE_TABLE: &str = "med_an_name";
pub const CONTACT_TABLE: &str = "med_name";
pub const REPORT_TABLE: &str = "maka_med_results";

// Output spreadsheet
pub const DEFAULT_OUTPUT_PATH: &str = "data/maka_med_results.xlsx";
pub const DEFAULT_OUTPUT_SHEET: &str = "Sheet1";
pub const REPORT_HEADERS: [&str; 4] = ["Телефон", "Имя", "Анализ", "Заключение"];

// Report column widths, as declared in the report table
pub const PHONE_MAX_LEN: usize = 20;
pub const NAME_MAX_LEN: usize = 100;
pub const TEST_NAME_MAX_LEN: usize = 20;
pub const CLASSIFICATION_MAX_LEN: usize = 50;

pub const DEFAULT_MIN_TESTS: usize = 2;
pub const DEFAULT_MIN_BAD_RESULTS: usize = 2;

// Environment overrides for connection and path parameters
pub const ENV_DB_PATH: &str = "LAB_DB_PATH";
pub const ENV_INPUT_PATH: &str = "LAB_INPUT_PATH";
pub const ENV_OUTPUT_PATH: &str = "LAB_OUTPUT_PATH";
