use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet read failed: {0}")]
    SpreadsheetRead(#[from] calamine::XlsxError),

    #[error("Spreadsheet write failed: {0}")]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing column '{column}' in sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("Sheet '{0}' is empty or has no header row")]
    EmptySheet(String),

    #[error(
        "Found {count} malformed value(s); first: patient {patient_id}, test {test_id}, value '{value}'"
    )]
    MalformedValue {
        patient_id: String,
        test_id: String,
        value: String,
        count: usize,
    },

    #[error("Reference range for test {test_id} has min {min} greater than max {max}")]
    InvalidReferenceRange { test_id: String, min: f64, max: f64 },
}

pub type Result<T> = std::result::Result<T, LabError>;
