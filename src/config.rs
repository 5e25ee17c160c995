use crate::constants;
use crate::error::{LabError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

static SQL_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub database: DatabaseConfig,
    pub thresholds: ThresholdConfig,
    pub markers: MarkerConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub path: PathBuf,
    pub sheet: String,
    pub patient_column: String,
    pub test_column: String,
    pub value_column: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_INPUT_PATH),
            sheet: constants::DEFAULT_INPUT_SHEET.to_string(),
            patient_column: constants::PATIENT_COLUMN.to_string(),
            test_column: constants::TEST_COLUMN.to_string(),
            value_column: constants::VALUE_COLUMN.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite file holding reference data and the report table
    pub path: PathBuf,
    pub reference_table: String,
    pub contact_table: String,
    pub report_table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_DB_PATH),
            reference_table: constants::REFERENCE_TABLE.to_string(),
            contact_table: constants::CONTACT_TABLE.to_string(),
            report_table: constants::REPORT_TABLE.to_string(),
        }
    }
}

/// The two cardinality gates. They share a default but are independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Minimum recorded tests per patient, checked before classification
    pub min_tests: usize,
    /// Minimum High/Low/Positive results per patient, checked after classification
    pub min_bad_results: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_tests: constants::DEFAULT_MIN_TESTS,
            min_bad_results: constants::DEFAULT_MIN_BAD_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    pub positive: Vec<String>,
    pub negative: Vec<String>,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            positive: vec![constants::POSITIVE_PREFIX.to_string()],
            negative: vec![constants::NEGATIVE_PREFIX.to_string()],
        }
    }
}

/// What to do when a value is neither a marker nor a number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidValuePolicy {
    /// Fail the whole run before aggregation
    #[default]
    Abort,
    /// Drop the row and continue
    Exclude,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub invalid_values: InvalidValuePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub sheet: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(constants::DEFAULT_OUTPUT_PATH),
            sheet: constants::DEFAULT_OUTPUT_SHEET.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `config.toml` when present.
    /// Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => {
                info!("No {} found, using built-in defaults", DEFAULT_CONFIG_PATH);
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            LabError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&config_content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(constants::ENV_DB_PATH) {
            self.database.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(constants::ENV_INPUT_PATH) {
            self.input.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var(constants::ENV_OUTPUT_PATH) {
            self.output.path = PathBuf::from(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, table) in [
            ("database.reference_table", &self.database.reference_table),
            ("database.contact_table", &self.database.contact_table),
            ("database.report_table", &self.database.report_table),
        ] {
            if !SQL_IDENTIFIER.is_match(table) {
                return Err(LabError::Config(format!(
                    "{field} '{table}' is not a valid table name"
                )));
            }
        }

        if self.markers.positive.is_empty() || self.markers.negative.is_empty() {
            return Err(LabError::Config(
                "markers.positive and markers.negative need at least one prefix".to_string(),
            ));
        }
        let all_markers = self.markers.positive.iter().chain(&self.markers.negative);
        if all_markers.clone().any(|m| m.trim().is_empty()) {
            return Err(LabError::Config("marker prefixes cannot be blank".to_string()));
        }

        if self.output.sheet.trim().is_empty() {
            return Err(LabError::Config("output.sheet cannot be empty".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_source_layout() {
        let config = Config::default();
        assert_eq!(config.input.sheet, "hard");
        assert_eq!(config.input.patient_column, "Код пациента");
        assert_eq!(config.thresholds.min_tests, 2);
        assert_eq!(config.thresholds.min_bad_results, 2);
        assert_eq!(config.classifier.invalid_values, InvalidValuePolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [thresholds]
            min_bad_results = 3

            [classifier]
            invalid_values = "exclude"
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.min_tests, 2);
        assert_eq!(config.thresholds.min_bad_results, 3);
        assert_eq!(config.classifier.invalid_values, InvalidValuePolicy::Exclude);
        assert_eq!(config.database.report_table, "maka_med_results");
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let mut config = Config::default();
        config.database.report_table = "results; DROP TABLE med_name".to_string();
        assert!(matches!(config.validate(), Err(LabError::Config(_))));
    }

    #[test]
    fn test_rejects_blank_marker() {
        let mut config = Config::default();
        config.markers.negative.push("  ".to_string());
        assert!(config.validate().is_err());
    }
}
