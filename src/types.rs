use crate::error::{LabError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One administered test as read from the input sheet. The raw value is
/// untyped text until normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub patient_id: String,
    pub test_id: String,
    pub raw_value: String,
}

impl TestResult {
    pub fn new(
        patient_id: impl Into<String>,
        test_id: impl Into<String>,
        raw_value: impl Into<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into(),
            test_id: test_id.into(),
            raw_value: raw_value.into(),
        }
    }
}

/// A test result whose value has been mapped into the canonical vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub patient_id: String,
    pub test_id: String,
    pub value: String,
}

/// Valid range for one test type. A missing bound is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    pub test_id: String,
    pub test_name: String,
    pub kind: String,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

impl ReferenceRange {
    /// Build a range, enforcing `min_value <= max_value` when both are set
    pub fn new(
        test_id: impl Into<String>,
        test_name: impl Into<String>,
        kind: impl Into<String>,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) -> Result<Self> {
        let test_id = test_id.into();
        if let (Some(min), Some(max)) = (min_value, max_value) {
            if min > max {
                return Err(LabError::InvalidReferenceRange { test_id, min, max });
            }
        }
        Ok(Self {
            test_id,
            test_name: test_name.into(),
            kind: kind.into(),
            min_value,
            max_value,
        })
    }
}

/// Outcome of checking one result against its reference range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Normal,
    High,
    Low,
    Positive,
    Negative,
    Invalid,
}

impl Classification {
    pub const ALL: [Classification; 6] = [
        Classification::Normal,
        Classification::High,
        Classification::Low,
        Classification::Positive,
        Classification::Negative,
        Classification::Invalid,
    ];

    /// High, Low and Positive count toward the follow-up threshold
    pub fn is_bad(self) -> bool {
        matches!(
            self,
            Classification::High | Classification::Low | Classification::Positive
        )
    }

    /// Conclusion text written to the report
    pub fn label(self) -> &'static str {
        match self {
            Classification::Normal => "Норма",
            Classification::High => "Повышен",
            Classification::Low => "Понижен",
            Classification::Positive => "Положительный",
            Classification::Negative => "Отрицательный",
            Classification::Invalid => "Некорректное значение",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Classification::Normal => "Normal",
            Classification::High => "High",
            Classification::Low => "Low",
            Classification::Positive => "Positive",
            Classification::Negative => "Negative",
            Classification::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Classification {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Classification::ALL
            .into_iter()
            .find(|c| c.label() == s || c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| LabError::Config(format!("Unknown classification: {s}")))
    }
}

/// Patient contact details from the external directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub patient_id: String,
    pub phone: String,
    pub name: String,
}

/// One line of the follow-up contact list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub phone: String,
    pub name: String,
    pub test_name: String,
    pub classification: Classification,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_set() {
        let bad: Vec<_> = Classification::ALL.into_iter().filter(|c| c.is_bad()).collect();
        assert_eq!(
            bad,
            vec![Classification::High, Classification::Low, Classification::Positive]
        );
    }

    #[test]
    fn test_classification_parses_label_and_name() {
        assert_eq!("Повышен".parse::<Classification>().unwrap(), Classification::High);
        assert_eq!("low".parse::<Classification>().unwrap(), Classification::Low);
        assert!("Elevated".parse::<Classification>().is_err());
    }

    #[test]
    fn test_labels_fit_report_column() {
        for c in Classification::ALL {
            assert!(c.label().chars().count() <= crate::constants::CLASSIFICATION_MAX_LEN);
        }
    }

    #[test]
    fn test_reference_range_rejects_inverted_bounds() {
        assert!(ReferenceRange::new("A", "ALT", "N", Some(40.0), Some(10.0)).is_err());
        assert!(ReferenceRange::new("A", "ALT", "N", Some(10.0), Some(10.0)).is_ok());
        assert!(ReferenceRange::new("A", "ALT", "N", None, Some(10.0)).is_ok());
    }
}
