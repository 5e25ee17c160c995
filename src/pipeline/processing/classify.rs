use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::InvalidValuePolicy;
use crate::error::{LabError, Result};
use crate::pipeline::processing::normalize::{parse_number, Marker};
use crate::types::{Classification, NormalizedResult, ReferenceRange};

/// A normalized result with its reference range resolved and a verdict attached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedResult {
    pub patient_id: String,
    pub test_id: String,
    pub test_name: String,
    pub value: String,
    pub classification: Classification,
}

/// Result of classifying a batch
#[derive(Debug, Default)]
pub struct ClassificationBatch {
    /// Every row whose test id exists in the reference table, input order
    pub classified: Vec<ClassifiedResult>,
    /// Rows dropped because their test id has no reference range
    pub unknown_tests: Vec<NormalizedResult>,
}

impl ClassificationBatch {
    pub fn count(&self, classification: Classification) -> usize {
        self.classified
            .iter()
            .filter(|r| r.classification == classification)
            .count()
    }
}

/// Trait for assigning a classification to a single normalized value
pub trait Classifier {
    fn classify_value(&self, value: &str, range: &ReferenceRange) -> Classification;
}

/// Inclusive range check. Markers take priority over numbers; anything
/// unparseable is Invalid.
#[derive(Debug, Clone, Copy, Default)]
pub struct RangeClassifier;

impl Classifier for RangeClassifier {
    fn classify_value(&self, value: &str, range: &ReferenceRange) -> Classification {
        match Marker::from_symbol(value) {
            Some(Marker::Positive) => return Classification::Positive,
            Some(Marker::Negative) => return Classification::Negative,
            None => {}
        }

        let Some(number) = parse_number(value) else {
            return Classification::Invalid;
        };

        match (range.min_value, range.max_value) {
            (_, Some(max)) if number > max => Classification::High,
            (Some(min), _) if number < min => Classification::Low,
            _ => Classification::Normal,
        }
    }
}

/// Classify every row against the reference table. Rows whose test id is
/// absent from the table are set aside rather than classified.
pub fn classify_batch<C: Classifier + ?Sized>(
    classifier: &C,
    results: Vec<NormalizedResult>,
    ranges: &HashMap<String, ReferenceRange>,
) -> ClassificationBatch {
    let mut batch = ClassificationBatch::default();

    for result in results {
        let Some(range) = ranges.get(&result.test_id) else {
            warn!(
                patient_id = %result.patient_id,
                test_id = %result.test_id,
                "No reference range for test, excluding row"
            );
            batch.unknown_tests.push(result);
            continue;
        };

        let classification = classifier.classify_value(&result.value, range);
        debug!(
            patient_id = %result.patient_id,
            test_id = %result.test_id,
            value = %result.value,
            %classification,
            "Classified result"
        );
        crate::metrics::classified(classification);

        batch.classified.push(ClassifiedResult {
            patient_id: result.patient_id,
            test_id: result.test_id,
            test_name: range.test_name.clone(),
            value: result.value,
            classification,
        });
    }

    batch
}

/// Apply the invalid-value policy to a classified batch. Under `Abort` any
/// Invalid row fails the run; under `Exclude` Invalid rows are dropped.
/// Returns the surviving rows and the number excluded.
pub fn apply_invalid_policy(
    classified: Vec<ClassifiedResult>,
    policy: InvalidValuePolicy,
) -> Result<(Vec<ClassifiedResult>, usize)> {
    let is_invalid = |r: &&ClassifiedResult| r.classification == Classification::Invalid;

    let Some(first) = classified.iter().find(is_invalid) else {
        return Ok((classified, 0));
    };
    let invalid_count = classified.iter().filter(is_invalid).count();

    match policy {
        InvalidValuePolicy::Abort => Err(LabError::MalformedValue {
            patient_id: first.patient_id.clone(),
            test_id: first.test_id.clone(),
            value: first.value.clone(),
            count: invalid_count,
        }),
        InvalidValuePolicy::Exclude => {
            for row in classified.iter().filter(is_invalid) {
                warn!(
                    patient_id = %row.patient_id,
                    test_id = %row.test_id,
                    value = %row.value,
                    "Excluding malformed value"
                );
            }
            let kept = classified
                .into_iter()
                .filter(|r| r.classification != Classification::Invalid)
                .collect();
            Ok((kept, invalid_count))
        }
    }
}
