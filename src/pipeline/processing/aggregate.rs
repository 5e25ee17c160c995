use std::collections::{HashMap, HashSet};

use tracing::info;

use crate::pipeline::processing::classify::ClassifiedResult;
use crate::types::TestResult;

/// Count occurrences per patient, remembering first-appearance order
fn counts_by_patient<'a, I>(patient_ids: I) -> (Vec<&'a str>, HashMap<&'a str, usize>)
where
    I: IntoIterator<Item = (&'a str, bool)>,
{
    let mut order = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for (patient_id, counted) in patient_ids {
        let entry = counts.entry(patient_id).or_insert_with(|| {
            order.push(patient_id);
            0
        });
        if counted {
            *entry += 1;
        }
    }
    (order, counts)
}

/// Keep only rows of patients with at least `min_tests` recorded tests.
/// Counts raw rows, before any classification.
pub fn filter_by_test_count(results: Vec<TestResult>, min_tests: usize) -> Vec<TestResult> {
    let (order, counts) = counts_by_patient(results.iter().map(|r| (r.patient_id.as_str(), true)));
    let kept: HashSet<String> = order
        .iter()
        .filter(|p| counts[*p] >= min_tests)
        .map(|p| p.to_string())
        .collect();

    info!(
        "Test-count gate kept {} of {} patients (min_tests={})",
        kept.len(),
        order.len(),
        min_tests
    );
    crate::metrics::patients_retained("test_count", kept.len());

    results
        .into_iter()
        .filter(|r| kept.contains(&r.patient_id))
        .collect()
}

/// Patients with at least `min_bad_results` High/Low/Positive results, in
/// order of first appearance.
pub fn patients_with_bad_results(
    classified: &[ClassifiedResult],
    min_bad_results: usize,
) -> Vec<String> {
    let (order, counts) = counts_by_patient(
        classified
            .iter()
            .map(|r| (r.patient_id.as_str(), r.classification.is_bad())),
    );
    let retained: Vec<String> = order
        .iter()
        .filter(|p| counts[*p] >= min_bad_results)
        .map(|p| p.to_string())
        .collect();

    info!(
        "Bad-result gate kept {} of {} patients (min_bad_results={})",
        retained.len(),
        order.len(),
        min_bad_results
    );
    crate::metrics::patients_retained("bad_results", retained.len());
    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;

    fn result(patient: &str, test: &str) -> TestResult {
        TestResult::new(patient, test, "1")
    }

    fn classified(patient: &str, classification: Classification) -> ClassifiedResult {
        ClassifiedResult {
            patient_id: patient.to_string(),
            test_id: "T".to_string(),
            test_name: "Test".to_string(),
            value: "1".to_string(),
            classification,
        }
    }

    #[test]
    fn test_single_test_patient_dropped_by_count_gate() {
        let rows = vec![result("1", "A"), result("2", "A"), result("1", "B")];
        let kept = filter_by_test_count(rows, 2);
        assert_eq!(kept, vec![result("1", "A"), result("1", "B")]);
    }

    #[test]
    fn test_count_gate_uses_its_own_threshold() {
        let rows = vec![result("1", "A"), result("1", "B"), result("2", "A")];
        assert_eq!(filter_by_test_count(rows.clone(), 1).len(), 3);
        assert!(filter_by_test_count(rows, 3).is_empty());
    }

    #[test]
    fn test_patient_with_no_bad_results_excluded() {
        // Three tests pass the count gate, but none are bad
        let rows = vec![
            classified("1", Classification::Normal),
            classified("1", Classification::Negative),
            classified("1", Classification::Normal),
        ];
        assert!(patients_with_bad_results(&rows, 2).is_empty());
    }

    #[test]
    fn test_bad_result_gate_counts_high_low_positive() {
        let rows = vec![
            classified("2", Classification::High),
            classified("1", Classification::Positive),
            classified("1", Classification::Low),
            classified("2", Classification::Negative),
            classified("3", Classification::High),
            classified("3", Classification::High),
        ];
        assert_eq!(patients_with_bad_results(&rows, 2), vec!["1", "3"]);
        assert_eq!(patients_with_bad_results(&rows, 1), vec!["2", "1", "3"]);
    }
}
