use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::constants::{NAME_MAX_LEN, PHONE_MAX_LEN, TEST_NAME_MAX_LEN};
use crate::pipeline::processing::classify::ClassifiedResult;
use crate::types::{ContactRecord, ReportRow};

/// Report rows plus the retained patients that could not be contacted
#[derive(Debug, Default)]
pub struct ReportBuild {
    pub rows: Vec<ReportRow>,
    pub missing_contacts: Vec<String>,
}

/// Join the bad results of retained patients against the contact directory.
/// Inner join: patients without a contact record produce no rows. Patients
/// appear in `retained` order, tests in input order.
pub fn build_report(
    classified: &[ClassifiedResult],
    retained: &[String],
    contacts: &HashMap<String, Vec<ContactRecord>>,
) -> ReportBuild {
    let mut by_patient: HashMap<&str, Vec<&ClassifiedResult>> = HashMap::new();
    for result in classified.iter().filter(|r| r.classification.is_bad()) {
        by_patient
            .entry(result.patient_id.as_str())
            .or_default()
            .push(result);
    }

    let mut build = ReportBuild::default();
    let mut seen = HashSet::new();
    for patient_id in retained {
        if !seen.insert(patient_id.as_str()) {
            continue;
        }
        let Some(patient_contacts) = contacts.get(patient_id) else {
            debug!(%patient_id, "No contact record, patient left out of report");
            build.missing_contacts.push(patient_id.clone());
            continue;
        };
        let results = by_patient.get(patient_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);

        for result in results {
            for contact in patient_contacts {
                build.rows.push(ReportRow {
                    phone: contact.phone.clone(),
                    name: contact.name.clone(),
                    test_name: result.test_name.clone(),
                    classification: result.classification,
                });
            }
        }
    }

    for row in &build.rows {
        check_width("phone", &row.phone, PHONE_MAX_LEN);
        check_width("name", &row.name, NAME_MAX_LEN);
        check_width("test_name", &row.test_name, TEST_NAME_MAX_LEN);
    }

    build
}

/// SQLite does not enforce VARCHAR widths; flag values a stricter store would reject
fn check_width(column: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        warn!(column, len, max, value, "Report value exceeds declared column width");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;

    fn classified(patient: &str, test_name: &str, classification: Classification) -> ClassifiedResult {
        ClassifiedResult {
            patient_id: patient.to_string(),
            test_id: test_name.to_string(),
            test_name: test_name.to_string(),
            value: String::new(),
            classification,
        }
    }

    fn contact(patient: &str, name: &str, phone: &str) -> ContactRecord {
        ContactRecord {
            patient_id: patient.to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
        }
    }

    fn directory(records: Vec<ContactRecord>) -> HashMap<String, Vec<ContactRecord>> {
        let mut map: HashMap<String, Vec<ContactRecord>> = HashMap::new();
        for r in records {
            map.entry(r.patient_id.clone()).or_default().push(r);
        }
        map
    }

    #[test]
    fn test_only_bad_results_of_retained_patients() {
        let rows = vec![
            classified("1", "A", Classification::Positive),
            classified("1", "B", Classification::High),
            classified("1", "C", Classification::Normal),
            classified("2", "A", Classification::High),
        ];
        let contacts = directory(vec![contact("1", "Anna", "111"), contact("2", "Boris", "222")]);
        let build = build_report(&rows, &["1".to_string()], &contacts);

        assert_eq!(
            build.rows,
            vec![
                ReportRow {
                    phone: "111".to_string(),
                    name: "Anna".to_string(),
                    test_name: "A".to_string(),
                    classification: Classification::Positive,
                },
                ReportRow {
                    phone: "111".to_string(),
                    name: "Anna".to_string(),
                    test_name: "B".to_string(),
                    classification: Classification::High,
                },
            ]
        );
        assert!(build.missing_contacts.is_empty());
    }

    #[test]
    fn test_missing_contact_silently_dropped() {
        let rows = vec![
            classified("9", "A", Classification::Low),
            classified("9", "B", Classification::Low),
        ];
        let build = build_report(&rows, &["9".to_string()], &HashMap::new());
        assert!(build.rows.is_empty());
        assert_eq!(build.missing_contacts, vec!["9"]);
    }

    #[test]
    fn test_multiple_contacts_follow_join_semantics() {
        let rows = vec![classified("1", "A", Classification::High)];
        let contacts = directory(vec![contact("1", "Anna", "111"), contact("1", "Anna", "333")]);
        let build = build_report(&rows, &["1".to_string()], &contacts);
        let phones: Vec<_> = build.rows.iter().map(|r| r.phone.as_str()).collect();
        assert_eq!(phones, vec!["111", "333"]);
    }
}
