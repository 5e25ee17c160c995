//! Metric names and recording helpers for pipeline runs.
//!
//! Recording goes through the `metrics` facade; with no recorder installed
//! the calls are no-ops, so an embedding process decides where they go.

use crate::types::Classification;
use metrics::{counter, histogram};
use std::fmt;

/// All metric names used by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    RunsTotal,
    RunDuration,
    RowsLoaded,
    RowsExcluded,
    Classifications,
    PatientsRetained,
    ReportRowsWritten,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricName::RunsTotal => "lab_pipeline_runs_total",
            MetricName::RunDuration => "lab_pipeline_duration_seconds",
            MetricName::RowsLoaded => "lab_rows_loaded_total",
            MetricName::RowsExcluded => "lab_rows_excluded_total",
            MetricName::Classifications => "lab_classifications_total",
            MetricName::PatientsRetained => "lab_patients_retained_total",
            MetricName::ReportRowsWritten => "lab_report_rows_written_total",
        };
        f.write_str(name)
    }
}

pub fn run_started() {
    counter!(MetricName::RunsTotal.to_string()).increment(1);
}

pub fn run_finished(duration_secs: f64) {
    histogram!(MetricName::RunDuration.to_string()).record(duration_secs);
}

pub fn rows_loaded(count: usize) {
    counter!(MetricName::RowsLoaded.to_string()).increment(count as u64);
}

/// `reason` is one of: malformed_row, test_count_gate, unknown_test, invalid_value
pub fn rows_excluded(reason: &'static str, count: usize) {
    counter!(MetricName::RowsExcluded.to_string(), "reason" => reason).increment(count as u64);
}

pub fn classified(classification: Classification) {
    counter!(
        MetricName::Classifications.to_string(),
        "classification" => classification.name()
    )
    .increment(1);
}

/// `gate` is either test_count or bad_results
pub fn patients_retained(gate: &'static str, count: usize) {
    counter!(MetricName::PatientsRetained.to_string(), "gate" => gate).increment(count as u64);
}

pub fn report_rows_written(sink: &'static str, count: usize) {
    counter!(MetricName::ReportRowsWritten.to_string(), "sink" => sink).increment(count as u64);
}
