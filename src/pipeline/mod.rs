// Batch pipeline: ingestion, processing, and output

pub mod ingestion;
pub mod output;
pub mod processing;

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::DatabaseManager;
use crate::error::Result;
use crate::types::{Classification, ContactRecord, ReferenceRange, ReportRow, TestResult};
use output::{DatabaseReportSink, ReportSink, SpreadsheetReportSink};
use processing::{
    apply_invalid_policy, build_report, classify_batch, filter_by_test_count,
    patients_with_bad_results, Classifier, MarkerNormalizer, Normalizer, RangeClassifier,
};

/// How a run treats its outputs
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Compute the report without writing either output
    pub dry_run: bool,
    /// Delete existing report table rows in the same transaction as the insert
    pub replace: bool,
}

/// Counts gathered while turning test results into report rows
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub rows_in: usize,
    pub rows_after_test_count_gate: usize,
    pub unknown_test_rows: usize,
    pub invalid_rows: usize,
    pub classifications: BTreeMap<String, usize>,
    pub retained_patients: usize,
    pub missing_contacts: usize,
    pub report_rows: usize,
}

/// Report rows and the stats that produced them
#[derive(Debug, Clone, Default)]
pub struct ProcessedReport {
    pub rows: Vec<ReportRow>,
    pub stats: ProcessingStats,
}

/// Result of a complete pipeline run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub malformed_input_rows: usize,
    #[serde(flatten)]
    pub stats: ProcessingStats,
    pub database_rows_written: usize,
    pub report_table: Option<String>,
    pub spreadsheet: Option<String>,
    #[serde(skip)]
    pub rows: Vec<ReportRow>,
}

pub struct Pipeline<'a> {
    config: &'a Config,
    normalizer: Box<dyn Normalizer + 'a>,
    classifier: Box<dyn Classifier + 'a>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            normalizer: Box::new(MarkerNormalizer::from_config(&config.markers)),
            classifier: Box::new(RangeClassifier),
        }
    }

    /// Build a pipeline around custom normalization and classification stages
    pub fn with_stages(
        config: &'a Config,
        normalizer: Box<dyn Normalizer + 'a>,
        classifier: Box<dyn Classifier + 'a>,
    ) -> Self {
        Self {
            config,
            normalizer,
            classifier,
        }
    }

    /// Run every stage once: load, gate, normalize, classify, gate, report,
    /// write. Any failure aborts the run and leaves the report table
    /// unchanged; the table is only written after the spreadsheet is saved.
    pub fn run(&self, db: &mut DatabaseManager, options: RunOptions) -> Result<PipelineResult> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id);
        let _enter = span.enter();

        let started_at = Utc::now();
        let t_run = Instant::now();
        crate::metrics::run_started();
        info!("🚀 Starting lab follow-up run {}", run_id);
        println!("🚀 Starting lab follow-up run {}", run_id);

        // Step 1: Load raw rows
        println!("📥 Loading test results from {}", self.config.input.path.display());
        let loaded = ingestion::load_test_results(&self.config.input)?;
        crate::metrics::rows_loaded(loaded.results.len());
        crate::metrics::rows_excluded("malformed_row", loaded.malformed_rows);
        println!(
            "✅ Loaded {} rows ({} malformed skipped)",
            loaded.results.len(),
            loaded.malformed_rows
        );

        // Step 2: Reference data
        let ranges = db.load_reference_ranges()?;
        let contacts = db.load_contacts()?;

        // Step 3: Gates and classification
        println!("🔧 Classifying results...");
        let processed = self.process(loaded.results, &ranges, &contacts)?;
        println!(
            "✅ {} patients retained, {} report rows",
            processed.stats.retained_patients, processed.stats.report_rows
        );

        // Step 4: Outputs
        let mut database_rows_written = 0;
        let mut report_table = None;
        let mut spreadsheet = None;
        if options.dry_run {
            info!("Dry run, skipping report outputs");
            println!("🔎 Dry run: nothing written");
        } else {
            // Table commit goes last so a failed spreadsheet save leaves it untouched
            let mut xlsx_sink =
                SpreadsheetReportSink::new(&self.config.output.path, &self.config.output.sheet);
            write_to(&mut xlsx_sink, &processed.rows)?;
            spreadsheet = Some(xlsx_sink.path().display().to_string());

            let mut db_sink = DatabaseReportSink::new(db, options.replace);
            database_rows_written = write_to(&mut db_sink, &processed.rows)?;
            report_table = Some(self.config.database.report_table.clone());
            println!(
                "💾 Saved report to table {} and {}",
                self.config.database.report_table,
                xlsx_sink.path().display()
            );
        }

        let total_secs = t_run.elapsed().as_secs_f64();
        crate::metrics::run_finished(total_secs);
        info!("Run {} finished in {:.3}s", run_id, total_secs);

        Ok(PipelineResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: options.dry_run,
            malformed_input_rows: loaded.malformed_rows,
            stats: processed.stats,
            database_rows_written,
            report_table,
            spreadsheet,
            rows: processed.rows,
        })
    }

    /// The in-memory part of a run, from raw rows to report rows
    pub fn process(
        &self,
        results: Vec<TestResult>,
        ranges: &HashMap<String, ReferenceRange>,
        contacts: &HashMap<String, Vec<ContactRecord>>,
    ) -> Result<ProcessedReport> {
        let thresholds = &self.config.thresholds;
        let mut stats = ProcessingStats {
            rows_in: results.len(),
            ..Default::default()
        };

        let gated = filter_by_test_count(results, thresholds.min_tests);
        stats.rows_after_test_count_gate = gated.len();
        crate::metrics::rows_excluded("test_count_gate", stats.rows_in - gated.len());

        let normalized = self.normalizer.normalize(&gated);
        let batch = classify_batch(self.classifier.as_ref(), normalized, ranges);
        stats.unknown_test_rows = batch.unknown_tests.len();
        crate::metrics::rows_excluded("unknown_test", stats.unknown_test_rows);
        for classification in Classification::ALL {
            stats
                .classifications
                .insert(classification.name().to_string(), batch.count(classification));
        }

        let (classified, invalid_rows) =
            apply_invalid_policy(batch.classified, self.config.classifier.invalid_values)?;
        stats.invalid_rows = invalid_rows;
        crate::metrics::rows_excluded("invalid_value", invalid_rows);

        let retained = patients_with_bad_results(&classified, thresholds.min_bad_results);
        stats.retained_patients = retained.len();

        let report = build_report(&classified, &retained, contacts);
        if !report.missing_contacts.is_empty() {
            info!(
                "{} retained patients have no contact record",
                report.missing_contacts.len()
            );
        }
        stats.missing_contacts = report.missing_contacts.len();
        stats.report_rows = report.rows.len();

        Ok(ProcessedReport {
            rows: report.rows,
            stats,
        })
    }
}

fn write_to(sink: &mut dyn ReportSink, rows: &[ReportRow]) -> Result<usize> {
    match sink.write_report(rows) {
        Ok(written) => {
            crate::metrics::report_rows_written(sink.name(), written);
            Ok(written)
        }
        Err(e) => {
            warn!("Writing report to {} failed: {}", sink.name(), e);
            Err(e)
        }
    }
}
