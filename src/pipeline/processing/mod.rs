// Pipeline processing: normalization, classification, gating and report assembly

pub mod aggregate;
pub mod classify;
pub mod normalize;
pub mod report;

pub use aggregate::{filter_by_test_count, patients_with_bad_results};
pub use classify::{apply_invalid_policy, classify_batch, ClassifiedResult, Classifier, RangeClassifier};
pub use normalize::{MarkerNormalizer, Normalizer};
pub use report::{build_report, ReportBuild};
