use crate::config::MarkerConfig;
use crate::constants::{NEGATIVE_SYMBOL, POSITIVE_SYMBOL};
use crate::types::{NormalizedResult, TestResult};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Unsigned decimal with at most one point: no sign, exponent or grouping
static PLAIN_DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9]+\.?[0-9]*|\.[0-9]+)$").expect("decimal pattern is valid")
});

/// Qualitative outcome a marker prefix maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Positive,
    Negative,
}

impl Marker {
    pub fn symbol(self) -> &'static str {
        match self {
            Marker::Positive => POSITIVE_SYMBOL,
            Marker::Negative => NEGATIVE_SYMBOL,
        }
    }

    /// Inverse of [`Marker::symbol`]
    pub fn from_symbol(value: &str) -> Option<Self> {
        match value {
            POSITIVE_SYMBOL => Some(Marker::Positive),
            NEGATIVE_SYMBOL => Some(Marker::Negative),
            _ => None,
        }
    }
}

/// Trait for mapping raw result text into the canonical vocabulary
pub trait Normalizer {
    fn normalize_value(&self, raw: &str) -> String;

    /// Normalize a batch, keeping length and row order
    fn normalize(&self, results: &[TestResult]) -> Vec<NormalizedResult> {
        results
            .iter()
            .map(|r| NormalizedResult {
                patient_id: r.patient_id.clone(),
                test_id: r.test_id.clone(),
                value: self.normalize_value(&r.raw_value),
            })
            .collect()
    }
}

/// Normalizer driven by a table of marker prefixes. Adding a marker is a
/// table entry, not a code change.
#[derive(Debug, Clone)]
pub struct MarkerNormalizer {
    markers: Vec<(String, Marker)>,
}

impl MarkerNormalizer {
    pub fn new(markers: Vec<(String, Marker)>) -> Self {
        let markers = markers
            .into_iter()
            .map(|(prefix, marker)| (prefix.trim().to_lowercase(), marker))
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        Self { markers }
    }

    pub fn from_config(config: &MarkerConfig) -> Self {
        let positive = config
            .positive
            .iter()
            .map(|p| (p.clone(), Marker::Positive));
        let negative = config
            .negative
            .iter()
            .map(|p| (p.clone(), Marker::Negative));
        Self::new(positive.chain(negative).collect())
    }

    fn match_marker(&self, folded: &str) -> Option<Marker> {
        self.markers
            .iter()
            .find(|(prefix, _)| folded.starts_with(prefix.as_str()))
            .map(|(_, marker)| *marker)
    }
}

impl Default for MarkerNormalizer {
    fn default() -> Self {
        Self::from_config(&MarkerConfig::default())
    }
}

impl Normalizer for MarkerNormalizer {
    fn normalize_value(&self, raw: &str) -> String {
        let folded = raw.trim().to_lowercase();

        if let Some(marker) = self.match_marker(&folded) {
            return marker.symbol().to_string();
        }

        let numeric = folded.replace(',', ".");
        if parse_number(&numeric).is_some() {
            numeric
        } else {
            debug!(value = %folded, "Value is neither a marker nor a number");
            folded
        }
    }
}

/// Parse canonical numeric text: ASCII digits with at most one `.`.
/// Signs, exponents, `nan` and `inf` are rejected.
pub fn parse_number(value: &str) -> Option<f64> {
    if !PLAIN_DECIMAL.is_match(value) {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_prefixes_map_to_symbols() {
        let n = MarkerNormalizer::default();
        assert_eq!(n.normalize_value("п"), "+");
        assert_eq!(n.normalize_value("Положительный"), "+");
        assert_eq!(n.normalize_value("  ОТРИЦАТЕЛЬНЫЙ "), "-");
        assert_eq!(n.normalize_value("отр."), "-");
    }

    #[test]
    fn test_comma_decimal_separator() {
        let n = MarkerNormalizer::default();
        assert_eq!(n.normalize_value("12,5"), "12.5");
        assert_eq!(n.normalize_value(" 40 "), "40");
    }

    #[test]
    fn test_unrecognized_value_passes_through() {
        let n = MarkerNormalizer::default();
        assert_eq!(n.normalize_value("Сомнительно"), "сомнительно");
        assert_eq!(n.normalize_value("1,2,3"), "1,2,3");
        assert_eq!(n.normalize_value("NaN"), "nan");
        assert_eq!(n.normalize_value(""), "");
    }

    #[test]
    fn test_parse_number_accepts_plain_decimals_only() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("40"), Some(40.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("5."), Some(5.0));
        for rejected in ["1e3", "+5", "-3", "1.2.3", ".", "", "nan", "inf", "1 000"] {
            assert_eq!(parse_number(rejected), None, "value {rejected:?}");
        }
    }

    #[test]
    fn test_signed_and_exponent_values_pass_through() {
        let n = MarkerNormalizer::default();
        assert_eq!(n.normalize_value("-3,2"), "-3,2");
        assert_eq!(n.normalize_value("1E3"), "1e3");
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let n = MarkerNormalizer::default();
        for raw in ["п", "о", "12,5", "abc", "+", "-", "7", "-3,2", "", "x,y"] {
            let once = n.normalize_value(raw);
            assert_eq!(n.normalize_value(&once), once, "raw value {raw:?}");
        }
    }

    #[test]
    fn test_marker_table_is_extensible() {
        let n = MarkerNormalizer::new(vec![
            ("pos".to_string(), Marker::Positive),
            ("neg".to_string(), Marker::Negative),
        ]);
        assert_eq!(n.normalize_value("Positive"), "+");
        assert_eq!(n.normalize_value("NEGATIVE"), "-");
        assert_eq!(n.normalize_value("п"), "п");
    }

    #[test]
    fn test_batch_keeps_order_and_length() {
        let n = MarkerNormalizer::default();
        let input = vec![
            TestResult::new("1", "A", "п"),
            TestResult::new("1", "B", "50"),
            TestResult::new("2", "C", "bad"),
        ];
        let out = n.normalize(&input);
        let values: Vec<_> = out.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["+", "50", "bad"]);
        assert_eq!(out[2].patient_id, "2");
    }
}
