//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - deserialized straight from request bodies and artifact files
//! - passed by reference through the prediction facade
//! - serialized back out as JSON responses or CSV rows

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Number of features consumed by the regressors.
pub const FEATURE_COUNT: usize = 3;

/// Feature vector in training column order: `[asylum, origin, procedure]`.
///
/// The request year is deliberately not part of it.
pub type FeatureVector = [f32; FEATURE_COUNT];

/// Refugee status determination procedure type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Procedure {
    Government,
    #[serde(rename = "UNHCR")]
    Unhcr,
    Joint,
    Unknown,
}

impl Procedure {
    pub const ALL: [Procedure; 4] = [
        Procedure::Government,
        Procedure::Unhcr,
        Procedure::Joint,
        Procedure::Unknown,
    ];

    /// Label as it appears in requests.
    pub fn as_str(self) -> &'static str {
        match self {
            Procedure::Government => "Government",
            Procedure::Unhcr => "UNHCR",
            Procedure::Joint => "Joint",
            Procedure::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Procedure {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Procedure::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let valid: Vec<&str> = Procedure::ALL.iter().map(|p| p.as_str()).collect();
                format!("Procedure must be one of: {}", valid.join(", "))
            })
    }
}

/// Which categorical request field a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryField {
    Origin,
    Asylum,
    Procedure,
}

impl CategoryField {
    /// Request field name.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryField::Origin => "origin",
            CategoryField::Asylum => "asylum",
            CategoryField::Procedure => "procedure",
        }
    }

    /// Wording used in user-facing error messages.
    pub fn label(self) -> &'static str {
        match self {
            CategoryField::Origin => "origin",
            CategoryField::Asylum => "asylum country",
            CategoryField::Procedure => "procedure type",
        }
    }
}

impl fmt::Display for CategoryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Inclusive range of accepted request years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearBounds {
    pub min: i32,
    pub max: i32,
}

impl Default for YearBounds {
    /// Years covered by the reference training data.
    fn default() -> Self {
        Self {
            min: 2000,
            max: 2016,
        }
    }
}

impl YearBounds {
    pub fn contains(&self, year: i64) -> bool {
        (i64::from(self.min)..=i64::from(self.max)).contains(&year)
    }
}

/// Year as sent by clients: either a JSON integer or a string holding one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum YearInput {
    Number(i64),
    Text(String),
}

impl YearInput {
    /// Integer value, if the input holds one.
    pub fn parse(&self) -> Option<i64> {
        match self {
            YearInput::Number(n) => Some(*n),
            YearInput::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<i64> for YearInput {
    fn from(value: i64) -> Self {
        YearInput::Number(value)
    }
}

impl From<&str> for YearInput {
    fn from(value: &str) -> Self {
        YearInput::Text(value.to_string())
    }
}

/// Wire shape of a prediction request; every field may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPredictionRequest {
    pub origin: Option<String>,
    pub asylum: Option<String>,
    pub year: Option<YearInput>,
    pub procedure: Option<String>,
}

/// A validated prediction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub origin: String,
    pub asylum: String,
    pub year: i32,
    pub procedure: Procedure,
}

/// Point estimate plus symmetric confidence margin, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Predicted acceptance rate in `[0, 100]`.
    pub rate: f64,
    /// Half-width of the confidence interval (`>= 0`).
    pub confidence: f64,
}

impl PredictionResult {
    /// Round both values to one decimal place for display.
    pub fn rounded(self) -> Self {
        Self {
            rate: round_1dp(self.rate),
            confidence: round_1dp(self.confidence),
        }
    }
}

fn round_1dp(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Residual statistics of the primary regressor on its training data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualStats {
    pub residual_std: f64,
    #[serde(default)]
    pub mean_residual: f64,
}

/// Training metadata persisted next to the models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    #[serde(default)]
    pub rmse: f64,
    #[serde(default)]
    pub mae: Option<f64>,
    #[serde(default, deserialize_with = "de_training_date")]
    pub training_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub n_samples_train: Option<u64>,
    #[serde(default)]
    pub n_samples_test: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
}

impl Default for ModelMetadata {
    /// Figures reported for the reference model when no metadata file exists.
    fn default() -> Self {
        Self {
            model_type: default_model_type(),
            rmse: 0.439,
            mae: Some(0.137),
            training_date: None,
            n_samples_train: None,
            n_samples_test: None,
            feature_names: Vec::new(),
            objective: None,
        }
    }
}

fn default_model_type() -> String {
    "XGBoost".to_string()
}

/// Accept naive ISO timestamps (`2024-03-01T10:15:30.123456`) as well as
/// RFC 3339 ones with an offset; anything else is treated as absent.
fn de_training_date<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let s = s.trim();
        NaiveDateTime::from_str(s)
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
    }))
}

/// The subset of metadata exposed by the info accessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub rmse: f64,
    pub mae: Option<f64>,
    pub training_date: Option<NaiveDateTime>,
    pub n_samples_train: Option<u64>,
    pub n_samples_test: Option<u64>,
}

impl From<&ModelMetadata> for ModelInfo {
    fn from(meta: &ModelMetadata) -> Self {
        Self {
            model_type: meta.model_type.clone(),
            rmse: meta.rmse,
            mae: meta.mae,
            training_date: meta.training_date,
            n_samples_train: meta.n_samples_train,
            n_samples_test: meta.n_samples_test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedure_parses_case_insensitively() {
        assert_eq!("unhcr".parse::<Procedure>(), Ok(Procedure::Unhcr));
        assert_eq!(" Government ".parse::<Procedure>(), Ok(Procedure::Government));
        let err = "Tribunal".parse::<Procedure>().unwrap_err();
        assert!(err.contains("Government, UNHCR, Joint, Unknown"));
    }

    #[test]
    fn year_input_accepts_numbers_and_numeric_strings() {
        let n: YearInput = serde_json::from_str("2015").unwrap();
        let s: YearInput = serde_json::from_str("\"2015\"").unwrap();
        let bad: YearInput = serde_json::from_str("\"soon\"").unwrap();
        assert_eq!(n.parse(), Some(2015));
        assert_eq!(s.parse(), Some(2015));
        assert_eq!(bad.parse(), None);
    }

    #[test]
    fn year_bounds_are_inclusive() {
        let bounds = YearBounds::default();
        assert!(bounds.contains(2000));
        assert!(bounds.contains(2016));
        assert!(!bounds.contains(1999));
        assert!(!bounds.contains(2021));
    }

    #[test]
    fn rounding_keeps_one_decimal() {
        let r = PredictionResult {
            rate: 75.04999,
            confidence: 19.6000001,
        }
        .rounded();
        assert_eq!(r.rate, 75.0);
        assert_eq!(r.confidence, 19.6);
    }

    #[test]
    fn metadata_accepts_python_isoformat_dates() {
        let meta: ModelMetadata = serde_json::from_str(
            r#"{"rmse": 0.41, "mae": 0.12, "training_date": "2024-03-01T10:15:30.123456",
                "n_samples_train": 800, "n_samples_test": 200, "model_type": "XGBoost"}"#,
        )
        .unwrap();
        let date = meta.training_date.expect("parsed date");
        assert_eq!(date.to_string(), "2024-03-01 10:15:30.123456");
        assert_eq!(meta.n_samples_test, Some(200));
    }

    #[test]
    fn metadata_missing_fields_fall_back_to_serde_defaults() {
        let meta: ModelMetadata = serde_json::from_str(r#"{"training_date": "last tuesday"}"#).unwrap();
        assert_eq!(meta.model_type, "XGBoost");
        assert_eq!(meta.rmse, 0.0);
        assert!(meta.training_date.is_none());
    }
}
