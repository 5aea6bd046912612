//! Prediction facade.
//!
//! `Predictor` turns a request (origin, asylum country, year, procedure) into
//! an acceptance-rate estimate with a confidence margin:
//!
//! 1. validate the year against the configured bounds
//! 2. encode the categorical fields through the persisted encoders
//! 3. evaluate the primary regressor on `[asylum, origin, procedure]`
//! 4. derive the margin from the bundle's confidence strategy
//!
//! Everything here is a pure function over the immutable `ModelBundle`, so a
//! single `Predictor` can be shared across threads without locking.

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    CategoryField, FeatureVector, PredictionRequest, PredictionResult, Procedure,
    RawPredictionRequest, YearBounds, YearInput,
};

pub mod bundle;

pub use bundle::{ConfidenceStrategy, ModelBundle};

/// Regressors predict a fraction; results are reported in percent.
pub const PERCENT: f64 = 100.0;

/// Two-sided 95% normal quantile applied to the residual standard deviation.
pub const RESIDUAL_Z: f64 = 1.96;

/// Request-level failures. None of these are fatal to the process.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PredictError {
    /// Missing, malformed, or out-of-range request field.
    #[error("{0}")]
    InvalidInput(String),
    /// A categorical value that was never seen in training.
    #[error("Unknown {field}: {value}")]
    UnknownCategory { field: CategoryField, value: String },
    /// The service has no model bundle to predict with.
    #[error("Models not loaded")]
    ModelsNotLoaded,
}

/// Shared handle over a loaded bundle plus the accepted year range.
#[derive(Debug, Clone)]
pub struct Predictor {
    bundle: Arc<ModelBundle>,
    years: YearBounds,
}

impl Predictor {
    pub fn new(bundle: Arc<ModelBundle>, years: YearBounds) -> Self {
        Self { bundle, years }
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn years(&self) -> YearBounds {
        self.years
    }

    /// Validate, encode, and predict in one call.
    pub fn predict(
        &self,
        origin: &str,
        asylum: &str,
        year: &YearInput,
        procedure: &str,
    ) -> Result<PredictionResult, PredictError> {
        let request = self.validate(origin, asylum, year, procedure)?;
        self.predict_request(&request)
    }

    /// Predict from the wire shape, where any field may be missing.
    pub fn predict_raw(&self, raw: &RawPredictionRequest) -> Result<PredictionResult, PredictError> {
        // Year is checked before anything else so an out-of-range year always
        // reports as such, whatever the other fields hold.
        let year = raw.year.as_ref().ok_or_else(|| missing("year"))?;
        self.validate_year(year)?;

        let origin = raw.origin.as_deref().ok_or_else(|| missing("origin"))?;
        let asylum = raw.asylum.as_deref().ok_or_else(|| missing("asylum"))?;
        let procedure = raw.procedure.as_deref().ok_or_else(|| missing("procedure"))?;
        self.predict(origin, asylum, year, procedure)
    }

    /// Check field shapes and ranges without touching the encoders.
    pub fn validate(
        &self,
        origin: &str,
        asylum: &str,
        year: &YearInput,
        procedure: &str,
    ) -> Result<PredictionRequest, PredictError> {
        let year = self.validate_year(year)?;
        let origin = non_empty("origin", origin)?;
        let asylum = non_empty("asylum", asylum)?;
        // Procedures are gated by the enum before any vocabulary lookup: a value
        // outside it is malformed input, not an unseen category.
        let procedure: Procedure = procedure.parse().map_err(PredictError::InvalidInput)?;

        Ok(PredictionRequest {
            origin,
            asylum,
            year,
            procedure,
        })
    }

    fn validate_year(&self, year: &YearInput) -> Result<i32, PredictError> {
        let value = year
            .parse()
            .ok_or_else(|| PredictError::InvalidInput("Year must be a valid integer".to_string()))?;
        if !self.years.contains(value) {
            return Err(PredictError::InvalidInput(format!(
                "Year must be between {} and {}",
                self.years.min, self.years.max
            )));
        }
        i32::try_from(value)
            .map_err(|_| PredictError::InvalidInput("Year must be a valid integer".to_string()))
    }

    pub fn predict_request(&self, request: &PredictionRequest) -> Result<PredictionResult, PredictError> {
        let features = self.encode(request)?;
        let result = self.evaluate(&features);
        debug!(
            origin = %request.origin,
            asylum = %request.asylum,
            year = request.year,
            procedure = %request.procedure,
            rate = result.rate,
            confidence = result.confidence,
            "prediction"
        );
        Ok(result)
    }

    /// Encode a validated request into the regressor's feature vector.
    ///
    /// The year is not part of the vector.
    pub fn encode(&self, request: &PredictionRequest) -> Result<FeatureVector, PredictError> {
        let encoders = &self.bundle.encoders;
        let lookup = |field: CategoryField, value: &str| {
            encoders
                .resolve(field, value)
                .ok_or_else(|| PredictError::UnknownCategory {
                    field,
                    value: value.to_string(),
                })
        };

        let origin = lookup(CategoryField::Origin, &request.origin)?;
        let asylum = lookup(CategoryField::Asylum, &request.asylum)?;
        let procedure = lookup(CategoryField::Procedure, request.procedure.as_str())?;

        Ok([asylum as f32, origin as f32, procedure as f32])
    }

    /// Point estimate and margin for an encoded feature vector.
    pub fn evaluate(&self, features: &FeatureVector) -> PredictionResult {
        let rate = clamp_unit(self.bundle.primary.predict_row(features)) * PERCENT;

        let margin = match &self.bundle.confidence {
            ConfidenceStrategy::Quantile { lower, upper } => {
                let lo = clamp_unit(lower.predict_row(features));
                let hi = clamp_unit(upper.predict_row(features));
                (hi - lo) / 2.0 * PERCENT
            }
            ConfidenceStrategy::Residual { residual_std } => RESIDUAL_Z * residual_std * PERCENT,
            ConfidenceStrategy::None => 0.0,
        };

        PredictionResult {
            rate: rate.clamp(0.0, PERCENT),
            confidence: margin.max(0.0),
        }
    }

    /// Unclamped primary-model output for an encoded row, as a fraction.
    pub fn raw_estimate(&self, features: &FeatureVector) -> f64 {
        self.bundle.primary.predict_row(features)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn missing(field: &str) -> PredictError {
    PredictError::InvalidInput(format!("Missing required field: {field}"))
}

fn non_empty(field: &str, value: &str) -> Result<String, PredictError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(PredictError::InvalidInput(format!("{field} must not be empty")));
    }
    Ok(value.to_string())
}
