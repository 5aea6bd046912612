//! Shared workflow used by the CLI commands and the server start-up.
//!
//! Keeping this in one place avoids duplicating the core steps:
//! artifacts -> bundle -> predictor -> (score | evaluate)
//!
//! The command handlers can then focus on presentation.

use std::path::Path;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::error;

use crate::config::ServiceConfig;
use crate::error::AppError;
use crate::eval::{EvalConfig, Evaluation};
use crate::io::{Dataset, RequestRow, ScoredRow, load_bundle, load_dataset};
use crate::predict::{PredictError, Predictor};
use crate::server::AppState;

/// Load the bundle from the configured directory.
pub fn load_predictor(config: &ServiceConfig) -> Result<Predictor, AppError> {
    let bundle = load_bundle(&config.model_dir)?;
    Ok(Predictor::new(Arc::new(bundle), config.years))
}

/// Server state built before the listener is bound.
///
/// A failed load is logged and leaves the state without a predictor, so the
/// service still starts and reports unhealthy.
pub fn startup_state(config: &ServiceConfig) -> AppState {
    let predictor = match load_predictor(config) {
        Ok(p) => Some(p),
        Err(e) => {
            error!(model_dir = %config.model_dir.display(), "{}", e.message());
            None
        }
    };
    AppState::new(predictor, config.cors_origins.clone())
}

/// Score every row against the same bundle. Row failures stay with their row.
pub fn score_rows(predictor: &Predictor, rows: Vec<RequestRow>) -> Vec<ScoredRow> {
    rows.into_par_iter()
        .map(|row| {
            let outcome = match &row.parse_error {
                Some(message) => Err(PredictError::InvalidInput(message.clone())),
                None => predictor.predict_raw(&row.request),
            };
            ScoredRow { row, outcome }
        })
        .collect()
}

/// Ingest a raw dataset and evaluate the bundle against it.
pub fn run_evaluation(
    predictor: &Predictor,
    data: &Path,
    config: &EvalConfig,
) -> Result<(Dataset, Evaluation), AppError> {
    let dataset = load_dataset(data)?;
    let evaluation = crate::eval::evaluate(predictor, &dataset.records, config)?;
    Ok((dataset, evaluation))
}
