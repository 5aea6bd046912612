//! Offline evaluation of a loaded bundle against raw asylum-seeker records.
//!
//! Rows are strictly encoded (exact class names only, no alias ladder), split
//! with a seeded shuffle, and scored in parallel. Metrics are on the fraction
//! scale the regressors are trained on.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;

use crate::domain::{CategoryField, FeatureVector, ResidualStats};
use crate::encode::EncoderTable;
use crate::error::AppError;
use crate::io::AsylumRecord;
use crate::predict::Predictor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalConfig {
    /// Share of encoded rows held out for RMSE/MAE, in `(0, 1]`.
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// Rows dropped because a category was not in the encoder vocabulary.
///
/// Each row counts once, against the first field that failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipCounts {
    pub asylum: usize,
    pub origin: usize,
    pub procedure: usize,
}

impl SkipCounts {
    pub fn total(&self) -> usize {
        self.asylum + self.origin + self.procedure
    }

    fn bump(&mut self, field: CategoryField) {
        match field {
            CategoryField::Asylum => self.asylum += 1,
            CategoryField::Origin => self.origin += 1,
            CategoryField::Procedure => self.procedure += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodedRow {
    pub features: FeatureVector,
    pub target: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub rows_encoded: usize,
    pub skipped: SkipCounts,
    pub test_rows: usize,
    pub rmse: f64,
    pub mae: f64,
    /// Rows the residual statistics were computed on.
    pub residual_rows: usize,
    pub residuals: ResidualStats,
}

/// Encode records with exact class lookups, counting the rows that miss.
pub fn encode_records(encoders: &EncoderTable, records: &[AsylumRecord]) -> (Vec<EncodedRow>, SkipCounts) {
    let mut rows = Vec::with_capacity(records.len());
    let mut skipped = SkipCounts::default();

    for rec in records {
        let lookup = |field: CategoryField, value: &str| encoders.code(field, value).ok_or(field);
        let encoded = lookup(CategoryField::Asylum, &rec.asylum).and_then(|asylum| {
            let origin = lookup(CategoryField::Origin, &rec.origin)?;
            let procedure = lookup(CategoryField::Procedure, &rec.procedure)?;
            Ok([asylum as f32, origin as f32, procedure as f32])
        });
        match encoded {
            Ok(features) => rows.push(EncodedRow {
                features,
                target: rec.acceptance_rate,
            }),
            Err(field) => skipped.bump(field),
        }
    }

    (rows, skipped)
}

/// Shuffle `0..n` with a seeded RNG and cut off the hold-out part.
///
/// Returns `(test, rest)`. The hold-out has at least one row; when it takes
/// every row, `rest` is empty.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_len = ((n as f64) * test_fraction).round() as usize;
    let test_len = test_len.clamp(1usize.min(n), n);
    let rest = indices.split_off(test_len);
    (indices, rest)
}

pub fn rmse(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let sse: f64 = residuals.iter().map(|r| r * r).sum();
    (sse / residuals.len() as f64).sqrt()
}

pub fn mae(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    residuals.iter().map(|r| r.abs()).sum::<f64>() / residuals.len() as f64
}

/// Mean and population standard deviation of residuals.
pub fn residual_stats(residuals: &[f64]) -> ResidualStats {
    if residuals.is_empty() {
        return ResidualStats {
            residual_std: 0.0,
            mean_residual: 0.0,
        };
    }
    let n = residuals.len() as f64;
    let mean = residuals.iter().sum::<f64>() / n;
    let var = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    ResidualStats {
        residual_std: var.sqrt(),
        mean_residual: mean,
    }
}

/// `actual - predicted` for each row, scored in parallel.
fn residuals_for(predictor: &Predictor, rows: &[EncodedRow], indices: &[usize]) -> Result<Vec<f64>, AppError> {
    let residuals: Vec<f64> = indices
        .par_iter()
        .map(|&i| rows[i].target - predictor.raw_estimate(&rows[i].features))
        .collect();
    if residuals.iter().any(|r| !r.is_finite()) {
        return Err(AppError::new(4, "Non-finite model prediction during evaluation."));
    }
    Ok(residuals)
}

pub fn evaluate(predictor: &Predictor, records: &[AsylumRecord], config: &EvalConfig) -> Result<Evaluation, AppError> {
    if !(config.test_fraction > 0.0 && config.test_fraction <= 1.0) {
        return Err(AppError::new(
            2,
            format!("test fraction must be in (0, 1], got {}", config.test_fraction),
        ));
    }

    let (rows, skipped) = encode_records(&predictor.bundle().encoders, records);
    if rows.is_empty() {
        return Err(AppError::new(
            3,
            format!("No rows could be encoded ({} skipped for unseen categories).", skipped.total()),
        ));
    }

    let (test, rest) = split_indices(rows.len(), config.test_fraction, config.seed);
    let test_residuals = residuals_for(predictor, &rows, &test)?;
    let fit_indices = if rest.is_empty() { &test } else { &rest };
    let fit_residuals = if rest.is_empty() {
        test_residuals.clone()
    } else {
        residuals_for(predictor, &rows, &rest)?
    };

    Ok(Evaluation {
        rows_encoded: rows.len(),
        skipped,
        test_rows: test.len(),
        rmse: rmse(&test_residuals),
        mae: mae(&test_residuals),
        residual_rows: fit_indices.len(),
        residuals: residual_stats(&fit_residuals),
    })
}
