//! Formatted terminal output.
//!
//! Formatting lives here so command handlers stay thin and output changes are
//! localized.

use crate::domain::{CategoryField, PredictionRequest, PredictionResult};
use crate::eval::Evaluation;
use crate::io::Dataset;
use crate::predict::{ConfidenceStrategy, ModelBundle, PERCENT, RESIDUAL_Z};
use crate::report::ScoreSummary;

pub fn format_prediction(request: &PredictionRequest, result: &PredictionResult) -> String {
    let r = result.rounded();
    let mut out = String::new();
    out.push_str(&format!(
        "{} -> {} ({}, {})\n",
        request.origin, request.asylum, request.year, request.procedure
    ));
    out.push_str(&format!("Acceptance rate: {:.1}% ± {:.1}\n", r.rate, r.confidence));
    out
}

pub fn format_model_info(bundle: &ModelBundle) -> String {
    let meta = &bundle.metadata;
    let mut out = String::new();

    out.push_str("=== asylum - model bundle ===\n");
    if let Some(dir) = &bundle.source {
        out.push_str(&format!("Directory: {}\n", dir.display()));
    }
    out.push_str(&format!("Model: {} ({} trees)\n", meta.model_type, bundle.primary.num_trees()));
    if let Some(objective) = &meta.objective {
        out.push_str(&format!("Objective: {objective}\n"));
    }
    out.push_str(&format!("RMSE: {:.4}\n", meta.rmse));
    if let Some(mae) = meta.mae {
        out.push_str(&format!("MAE : {mae:.4}\n"));
    }
    if let Some(date) = meta.training_date {
        out.push_str(&format!("Trained: {}\n", date.format("%Y-%m-%d %H:%M:%S")));
    }
    match (meta.n_samples_train, meta.n_samples_test) {
        (Some(train), Some(test)) => out.push_str(&format!("Samples: train={train} test={test}\n")),
        (Some(train), None) => out.push_str(&format!("Samples: train={train}\n")),
        _ => {}
    }

    out.push_str(&format!("Confidence: {}", bundle.confidence.name()));
    if let ConfidenceStrategy::Residual { residual_std } = bundle.confidence {
        out.push_str(&format!(
            " (std={residual_std:.4}, margin={:.1})",
            RESIDUAL_Z * residual_std * PERCENT
        ));
    }
    out.push('\n');

    out.push_str("Vocabulary:\n");
    for field in [CategoryField::Origin, CategoryField::Asylum, CategoryField::Procedure] {
        out.push_str(&format!(
            "- {:<16} {}\n",
            field.label(),
            bundle.encoders.encoder(field).len()
        ));
    }
    out
}

pub fn format_evaluation(dataset: &Dataset, eval: &Evaluation) -> String {
    let mut out = String::new();

    out.push_str("=== asylum - evaluation ===\n");
    out.push_str(&format!(
        "Rows: read={} usable={} invalid={}\n",
        dataset.rows_read,
        dataset.records.len(),
        dataset.row_errors.len()
    ));
    out.push_str(&format!(
        "Encoded: {} | skipped: asylum={} origin={} procedure={}\n",
        eval.rows_encoded, eval.skipped.asylum, eval.skipped.origin, eval.skipped.procedure
    ));
    out.push_str(&format!("\nHold-out (n={}):\n", eval.test_rows));
    out.push_str(&format!("- RMSE: {:.4}\n", eval.rmse));
    out.push_str(&format!("- MAE : {:.4}\n", eval.mae));
    out.push_str(&format!("\nResiduals (n={}):\n", eval.residual_rows));
    out.push_str(&format!("- mean: {:.4}\n", eval.residuals.mean_residual));
    out.push_str(&format!("- std : {:.4}\n", eval.residuals.residual_std));
    out
}

pub fn format_score_summary(summary: &ScoreSummary) -> String {
    format!(
        "Scored {} of {} rows ({} failed).",
        summary.scored, summary.rows, summary.failed
    )
}
