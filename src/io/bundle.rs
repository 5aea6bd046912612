//! Model artifact directory loading.
//!
//! Layout:
//!
//! | file                        | required | content                                  |
//! |-----------------------------|----------|------------------------------------------|
//! | `xgboost_model.json`        | yes      | primary regressor (XGBoost JSON)         |
//! | `label_encoders.json`       | yes      | class lists for country/origin/procedure |
//! | `xgboost_model_lower.json`  | no       | lower quantile regressor                 |
//! | `xgboost_model_upper.json`  | no       | upper quantile regressor                 |
//! | `residual_stats.json`       | no       | residual mean / standard deviation       |
//! | `model_metadata.json`       | no       | training metadata                        |
//!
//! Missing or broken required artifacts fail the load. Optional artifacts that
//! are missing or broken only downgrade what the bundle can do, and are logged.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::domain::{FEATURE_COUNT, ModelMetadata, ResidualStats};
use crate::encode::{EncoderFile, EncoderTable};
use crate::models::{Forest, ModelError, XgbModel};
use crate::predict::{ConfidenceStrategy, ModelBundle};

pub const PRIMARY_MODEL: &str = "xgboost_model.json";
pub const LOWER_MODEL: &str = "xgboost_model_lower.json";
pub const UPPER_MODEL: &str = "xgboost_model_upper.json";
pub const ENCODERS: &str = "label_encoders.json";
pub const RESIDUAL_STATS: &str = "residual_stats.json";
pub const METADATA: &str = "model_metadata.json";

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("model directory not found: {}", path.display())]
    MissingDirectory { path: PathBuf },
    #[error("required artifact not found: {}", path.display())]
    MissingArtifact { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model {}: {source}", path.display())]
    Model {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("invalid artifact {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

/// Load every artifact from `dir` into an immutable bundle.
pub fn load_bundle(dir: &Path) -> Result<ModelBundle, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }

    let primary = load_forest(&dir.join(PRIMARY_MODEL))?;
    let encoders = load_encoders(&dir.join(ENCODERS))?;
    let confidence = load_confidence(dir);
    let metadata = load_metadata(dir);

    info!(
        dir = %dir.display(),
        trees = primary.num_trees(),
        confidence = confidence.name(),
        model_type = %metadata.model_type,
        "models loaded"
    );

    Ok(ModelBundle {
        primary,
        confidence,
        encoders,
        metadata,
        source: Some(dir.to_path_buf()),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    if !path.is_file() {
        return Err(LoadError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and convert a single XGBoost JSON model.
pub fn load_forest(path: &Path) -> Result<Forest, LoadError> {
    let model: XgbModel = read_json(path)?;
    model.to_forest(FEATURE_COUNT).map_err(|source| LoadError::Model {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_encoders(path: &Path) -> Result<EncoderTable, LoadError> {
    let file: EncoderFile = read_json(path)?;
    EncoderTable::from_file(file).map_err(|message| LoadError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

pub fn load_residual_stats(path: &Path) -> Result<ResidualStats, LoadError> {
    let stats: ResidualStats = read_json(path)?;
    if !(stats.residual_std.is_finite() && stats.residual_std >= 0.0) {
        return Err(LoadError::Invalid {
            path: path.to_path_buf(),
            message: format!("residual_std must be finite and >= 0, got {}", stats.residual_std),
        });
    }
    Ok(stats)
}

/// Write residual statistics in the format `load_residual_stats` reads.
pub fn write_residual_stats(path: &Path, stats: &ResidualStats) -> Result<(), LoadError> {
    let file = File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, stats).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Pick the best available confidence strategy: quantile pair, then residual
/// statistics, then none.
fn load_confidence(dir: &Path) -> ConfidenceStrategy {
    let lower_path = dir.join(LOWER_MODEL);
    let upper_path = dir.join(UPPER_MODEL);

    match (lower_path.is_file(), upper_path.is_file()) {
        (true, true) => match (load_forest(&lower_path), load_forest(&upper_path)) {
            (Ok(lower), Ok(upper)) => return ConfidenceStrategy::Quantile { lower, upper },
            (Err(e), _) | (_, Err(e)) => {
                warn!("could not load quantile models, falling back: {e}");
            }
        },
        (true, false) | (false, true) => {
            warn!("only one quantile model present in {}, ignoring it", dir.display());
        }
        (false, false) => {}
    }

    let stats_path = dir.join(RESIDUAL_STATS);
    if stats_path.is_file() {
        match load_residual_stats(&stats_path) {
            Ok(stats) => {
                return ConfidenceStrategy::Residual {
                    residual_std: stats.residual_std,
                };
            }
            Err(e) => warn!("could not load residual statistics: {e}"),
        }
    }

    ConfidenceStrategy::None
}

fn load_metadata(dir: &Path) -> ModelMetadata {
    let path = dir.join(METADATA);
    if !path.is_file() {
        return ModelMetadata::default();
    }
    parse_metadata(&path).unwrap_or_else(|e| {
        warn!("could not load model metadata, using defaults: {e}");
        ModelMetadata::default()
    })
}

/// Every metadata field is optional, so only a JSON object counts as metadata.
fn parse_metadata(path: &Path) -> Result<ModelMetadata, LoadError> {
    let value: serde_json::Value = read_json(path)?;
    if !value.is_object() {
        return Err(LoadError::Invalid {
            path: path.to_path_buf(),
            message: "expected a JSON object".to_string(),
        });
    }
    serde_json::from_value(value).map_err(|source| LoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fixture_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/bundle")
    }

    /// Copy the fixture bundle, keeping only `files`.
    fn partial_bundle(files: &[&str]) -> tempfile::TempDir {
        let tmp = tempdir().expect("tempdir");
        for name in files {
            std::fs::copy(fixture_dir().join(name), tmp.path().join(name)).expect("copy fixture");
        }
        tmp
    }

    #[test]
    fn full_fixture_uses_quantile_confidence() {
        let bundle = load_bundle(&fixture_dir()).unwrap();
        assert_eq!(bundle.confidence.name(), "quantile");
        assert_eq!(bundle.metadata.n_samples_train, Some(800));
        assert_eq!(bundle.source.as_deref(), Some(fixture_dir().as_path()));
    }

    #[test]
    fn missing_primary_model_is_fatal() {
        let tmp = partial_bundle(&[ENCODERS]);
        let err = load_bundle(tmp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingArtifact { path } if path.ends_with(PRIMARY_MODEL)));
    }

    #[test]
    fn missing_encoders_are_fatal() {
        let tmp = partial_bundle(&[PRIMARY_MODEL]);
        let err = load_bundle(tmp.path()).unwrap_err();
        assert!(matches!(err, LoadError::MissingArtifact { path } if path.ends_with(ENCODERS)));
    }

    #[test]
    fn missing_directory_is_reported() {
        let tmp = tempdir().unwrap();
        let err = load_bundle(&tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, LoadError::MissingDirectory { .. }));
    }

    #[test]
    fn residual_stats_are_the_fallback_when_quantiles_are_absent() {
        let tmp = partial_bundle(&[PRIMARY_MODEL, ENCODERS]);
        write_residual_stats(
            &tmp.path().join(RESIDUAL_STATS),
            &ResidualStats {
                residual_std: 0.12,
                mean_residual: 0.01,
            },
        )
        .unwrap();
        let bundle = load_bundle(tmp.path()).unwrap();
        assert!(matches!(
            bundle.confidence,
            ConfidenceStrategy::Residual { residual_std } if residual_std == 0.12
        ));
    }

    #[test]
    fn lone_quantile_model_is_ignored() {
        let tmp = partial_bundle(&[PRIMARY_MODEL, ENCODERS, LOWER_MODEL]);
        let bundle = load_bundle(tmp.path()).unwrap();
        assert_eq!(bundle.confidence.name(), "none");
    }

    #[test]
    fn broken_optional_artifacts_downgrade_instead_of_failing() {
        let tmp = partial_bundle(&[PRIMARY_MODEL, ENCODERS, LOWER_MODEL]);
        std::fs::write(tmp.path().join(UPPER_MODEL), "{ not json").unwrap();
        std::fs::write(tmp.path().join(RESIDUAL_STATS), r#"{"residual_std": -1.0}"#).unwrap();
        std::fs::write(tmp.path().join(METADATA), "[]").unwrap();

        let bundle = load_bundle(tmp.path()).unwrap();
        assert_eq!(bundle.confidence.name(), "none");
        assert_eq!(bundle.metadata, ModelMetadata::default());
    }

    #[test]
    fn non_object_metadata_falls_back_to_defaults() {
        for body in ["[]", "[1, 2]", "0.4", "null"] {
            let tmp = partial_bundle(&[PRIMARY_MODEL, ENCODERS]);
            std::fs::write(tmp.path().join(METADATA), body).unwrap();
            let bundle = load_bundle(tmp.path()).unwrap();
            assert_eq!(bundle.metadata, ModelMetadata::default(), "{body}");
        }
    }

    #[test]
    fn broken_primary_model_is_fatal() {
        let tmp = partial_bundle(&[ENCODERS]);
        std::fs::write(tmp.path().join(PRIMARY_MODEL), r#"{"learner": {}}"#).unwrap();
        assert!(matches!(load_bundle(tmp.path()), Err(LoadError::Json { .. })));
    }
}
