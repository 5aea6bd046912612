//! The loaded, immutable model state shared by every request.

use std::path::PathBuf;

use crate::domain::{ModelInfo, ModelMetadata};
use crate::encode::EncoderTable;
use crate::models::Forest;

/// How the confidence margin is derived, chosen once at load time.
#[derive(Debug, Clone)]
pub enum ConfidenceStrategy {
    /// Half the distance between lower and upper quantile predictions.
    Quantile { lower: Forest, upper: Forest },
    /// A fixed multiple of the training residual standard deviation.
    Residual { residual_std: f64 },
    /// No uncertainty data: the margin is zero.
    None,
}

impl ConfidenceStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ConfidenceStrategy::Quantile { .. } => "quantile",
            ConfidenceStrategy::Residual { .. } => "residual",
            ConfidenceStrategy::None => "none",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub primary: Forest,
    pub confidence: ConfidenceStrategy,
    pub encoders: EncoderTable,
    pub metadata: ModelMetadata,
    /// Directory the artifacts were read from, if any.
    pub source: Option<PathBuf>,
}

impl ModelBundle {
    pub fn new(primary: Forest, encoders: EncoderTable) -> Self {
        Self {
            primary,
            confidence: ConfidenceStrategy::None,
            encoders,
            metadata: ModelMetadata::default(),
            source: None,
        }
    }

    pub fn with_confidence(mut self, confidence: ConfidenceStrategy) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_metadata(mut self, metadata: ModelMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo::from(&self.metadata)
    }
}
