//! Domain types used throughout the service.
//!
//! This module defines:
//!
//! - request shapes (`RawPredictionRequest`, `PredictionRequest`, `Procedure`, `YearInput`)
//! - prediction outputs (`PredictionResult`)
//! - persisted records (`ModelMetadata`, `ResidualStats`)

pub mod types;

pub use types::*;
