//! Gradient-boosted tree models.
//!
//! Models are evaluated natively: the XGBoost JSON artifact is converted into a
//! compact forest once at load time, and prediction is a pure function over it.

pub mod tree;
pub mod xgboost;

pub use tree::*;
pub use xgboost::{ModelError, XgbModel};
