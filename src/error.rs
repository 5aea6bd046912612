//! Application-level error with a process exit code.
//!
//! Library modules return typed errors (`PredictError`, `LoadError`, ...);
//! the CLI converts them into `AppError` at the boundary so `main` only has to
//! print a message and pick an exit code.
//!
//! Exit codes:
//! - `2` configuration, input, or I/O problems
//! - `3` no usable rows in an input file
//! - `4` model loading or runtime failures

use crate::io::bundle::LoadError;
use crate::predict::PredictError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::new(4, format!("Failed to load models: {err}"))
    }
}

impl From<PredictError> for AppError {
    fn from(err: PredictError) -> Self {
        match err {
            PredictError::ModelsNotLoaded => AppError::new(4, err.to_string()),
            _ => AppError::new(2, err.to_string()),
        }
    }
}
