//! HTTP surface.
//!
//! - `POST /predict`: acceptance-rate estimate with confidence margin
//! - `GET /health`: liveness plus whether models are loaded
//! - `GET /model/info`: training metadata
//!
//! The model bundle is loaded before the listener is bound. A failed load
//! still serves, reporting unhealthy and answering predictions with 503.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::AppError;
use crate::predict::Predictor;

pub mod handlers;
pub mod middleware;

pub use handlers::ApiError;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct AppState {
    pub predictor: Option<Arc<Predictor>>,
    pub cors_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(predictor: Option<Predictor>, cors_origins: Vec<String>) -> Self {
        Self {
            predictor: predictor.map(Arc::new),
            cors_origins: Arc::new(cors_origins),
        }
    }

    pub fn models_loaded(&self) -> bool {
        self.predictor.is_some()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(handlers::predict_handler))
        .route("/health", get(handlers::health_handler))
        .route("/model/info", get(handlers::model_info_handler))
        .layer(from_fn_with_state(state.clone(), middleware::cors_middleware))
        .layer(from_fn(middleware::trace_middleware))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Bind `config`'s address and serve until SIGINT/SIGTERM.
pub async fn serve(config: &ServiceConfig, state: AppState) -> Result<(), AppError> {
    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::new(2, format!("Failed to bind {addr}: {e}")))?;

    info!(
        %addr,
        models_loaded = state.models_loaded(),
        cors_origins = ?state.cors_origins,
        "listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(wait_for_shutdown_signal())
        .await
        .map_err(|e| AppError::new(4, format!("Server error: {e}")))?;

    info!("shut down");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
