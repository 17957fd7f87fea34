//! Pestopia - pest identification and treatment advice
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        PESTOPIA API                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  POST /predict                      POST /recommend          │
//! │      │                                  │                    │
//! │      ▼                                  ▼                    │
//! │  preprocess ─► classify (ONNX)      normalize ─► lookup      │
//! │      │            │                     │                    │
//! │      │     ┌──────┴──────┐        ┌─────┴──────┐             │
//! │      │     │ Classifier  │        │  SQLite    │             │
//! │      │     │ Handle      │        │  (r/o pool)│             │
//! │      │     └─────────────┘        └────────────┘             │
//! │      └──────────── ServiceContext (shared, immutable) ───────│
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod recommend;
pub mod service;

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};

pub use error::{AppError, AppResult, ServiceError};
pub use lifecycle::ServiceContext;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub context: Arc<ServiceContext>,
    pub config: config::Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::health::home))
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/recommend", post(handlers::recommend::recommend))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
