//! FraudGuard API
//!
//! Fraud-risk scoring for card transactions backed by a pre-trained
//! classification pipeline. Every scored transaction is persisted with
//! its prediction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      FRAUDGUARD API                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  POST /api/v1/predict        GET /api/v1/history         │
//! │            │                          │                  │
//! │            ▼                          │                  │
//! │   ┌──────────────────┐                │                  │
//! │   │ PredictionService│────────────────┤                  │
//! │   └──┬──────────┬────┘                │                  │
//! │      ▼          ▼                     ▼                  │
//! │  vectorize → Scorer (ONNX)     PredictionStore           │
//! │                                       │                  │
//! │                                ┌─────────────┐           │
//! │                                │ PostgreSQL  │           │
//! │                                └─────────────┘           │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod handlers;
pub mod inference;
pub mod models;
pub mod service;
pub mod store;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};
pub use service::PredictionService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self { service }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/predict", post(handlers::predict::predict))
        .route("/history", get(handlers::history::list));

    Router::new()
        .route("/health", get(handlers::health::check))
        .nest("/api/v1", api_routes)
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

/// Initialize logging. JSON lines in production, human-readable otherwise.
pub fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fraudguard_api=debug,tower_http=debug".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
