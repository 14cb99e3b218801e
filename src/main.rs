//! FraudGuard API Server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use fraudguard_api::{
    config::Config,
    create_router, db,
    features::FeatureSchema,
    inference::OnnxScorer,
    init_tracing,
    store::PgStore,
    AppState, PredictionService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(config.is_production());

    tracing::info!("FraudGuard API starting...");
    tracing::info!("Database: {}", config.database_host());

    // Load model and its feature schema
    let schema = FeatureSchema::from_file(&config.model_schema_path)
        .with_context(|| format!("Failed to load feature schema {}", config.model_schema_path.display()))?;
    tracing::info!(
        schema = %schema.tag(),
        columns = schema.columns().len(),
        "Feature schema loaded"
    );

    let scorer = Arc::new(
        OnnxScorer::load(&config.model_path, schema, config.onnx_threads)
            .context("Failed to load model")?,
    );

    // Initialize database pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to create database pool")?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;

    // Build application state
    let service = PredictionService::new(
        scorer.clone(),
        Arc::new(PgStore::new(pool.clone())),
        config.scoring_workers,
        config.history_max_limit,
    );

    // Build router
    let app = create_router(AppState::new(service));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Shutdown
    pool.close().await;
    scorer.unload();
    tracing::info!("FraudGuard API stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
