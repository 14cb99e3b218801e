//! Database module - PostgreSQL connection and migrations

use sqlx::{postgres::PgPoolOptions, PgPool};

/// Create database connection pool
pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Multi-statement script: needs the simple query protocol
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await?;

    tracing::info!("Database schema applied successfully");
    Ok(())
}

/// Database schema SQL. Both tables are append-only.
const SCHEMA_SQL: &str = r#"
-- Raw transactions as received
CREATE TABLE IF NOT EXISTS transactions_log (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    amount DOUBLE PRECISION NOT NULL CHECK (amount > 0),
    seconds_elapsed DOUBLE PRECISION NOT NULL,
    pca_vector JSONB NOT NULL,
    idempotency_key VARCHAR(255) UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
);

-- Model output, one per transaction
CREATE TABLE IF NOT EXISTS fraud_predictions (
    id BIGSERIAL PRIMARY KEY,
    transaction_id UUID NOT NULL UNIQUE REFERENCES transactions_log(id),
    risk_score DOUBLE PRECISION NOT NULL CHECK (risk_score >= 0 AND risk_score <= 1),
    prediction_class SMALLINT NOT NULL CHECK (prediction_class IN (0, 1)),
    model_version TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_transactions_log_created ON transactions_log(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_fraud_predictions_class ON fraud_predictions(prediction_class);
"#;
