//! Prediction model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use chrono::{DateTime, Utc};

/// Fraud class label as produced by the model
pub const FRAUD_CLASS: i16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Safe,
    Suspicious,
}

impl RiskStatus {
    pub fn from_fraud_flag(is_fraud: bool) -> Self {
        if is_fraud {
            RiskStatus::Suspicious
        } else {
            RiskStatus::Safe
        }
    }
}

/// Response shape for both `/predict` and `/history`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub transaction_id: Uuid,
    pub risk_score: f64,
    pub is_fraud: bool,
    pub status: RiskStatus,
    pub created_at: DateTime<Utc>,
}

/// Joined transaction + prediction row
#[derive(Debug, Clone, FromRow)]
pub struct PredictionRow {
    pub transaction_id: Uuid,
    pub risk_score: f64,
    pub prediction_class: i16,
    pub created_at: DateTime<Utc>,
}

impl From<PredictionRow> for PredictionOutcome {
    fn from(row: PredictionRow) -> Self {
        let is_fraud = row.prediction_class == FRAUD_CLASS;
        Self {
            transaction_id: row.transaction_id,
            risk_score: row.risk_score,
            is_fraud,
            status: RiskStatus::from_fraud_flag(is_fraud),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl PredictionRow {
    pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT t.id AS transaction_id, p.risk_score, p.prediction_class, t.created_at
            FROM transactions_log t
            JOIN fraud_predictions p ON p.transaction_id = t.id
            ORDER BY t.created_at DESC, t.id DESC
            LIMIT $1
            "#
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_idempotency_key(
        pool: &PgPool,
        key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRow>(
            r#"
            SELECT t.id AS transaction_id, p.risk_score, p.prediction_class, t.created_at
            FROM transactions_log t
            JOIN fraud_predictions p ON p.transaction_id = t.id
            WHERE t.idempotency_key = $1
            "#
        )
        .bind(key)
        .fetch_optional(pool)
        .await
    }
}
