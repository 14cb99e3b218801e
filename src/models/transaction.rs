//! Transaction model

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use validator::Validate;

use super::prediction::PredictionRow;

/// Incoming scoring request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TransactionRequest {
    /// Seconds elapsed since the reference transaction
    pub time: f64,

    #[validate(range(exclusive_min = 0.0, message = "amount must be greater than 0"))]
    pub amount: f64,

    /// PCA slots keyed `V1`..`V28`; absent slots score as 0.0
    #[serde(default)]
    pub pca_features: HashMap<String, f64>,
}

/// One transaction-log row plus its prediction, written together
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub amount: f64,
    pub seconds_elapsed: f64,
    /// Raw feature map as received, not the model-ordered vector
    pub pca_features: serde_json::Value,
    pub risk_score: f64,
    pub prediction_class: i16,
    pub model_version: String,
    pub idempotency_key: Option<String>,
}

pub struct TransactionLog;

impl TransactionLog {
    /// Insert the transaction and its prediction in one database transaction.
    ///
    /// Returns `None` when the idempotency key is already taken; nothing is
    /// written in that case.
    pub async fn insert_with_prediction(
        pool: &PgPool,
        entry: &NewTransaction,
    ) -> Result<Option<PredictionRow>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let inserted: Option<(Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"
            INSERT INTO transactions_log (amount, seconds_elapsed, pca_vector, idempotency_key)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (idempotency_key) DO NOTHING
            RETURNING id, created_at
            "#
        )
        .bind(entry.amount)
        .bind(entry.seconds_elapsed)
        .bind(&entry.pca_features)
        .bind(entry.idempotency_key.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let Some((transaction_id, created_at)) = inserted else {
            tx.rollback().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO fraud_predictions (transaction_id, risk_score, prediction_class, model_version)
            VALUES ($1, $2, $3, $4)
            "#
        )
        .bind(transaction_id)
        .bind(entry.risk_score)
        .bind(entry.prediction_class)
        .bind(&entry.model_version)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(PredictionRow {
            transaction_id,
            risk_score: entry.risk_score,
            prediction_class: entry.prediction_class,
            created_at,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amount_must_be_positive() {
        let mut request = TransactionRequest {
            time: 0.0,
            amount: 149.62,
            pca_features: HashMap::new(),
        };
        assert!(request.validate().is_ok());

        request.amount = 0.0;
        assert!(request.validate().is_err());

        request.amount = -3.5;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_pca_features_default_to_empty() {
        let request: TransactionRequest =
            serde_json::from_str(r#"{"time": 10.0, "amount": 2.5}"#).unwrap();
        assert!(request.pca_features.is_empty());
    }

    #[test]
    fn test_missing_amount_is_rejected() {
        let result = serde_json::from_str::<TransactionRequest>(r#"{"time": 10.0}"#);
        assert!(result.is_err());
    }
}
