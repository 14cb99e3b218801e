//! Inference Orchestrator
//!
//! validate -> vectorize -> score -> persist -> classify. Scoring runs on
//! the blocking pool behind a semaphore so CPU-bound work never stalls
//! the async workers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::features::vectorize;
use crate::inference::{Score, Scorer};
use crate::models::{NewTransaction, PredictionOutcome, TransactionRequest};
use crate::store::{PredictionStore, StoreError};

pub const DEFAULT_HISTORY_LIMIT: i64 = 10;
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

#[derive(Clone)]
pub struct PredictionService {
    scorer: Arc<dyn Scorer>,
    store: Arc<dyn PredictionStore>,
    scoring_permits: Arc<Semaphore>,
    history_max_limit: i64,
}

impl PredictionService {
    pub fn new(
        scorer: Arc<dyn Scorer>,
        store: Arc<dyn PredictionStore>,
        scoring_workers: usize,
        history_max_limit: i64,
    ) -> Self {
        Self {
            scorer,
            store,
            scoring_permits: Arc::new(Semaphore::new(scoring_workers.max(1))),
            history_max_limit: history_max_limit.max(1),
        }
    }

    /// Score a transaction and record it. Either the full persisted
    /// outcome is returned or an error; never a scored-but-unsaved result.
    pub async fn handle_prediction(
        &self,
        request: TransactionRequest,
        idempotency_key: Option<String>,
    ) -> AppResult<PredictionOutcome> {
        request.validate()?;

        if let Some(key) = idempotency_key.as_deref() {
            validate_idempotency_key(key)?;
            if let Some(existing) = self.store.find_by_idempotency_key(key).await? {
                tracing::info!(
                    transaction_id = %existing.transaction_id,
                    "Replaying stored prediction for idempotency key"
                );
                return Ok(existing);
            }
        }

        let schema = self.scorer.schema();
        let vector = vectorize(schema, &request);
        let score = self.score(vector).await?;

        let entry = NewTransaction {
            amount: request.amount,
            seconds_elapsed: request.time,
            pca_features: serde_json::to_value(&request.pca_features).map_err(StoreError::from)?,
            risk_score: score.probability,
            prediction_class: if score.is_fraud() { 1 } else { 0 },
            model_version: schema.tag(),
            idempotency_key,
        };

        let outcome = self.store.log_transaction(entry).await?;

        tracing::info!(
            transaction_id = %outcome.transaction_id,
            risk_score = outcome.risk_score,
            is_fraud = outcome.is_fraud,
            "Transaction scored"
        );

        Ok(outcome)
    }

    /// Most recent outcomes first. `None` means the default window.
    pub async fn get_history(&self, limit: Option<i64>) -> AppResult<Vec<PredictionOutcome>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if limit < 0 {
            return Err(AppError::ValidationError(
                "limit must be zero or greater".to_string(),
            ));
        }

        let outcomes = self
            .store
            .fetch_recent(limit.min(self.history_max_limit))
            .await?;
        Ok(outcomes)
    }

    async fn score(&self, vector: crate::features::FeatureVector) -> AppResult<Score> {
        if !self.scorer.is_loaded() {
            return Err(AppError::ModelUnavailable);
        }

        let _permit = Arc::clone(&self.scoring_permits)
            .acquire_owned()
            .await
            .map_err(|_| AppError::ModelUnavailable)?;

        let scorer = Arc::clone(&self.scorer);
        let start = Instant::now();

        let score = tokio::task::spawn_blocking(move || scorer.score(&vector))
            .await
            .map_err(|e| AppError::InternalError(format!("scoring task failed: {}", e)))??;

        tracing::debug!(
            elapsed_us = start.elapsed().as_micros() as u64,
            probability = score.probability,
            label = score.label,
            "Scoring complete"
        );

        Ok(score)
    }
}

fn validate_idempotency_key(key: &str) -> AppResult<()> {
    if key.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Idempotency-Key must not be empty".to_string(),
        ));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(AppError::ValidationError(format!(
            "Idempotency-Key must be at most {} characters",
            MAX_IDEMPOTENCY_KEY_LEN
        )));
    }
    Ok(())
}
