//! Persistence Writer
//!
//! Records each scored transaction together with its prediction as one
//! all-or-nothing unit. Records are append-only.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewTransaction, PredictionOutcome, PredictionRow, TransactionLog};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("failed to serialize features: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("idempotency key {0:?} conflicted but no record was found")]
    IdempotencyConflict(String),
}

#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Persist a transaction and its prediction atomically.
    ///
    /// If `entry.idempotency_key` is already recorded, nothing is written
    /// and the existing record is returned.
    async fn log_transaction(&self, entry: NewTransaction) -> Result<PredictionOutcome, StoreError>;

    /// Most recent first, at most `limit` records
    async fn fetch_recent(&self, limit: i64) -> Result<Vec<PredictionOutcome>, StoreError>;

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PredictionOutcome>, StoreError>;
}

// ============================================================================
// POSTGRES
// ============================================================================

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PredictionStore for PgStore {
    async fn log_transaction(&self, entry: NewTransaction) -> Result<PredictionOutcome, StoreError> {
        if let Some(row) = TransactionLog::insert_with_prediction(&self.pool, &entry).await? {
            return Ok(row.into());
        }

        // Lost an idempotency race; the winner's record is committed.
        let key = entry.idempotency_key.unwrap_or_default();
        PredictionRow::find_by_idempotency_key(&self.pool, &key)
            .await?
            .map(PredictionOutcome::from)
            .ok_or(StoreError::IdempotencyConflict(key))
    }

    async fn fetch_recent(&self, limit: i64) -> Result<Vec<PredictionOutcome>, StoreError> {
        let rows = PredictionRow::list_recent(&self.pool, limit).await?;
        Ok(rows.into_iter().map(PredictionOutcome::from).collect())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PredictionOutcome>, StoreError> {
        let row = PredictionRow::find_by_idempotency_key(&self.pool, key).await?;
        Ok(row.map(PredictionOutcome::from))
    }
}

// ============================================================================
// IN-MEMORY
// ============================================================================

/// A stored transaction-log entry with its linked prediction
#[derive(Debug, Clone)]
pub struct MemoryRecord {
    pub entry: NewTransaction,
    pub outcome: PredictionOutcome,
}

/// Process-local store with the same semantics as [`PgStore`]. Writes can
/// be made to fail to exercise error paths.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of every record in insertion order
    pub fn records(&self) -> Vec<MemoryRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl PredictionStore for MemoryStore {
    async fn log_transaction(&self, entry: NewTransaction) -> Result<PredictionOutcome, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }

        let mut records = self.records.write();

        if let Some(key) = entry.idempotency_key.as_deref() {
            let existing = records
                .iter()
                .find(|r| r.entry.idempotency_key.as_deref() == Some(key));
            if let Some(record) = existing {
                return Ok(record.outcome.clone());
            }
        }

        let outcome = PredictionOutcome::from(PredictionRow {
            transaction_id: Uuid::new_v4(),
            risk_score: entry.risk_score,
            prediction_class: entry.prediction_class,
            created_at: Utc::now(),
        });

        records.push(MemoryRecord {
            entry,
            outcome: outcome.clone(),
        });

        Ok(outcome)
    }

    async fn fetch_recent(&self, limit: i64) -> Result<Vec<PredictionOutcome>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .records
            .read()
            .iter()
            .rev()
            .take(limit)
            .map(|r| r.outcome.clone())
            .collect())
    }

    async fn find_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PredictionOutcome>, StoreError> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.entry.idempotency_key.as_deref() == Some(key))
            .map(|r| r.outcome.clone()))
    }
}
