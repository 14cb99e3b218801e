//! Prediction handler

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};

use crate::{AppState, AppError, AppResult};
use crate::models::{PredictionOutcome, TransactionRequest};

pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Score a transaction and record it
pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<TransactionRequest>, JsonRejection>,
) -> AppResult<Json<PredictionOutcome>> {
    let Json(request) = payload?;

    let idempotency_key = headers
        .get(IDEMPOTENCY_HEADER)
        .map(|value| {
            value
                .to_str()
                .map(str::to_string)
                .map_err(|_| AppError::ValidationError("Idempotency-Key must be visible ASCII".to_string()))
        })
        .transpose()?;

    let outcome = state.service.handle_prediction(request, idempotency_key).await?;
    Ok(Json(outcome))
}
