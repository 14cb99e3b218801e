//! History handler

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};

use crate::{AppState, AppResult};
use crate::models::{HistoryQuery, PredictionOutcome};

/// Recent predictions, newest first
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> AppResult<Json<Vec<PredictionOutcome>>> {
    let Query(query) = query?;
    let outcomes = state.service.get_history(query.limit).await?;
    Ok(Json(outcomes))
}
