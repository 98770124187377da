//! Cache statistics and housekeeping.

use axum::extract::State;
use axum::Json;

use hf_jobs::{CacheClearReport, Statistics};

use crate::context::AppContext;
use crate::error::AppError;

/// GET /statistics
pub async fn statistics(State(ctx): State<AppContext>) -> Result<Json<Statistics>, AppError> {
    Ok(Json(ctx.orchestrator.statistics().await?))
}

/// DELETE /delete-cache
pub async fn delete_cache(
    State(ctx): State<AppContext>,
) -> Result<Json<CacheClearReport>, AppError> {
    Ok(Json(ctx.orchestrator.clear_cache().await?))
}
