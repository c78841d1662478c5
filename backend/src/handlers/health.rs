//! Health check handler

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::AppState;

/// Health check with a database round trip
pub async fn health_check(State(state): State<AppState>) -> AppResult<Json<ApiResponse<()>>> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await?;
    Ok(Json(ApiResponse::message("OK")))
}
