//! HTTP handlers for producer onboarding and administration

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::producer::{ApplyProducerInput, UpdateProducerInput};
use crate::services::ProducerService;
use crate::AppState;
use shared::models::Producer;

#[derive(Debug, Deserialize)]
pub struct ListProducersParams {
    #[serde(default)]
    pub pending: bool,
}

/// Apply to become a producer
pub async fn apply_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ApplyProducerInput>,
) -> AppResult<Json<ApiResponse<Producer>>> {
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producer = service.apply(current_user.0.user_id, input).await?;
    Ok(Json(ApiResponse::ok(
        "Application submitted; awaiting approval",
        producer,
    )))
}

/// Fetch one's own producer profile
pub async fn get_own_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Producer>>> {
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producer = service.get_by_user(current_user.0.user_id).await?;
    Ok(Json(ApiResponse::ok("Producer profile", producer)))
}

/// Update one's own producer profile
pub async fn update_own_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdateProducerInput>,
) -> AppResult<Json<ApiResponse<Producer>>> {
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producer = service.update_own(current_user.0.user_id, input).await?;
    Ok(Json(ApiResponse::ok("Producer profile updated", producer)))
}

/// List producers, optionally pending applications only (admin)
pub async fn list_producers(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(params): Query<ListProducersParams>,
) -> AppResult<Json<ApiResponse<Vec<Producer>>>> {
    current_user.0.require_admin()?;
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producers = service.list(params.pending).await?;
    Ok(Json(ApiResponse::ok("Producers", producers)))
}

/// Approve a producer application (admin). Calling this twice is a no-op;
/// the referral bonus is applied at most once.
pub async fn approve_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Producer>>> {
    current_user.0.require_admin()?;
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producer = service.approve(producer_id).await?;
    Ok(Json(ApiResponse::ok("Producer approved", producer)))
}

/// Reject a pending producer application (admin)
pub async fn reject_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.0.require_admin()?;
    let service = ProducerService::new(state.db.clone(), &state.config);
    service.reject(producer_id).await?;
    Ok(Json(ApiResponse::message("Application rejected")))
}

/// Suspend a producer (admin)
pub async fn suspend_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Producer>>> {
    current_user.0.require_admin()?;
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producer = service.set_suspended(producer_id, true).await?;
    Ok(Json(ApiResponse::ok("Producer suspended", producer)))
}

/// Reinstate a suspended producer (admin)
pub async fn unsuspend_producer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(producer_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Producer>>> {
    current_user.0.require_admin()?;
    let service = ProducerService::new(state.db.clone(), &state.config);
    let producer = service.set_suspended(producer_id, false).await?;
    Ok(Json(ApiResponse::ok("Producer reinstated", producer)))
}
