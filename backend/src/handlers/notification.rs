//! HTTP handlers for push subscription management

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::notification::{PushSubscription, RegisterSubscriptionInput};
use crate::services::NotificationService;
use crate::AppState;

/// Register a push subscription endpoint for the calling user
pub async fn register_push_subscription(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RegisterSubscriptionInput>,
) -> AppResult<Json<ApiResponse<PushSubscription>>> {
    let service = NotificationService::new(state.db.clone(), &state.config);
    let subscription = service
        .register_subscription(current_user.0.user_id, input)
        .await?;
    Ok(Json(ApiResponse::ok("Subscription registered", subscription)))
}

/// Remove a push subscription
pub async fn remove_push_subscription(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(subscription_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = NotificationService::new(state.db.clone(), &state.config);
    service
        .remove_subscription(current_user.0.user_id, subscription_id)
        .await?;
    Ok(Json(ApiResponse::message("Subscription removed")))
}
