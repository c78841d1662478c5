//! HTTP handlers for review endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::review::CreateReviewInput;
use crate::services::ReviewService;
use crate::AppState;
use shared::models::Review;
use shared::types::{PaginatedResponse, Pagination};

#[derive(Debug, Deserialize)]
pub struct ReviewListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Create a review for a delivered purchase
pub async fn create_review(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateReviewInput>,
) -> AppResult<Json<ApiResponse<Review>>> {
    let service = ReviewService::new(state.db.clone());
    let review = service.create(current_user.0.user_id, input).await?;
    Ok(Json(ApiResponse::ok("Review created", review)))
}

/// List reviews for a product (public)
pub async fn list_product_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Query(params): Query<ReviewListParams>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<Review>>>> {
    let service = ReviewService::new(state.db.clone());
    let pagination = Pagination {
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(20),
    };
    let reviews = service.list_by_product(product_id, pagination).await?;
    Ok(Json(ApiResponse::ok("Reviews", reviews)))
}

/// Delete a review (owner or admin)
pub async fn delete_review(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(review_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = ReviewService::new(state.db.clone());
    service.delete(&current_user.0, review_id).await?;
    Ok(Json(ApiResponse::message("Review deleted")))
}
