//! HTTP handlers for coupon endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::coupon::{CouponPreview, CreateCouponInput, UpdateCouponInput};
use crate::services::CouponService;
use crate::AppState;
use shared::models::Coupon;

/// Input for previewing a coupon against a cart subtotal
#[derive(Debug, Deserialize)]
pub struct ValidateCouponInput {
    pub code: String,
    pub subtotal: Decimal,
}

/// Preview a coupon for the calling customer
pub async fn validate_coupon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<ValidateCouponInput>,
) -> AppResult<Json<ApiResponse<CouponPreview>>> {
    let service = CouponService::new(state.db.clone());
    let preview = service
        .preview(current_user.0.user_id, &input.code, input.subtotal)
        .await?;
    Ok(Json(ApiResponse::ok("Coupon is valid", preview)))
}

/// Create a coupon (admin)
pub async fn create_coupon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCouponInput>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    current_user.0.require_admin()?;
    let service = CouponService::new(state.db.clone());
    let coupon = service.create(input).await?;
    Ok(Json(ApiResponse::ok("Coupon created", coupon)))
}

/// List all coupons (admin)
pub async fn list_coupons(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Coupon>>>> {
    current_user.0.require_admin()?;
    let service = CouponService::new(state.db.clone());
    let coupons = service.list().await?;
    Ok(Json(ApiResponse::ok("Coupons", coupons)))
}

/// Fetch one coupon (admin)
pub async fn get_coupon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(coupon_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    current_user.0.require_admin()?;
    let service = CouponService::new(state.db.clone());
    let coupon = service.get(coupon_id).await?;
    Ok(Json(ApiResponse::ok("Coupon", coupon)))
}

/// Update a coupon (admin)
pub async fn update_coupon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(coupon_id): Path<Uuid>,
    Json(input): Json<UpdateCouponInput>,
) -> AppResult<Json<ApiResponse<Coupon>>> {
    current_user.0.require_admin()?;
    let service = CouponService::new(state.db.clone());
    let coupon = service.update(coupon_id, input).await?;
    Ok(Json(ApiResponse::ok("Coupon updated", coupon)))
}

/// Delete a coupon (admin)
pub async fn delete_coupon(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(coupon_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<()>>> {
    current_user.0.require_admin()?;
    let service = CouponService::new(state.db.clone());
    service.delete(coupon_id).await?;
    Ok(Json(ApiResponse::message("Coupon deleted")))
}
