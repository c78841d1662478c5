//! HTTP handlers for order endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::external::CdnClient;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::order::{CreateOrderInput, CreateOrderResponse, UpdateOrderStatusInput};
use crate::services::{
    CouponService, NotificationService, OrderService, ProducerService, ProductService,
};
use crate::AppState;
use shared::models::{Order, UserRole};

fn order_service(state: &AppState) -> OrderService {
    OrderService::new(state.db.clone(), &state.config)
}

/// Create an order (customer with verified email)
pub async fn create_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<Json<ApiResponse<CreateOrderResponse>>> {
    current_user.0.require_verified_email()?;

    let orders = order_service(&state);
    let products = ProductService::new(state.db.clone(), CdnClient::from_config(&state.config.cdn));
    let producers = ProducerService::new(state.db.clone(), &state.config);
    let coupons = CouponService::new(state.db.clone());
    let notifications = NotificationService::new(state.db.clone(), &state.config);

    let response = orders
        .create_order(
            current_user.0.user_id,
            input,
            &products,
            &producers,
            &coupons,
            &notifications,
        )
        .await?;

    Ok(Json(ApiResponse::ok("Order created", response)))
}

/// List orders for the caller: customers see their own, producers the
/// orders containing their items, admins everything.
pub async fn list_orders(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let orders = order_service(&state);

    let result = match current_user.0.role {
        UserRole::Admin => orders.list_all().await?,
        UserRole::Producer => {
            let producers = ProducerService::new(state.db.clone(), &state.config);
            match producers.producer_id_for_user(current_user.0.user_id).await? {
                Some(producer_id) => orders.list_for_producer(producer_id).await?,
                None => orders.list_for_customer(current_user.0.user_id).await?,
            }
        }
        UserRole::Customer => orders.list_for_customer(current_user.0.user_id).await?,
    };

    Ok(Json(ApiResponse::ok("Orders", result)))
}

/// Fetch one order (ownership-checked)
pub async fn get_order(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let orders = order_service(&state);
    let order = orders.get_order(&current_user.0, order_id).await?;
    Ok(Json(ApiResponse::ok("Order", order)))
}

/// Advance order status (producer of an item in the order, or admin)
pub async fn update_order_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderStatusInput>,
) -> AppResult<Json<ApiResponse<Order>>> {
    let orders = order_service(&state);
    let products = ProductService::new(state.db.clone(), CdnClient::from_config(&state.config.cdn));
    let producers = ProducerService::new(state.db.clone(), &state.config);

    let producer_id = producers
        .producer_id_for_user(current_user.0.user_id)
        .await?;

    let order = orders
        .update_status(&current_user.0, producer_id, order_id, input, &products)
        .await?;

    Ok(Json(ApiResponse::ok("Order status updated", order)))
}
