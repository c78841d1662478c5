//! HTTP handlers for the product catalog

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::CdnClient;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::product::{CreateProductInput, ProductFilter, UpdateProductInput};
use crate::services::{ProducerService, ProductService};
use crate::AppState;
use shared::models::Product;
use shared::types::PaginatedResponse;

#[derive(Debug, Deserialize)]
pub struct DeleteProductParams {
    /// Hard delete removes the row and its CDN images; default is a
    /// soft removal from the catalog
    #[serde(default)]
    pub hard: bool,
}

fn product_service(state: &AppState) -> ProductService {
    ProductService::new(state.db.clone(), CdnClient::from_config(&state.config.cdn))
}

/// Resolve the calling user's approved producer profile
async fn require_selling_producer(state: &AppState, user_id: Uuid) -> AppResult<Uuid> {
    let producers = ProducerService::new(state.db.clone(), &state.config);
    let producer = producers.get_by_user(user_id).await?;
    if !producer.can_sell() {
        return Err(AppError::Forbidden(
            "Producer account is not approved for selling".to_string(),
        ));
    }
    Ok(producer.id)
}

/// List catalog products (public)
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<ApiResponse<PaginatedResponse<Product>>>> {
    let service = product_service(&state);
    let products = service.list(filter).await?;
    Ok(Json(ApiResponse::ok("Products", products)))
}

/// Fetch one product (public)
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let service = product_service(&state);
    let product = service.get(product_id).await?;
    Ok(Json(ApiResponse::ok("Product", product)))
}

/// Create a product (approved producer)
pub async fn create_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateProductInput>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let producer_id = require_selling_producer(&state, current_user.0.user_id).await?;
    let service = product_service(&state);
    let product = service.create(producer_id, input).await?;
    Ok(Json(ApiResponse::ok("Product created", product)))
}

/// Update an own product (producer)
pub async fn update_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let producer_id = require_selling_producer(&state, current_user.0.user_id).await?;
    let service = product_service(&state);
    let product = service.update(producer_id, product_id, input).await?;
    Ok(Json(ApiResponse::ok("Product updated", product)))
}

/// Delete an own product (producer): soft by default, hard on request
pub async fn delete_product(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(product_id): Path<Uuid>,
    Query(params): Query<DeleteProductParams>,
) -> AppResult<Json<ApiResponse<()>>> {
    let producer_id = require_selling_producer(&state, current_user.0.user_id).await?;
    let service = product_service(&state);
    if params.hard {
        service.hard_delete(producer_id, product_id).await?;
        Ok(Json(ApiResponse::message("Product deleted")))
    } else {
        service.soft_delete(producer_id, product_id).await?;
        Ok(Json(ApiResponse::message("Product removed from catalog")))
    }
}
