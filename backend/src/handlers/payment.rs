//! HTTP handlers for payments and the provider webhook

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::CdnClient;
use crate::middleware::CurrentUser;
use crate::response::ApiResponse;
use crate::services::payment::{CheckoutSessionResponse, PaymentStatusResponse, WebhookEvent};
use crate::services::{NotificationService, OrderService, PaymentService, ProductService};
use crate::AppState;

/// Input for starting a checkout
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutSessionInput {
    pub order_id: Uuid,
}

fn payment_service(state: &AppState) -> PaymentService {
    PaymentService::new(state.db.clone(), &state.config)
}

/// Begin payment for a card order
/// POST /payments/checkout-session
pub async fn create_checkout_session(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCheckoutSessionInput>,
) -> AppResult<Json<ApiResponse<CheckoutSessionResponse>>> {
    let service = payment_service(&state);
    let orders = OrderService::new(state.db.clone(), &state.config);
    let session = service
        .create_checkout_session(&current_user.0, input.order_id, &orders)
        .await?;
    Ok(Json(ApiResponse::ok("Checkout session created", session)))
}

/// Synchronous payment verification fallback for delayed webhooks
/// GET /payments/verify/:session_id
pub async fn verify_payment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(session_id): Path<String>,
) -> AppResult<Json<ApiResponse<PaymentStatusResponse>>> {
    let service = payment_service(&state);
    let orders = OrderService::new(state.db.clone(), &state.config);
    let products = ProductService::new(state.db.clone(), CdnClient::from_config(&state.config.cdn));
    let notifications = NotificationService::new(state.db.clone(), &state.config);
    let status = service
        .verify_payment(&current_user.0, &session_id, &orders, &products, &notifications)
        .await?;
    Ok(Json(ApiResponse::ok("Payment state", status)))
}

/// Poll payment state for an order
/// GET /payments/order/:order_id/status
pub async fn get_payment_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PaymentStatusResponse>>> {
    let service = payment_service(&state);
    let orders = OrderService::new(state.db.clone(), &state.config);
    let status = service
        .get_payment_status(&current_user.0, order_id, &orders)
        .await?;
    Ok(Json(ApiResponse::ok("Payment state", status)))
}

/// Handle payment provider webhook events
/// POST /payments/webhook
///
/// The endpoint is unauthenticated; the raw body is verified against the
/// shared webhook secret before anything is parsed. Once the signature
/// checks out the provider always gets a 200, even when processing fails,
/// because a non-200 would trigger redeliveries that the idempotent
/// reconciler would just discard anyway.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ApiResponse<()>>> {
    verify_webhook_signature(&headers, &body, &state.config.payment.webhook_secret)
        .map_err(AppError::WebhookSignature)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::WebhookSignature(format!("Invalid event body: {}", e)))?;

    let service = payment_service(&state);
    let orders = OrderService::new(state.db.clone(), &state.config);
    let products = ProductService::new(state.db.clone(), CdnClient::from_config(&state.config.cdn));
    let notifications = NotificationService::new(state.db.clone(), &state.config);

    if let Err(e) = service
        .process_event(event, &orders, &products, &notifications)
        .await
    {
        tracing::error!("Failed to process payment webhook: {}", e);
        // Still acknowledge to prevent provider retries
        return Ok(Json(ApiResponse::message("Event received")));
    }

    Ok(Json(ApiResponse::message("Event processed")))
}

/// Verify the provider's webhook signature header: HMAC-SHA256 over
/// `{timestamp}.{raw body}`, hex-encoded, carried as `t=...,v1=...`.
fn verify_webhook_signature(
    headers: &HeaderMap,
    body: &[u8],
    webhook_secret: &str,
) -> Result<(), String> {
    if webhook_secret.is_empty() {
        return Err("Webhook secret not configured".to_string());
    }

    let header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or("Missing stripe-signature header")?;

    let mut timestamp = None;
    let mut candidates = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => candidates.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or("Missing timestamp in signature header")?;
    if candidates.is_empty() {
        return Err("Missing v1 signature in signature header".to_string());
    }

    // Calculate expected signature over "{t}.{body}"
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| "Failed to create HMAC")?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    let expected: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect();

    // Compare signatures
    if !candidates.iter().any(|c| *c == expected) {
        return Err("Signature mismatch".to_string());
    }

    Ok(())
}
