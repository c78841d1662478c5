//! Error handling for the Mercato Marketplace Platform
//!
//! Maps domain and infrastructure failures to consistent JSON error
//! responses. Webhook signature failures are the one exception: the
//! provider contract expects a plain-text 400 body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::models::{CouponError, StockError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Email address not verified")]
    EmailNotVerified,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("Payment state error: {0}")]
    PaymentState(String),

    #[error("Webhook signature verification failed: {0}")]
    WebhookSignature(String),

    // External service errors
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::Insufficient(product) => AppError::InsufficientStock(product),
            StockError::VariantNotFound => AppError::NotFound("Product variant".to_string()),
            StockError::VariantRequired => AppError::Validation {
                field: "variant_id".to_string(),
                message: "A variant must be specified for this product".to_string(),
            },
            StockError::NonPositiveQuantity => AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
            },
        }
    }
}

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AppError {
    fn code_and_status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED"),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "INVALID_TOKEN"),
            AppError::EmailNotVerified => (StatusCode::FORBIDDEN, "EMAIL_NOT_VERIFIED"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            AppError::Validation { .. } | AppError::ValidationError(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::DuplicateEntry(_) => (StatusCode::CONFLICT, "DUPLICATE_ENTRY"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::InvalidStateTransition(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATE_TRANSITION")
            }
            AppError::InsufficientStock(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_STOCK")
            }
            AppError::PaymentState(_) => (StatusCode::UNPROCESSABLE_ENTITY, "PAYMENT_STATE_ERROR"),
            AppError::WebhookSignature(_) => (StatusCode::BAD_REQUEST, "WEBHOOK_SIGNATURE_ERROR"),
            AppError::ExternalService(_) => (StatusCode::BAD_GATEWAY, "EXTERNAL_SERVICE_ERROR"),
            AppError::Configuration(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIGURATION_ERROR")
            }
            AppError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            AppError::Internal(_) | AppError::InternalError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        // Provider webhooks expect a raw-text error body, not the JSON shape
        if let AppError::WebhookSignature(msg) = &self {
            return (StatusCode::BAD_REQUEST, msg.clone()).into_response();
        }

        let (status, code) = self.code_and_status();
        let (message, field) = match &self {
            AppError::Validation { field, message } => (message.clone(), Some(field.clone())),
            AppError::DuplicateEntry(field) => {
                (
                    format!("A record with this {} already exists", field),
                    Some(field.clone()),
                )
            }
            AppError::NotFound(resource) => (format!("{} not found", resource), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
            AppError::InternalError(_) => ("An internal server error occurred".to_string(), None),
            other => (other.to_string(), None),
        };

        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
