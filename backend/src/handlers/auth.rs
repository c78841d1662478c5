//! HTTP handlers for authentication endpoints

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::response::ApiResponse;
use crate::services::auth::{
    AuthResponse, AuthService, AuthTokens, LoginInput, RefreshInput, RegisterInput,
    VerifyEmailInput,
};
use crate::services::NotificationService;
use crate::AppState;

/// Register a new customer account
pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterInput>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let notifications = NotificationService::new(state.db.clone(), &state.config);
    let response = service.register(input, &notifications).await?;
    Ok(Json(ApiResponse::ok("Account created", response)))
}

/// Log in with email and password
pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> AppResult<Json<ApiResponse<AuthResponse>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let response = service.login(input).await?;
    Ok(Json(ApiResponse::ok("Logged in", response)))
}

/// Exchange a refresh token for new tokens
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshInput>,
) -> AppResult<Json<ApiResponse<AuthTokens>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    let tokens = service.refresh(input).await?;
    Ok(Json(ApiResponse::ok("Tokens refreshed", tokens)))
}

/// Verify an email address with the emailed token
pub async fn verify_email(
    State(state): State<AppState>,
    Json(input): Json<VerifyEmailInput>,
) -> AppResult<Json<ApiResponse<()>>> {
    let service = AuthService::new(state.db.clone(), &state.config);
    service.verify_email(input).await?;
    Ok(Json(ApiResponse::message("Email verified")))
}
