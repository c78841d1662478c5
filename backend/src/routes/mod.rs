//! Route definitions for the Mercato Marketplace Platform

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (public)
        .nest("/auth", auth_routes())
        // Payment provider webhook (public - signature verified)
        .route("/payments/webhook", post(handlers::handle_payment_webhook))
        // Public catalog routes
        .route("/products", get(handlers::list_products))
        .route("/products/:product_id", get(handlers::get_product))
        .route(
            "/products/:product_id/reviews",
            get(handlers::list_product_reviews),
        )
        // Protected routes - catalog management
        .nest("/catalog", catalog_routes())
        // Protected routes - producer onboarding and administration
        .nest("/producers", producer_routes())
        // Protected routes - orders
        .nest("/orders", order_routes())
        // Protected routes - payments
        .nest("/payments", payment_routes())
        // Protected routes - coupons
        .nest("/coupons", coupon_routes())
        // Protected routes - reviews
        .nest("/reviews", review_routes())
        // Protected routes - reporting
        .nest("/reports", report_routes())
        // Protected routes - push subscriptions
        .nest("/notifications", notification_routes())
}

/// Authentication routes (public)
fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/verify-email", post(handlers::verify_email))
}

/// Catalog management routes (protected, producer)
fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", post(handlers::create_product))
        .route(
            "/products/:product_id",
            put(handlers::update_product).delete(handlers::delete_product),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Producer routes (protected)
fn producer_routes() -> Router<AppState> {
    Router::new()
        .route("/apply", post(handlers::apply_producer))
        .route(
            "/me",
            get(handlers::get_own_producer).put(handlers::update_own_producer),
        )
        .route("/me/report", get(handlers::get_own_commission_report))
        // Admin endpoints
        .route("/", get(handlers::list_producers))
        .route("/:producer_id/approve", post(handlers::approve_producer))
        .route("/:producer_id/reject", post(handlers::reject_producer))
        .route("/:producer_id/suspend", post(handlers::suspend_producer))
        .route("/:producer_id/unsuspend", post(handlers::unsuspend_producer))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:order_id", get(handlers::get_order))
        .route("/:order_id/status", put(handlers::update_order_status))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Payment routes (protected; the webhook lives outside this nest)
fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/checkout-session",
            post(handlers::create_checkout_session),
        )
        .route("/verify/:session_id", get(handlers::verify_payment))
        .route(
            "/order/:order_id/status",
            get(handlers::get_payment_status),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Coupon routes (protected; CRUD is admin-gated in the handlers)
fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/validate", post(handlers::validate_coupon))
        .route("/", get(handlers::list_coupons).post(handlers::create_coupon))
        .route(
            "/:coupon_id",
            get(handlers::get_coupon)
                .put(handlers::update_coupon)
                .delete(handlers::delete_coupon),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Review routes (protected)
fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_review))
        .route("/:review_id", delete(handlers::delete_review))
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Reporting routes (protected)
fn report_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/commission",
            get(handlers::get_platform_commission_report),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}

/// Push subscription routes (protected)
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions",
            post(handlers::register_push_subscription),
        )
        .route(
            "/subscriptions/:subscription_id",
            delete(handlers::remove_push_subscription),
        )
        .route_layer(middleware::from_fn(auth_middleware))
}
