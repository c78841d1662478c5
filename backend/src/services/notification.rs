//! Notification service: transactional email and web push dispatch
//!
//! Every send here is best-effort. Failures are logged and swallowed so a
//! notification outage can never fail an order or a webhook acknowledgment.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppResult;
use crate::external::push::{PushDelivery, PushPayload};
use crate::external::{EmailClient, PushClient};
use shared::models::Order;

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    email: Option<EmailClient>,
    push: Option<PushClient>,
}

/// A registered push subscription
#[derive(Debug, FromRow, serde::Serialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a push subscription
#[derive(Debug, Deserialize)]
pub struct RegisterSubscriptionInput {
    pub endpoint: String,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            email: EmailClient::from_config(&config.email),
            push: PushClient::from_config(&config.push),
        }
    }

    // ========================================================================
    // Email (best-effort)
    // ========================================================================

    /// Order confirmation to the customer
    pub async fn send_order_confirmation(&self, order: &Order, customer_email: &str) {
        let subject = format!("Order {} received", order.order_number);
        let html = format!(
            "<p>Thank you for your order <strong>{}</strong>.</p>\
             <p>Total: {} EUR. We will let you know when it ships.</p>",
            order.order_number, order.total
        );
        self.send_email(customer_email, &subject, &html).await;
    }

    /// New-order notice to one producer
    pub async fn send_producer_order_notice(&self, order: &Order, producer_email: &str) {
        let subject = format!("New order {}", order.order_number);
        let html = format!(
            "<p>Order <strong>{}</strong> contains items from your shop. \
             Please start preparing it.</p>",
            order.order_number
        );
        self.send_email(producer_email, &subject, &html).await;
    }

    /// Payment-received notice to the customer
    pub async fn send_payment_received(&self, order: &Order, customer_email: &str) {
        let subject = format!("Payment received for order {}", order.order_number);
        let html = format!(
            "<p>We received your payment of {} EUR for order <strong>{}</strong>.</p>",
            order.total, order.order_number
        );
        self.send_email(customer_email, &subject, &html).await;
    }

    /// Refund notice to the customer
    pub async fn send_order_refunded(&self, order: &Order, customer_email: &str) {
        let subject = format!("Order {} refunded", order.order_number);
        let html = format!(
            "<p>Your order <strong>{}</strong> was cancelled and {} EUR refunded.</p>",
            order.order_number, order.total
        );
        self.send_email(customer_email, &subject, &html).await;
    }

    /// Email verification link for a fresh registration
    pub async fn send_verification_email(&self, to: &str, token: &str) {
        let subject = "Verify your email address".to_string();
        let html = format!(
            "<p>Welcome to Mercato. Confirm your email with this code:</p>\
             <p><code>{}</code></p>",
            token
        );
        self.send_email(to, &subject, &html).await;
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str) {
        let Some(client) = &self.email else {
            tracing::debug!("Email not configured; skipping '{}' to {}", subject, to);
            return;
        };
        match client.send(to, subject, html).await {
            Ok(message_id) => {
                tracing::debug!("Email '{}' sent to {} ({})", subject, to, message_id);
            }
            Err(e) => {
                tracing::warn!("Failed to send email '{}' to {}: {}", subject, to, e);
            }
        }
    }

    // ========================================================================
    // Web push
    // ========================================================================

    /// Register a push subscription endpoint for a user
    pub async fn register_subscription(
        &self,
        user_id: Uuid,
        input: RegisterSubscriptionInput,
    ) -> AppResult<PushSubscription> {
        let subscription = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (user_id, endpoint)
            VALUES ($1, $2)
            ON CONFLICT (user_id, endpoint)
            DO UPDATE SET is_active = true
            RETURNING id, user_id, endpoint, is_active, created_at
            "#,
        )
        .bind(user_id)
        .bind(&input.endpoint)
        .fetch_one(&self.db)
        .await?;
        Ok(subscription)
    }

    /// Remove a push subscription
    pub async fn remove_subscription(&self, user_id: Uuid, subscription_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM push_subscriptions WHERE id = $1 AND user_id = $2")
            .bind(subscription_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    /// Push a payload to all of a user's active subscriptions, best-effort.
    /// Gone subscriptions (provider 404/410) are marked inactive.
    pub async fn push_to_user(&self, user_id: Uuid, payload: PushPayload) {
        let Some(client) = &self.push else {
            return;
        };

        let subscriptions = match sqlx::query_as::<_, PushSubscription>(
            "SELECT id, user_id, endpoint, is_active, created_at
             FROM push_subscriptions
             WHERE user_id = $1 AND is_active = true",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        {
            Ok(subs) => subs,
            Err(e) => {
                tracing::warn!("Failed to load push subscriptions for {}: {}", user_id, e);
                return;
            }
        };

        for subscription in subscriptions {
            match client.send(&subscription.endpoint, &payload).await {
                Ok(PushDelivery::Delivered) => {}
                Ok(PushDelivery::SubscriptionGone) => {
                    if let Err(e) = sqlx::query(
                        "UPDATE push_subscriptions SET is_active = false WHERE id = $1",
                    )
                    .bind(subscription.id)
                    .execute(&self.db)
                    .await
                    {
                        tracing::warn!("Failed to deactivate subscription: {}", e);
                    }
                }
                Err(e) => {
                    tracing::warn!("Push delivery failed for {}: {}", user_id, e);
                }
            }
        }
    }
}
