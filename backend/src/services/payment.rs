//! Payment service: checkout sessions and webhook reconciliation
//!
//! The reconciler is idempotent by construction: every transition is a
//! guarded conditional update keyed on the order's current payment status,
//! so a redelivered provider event matches zero rows and becomes a no-op.
//! Stock moves in the same transaction as the status change.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::external::payment::{CheckoutLineItem, CheckoutSession, PaymentClient};
use crate::middleware::AuthUser;
use crate::services::notification::NotificationService;
use crate::services::order::{restore_order_stock, OrderService};
use crate::services::product::ProductService;
use shared::models::{Order, OrderStatus, PaymentEvent, PaymentMethod, PaymentStatus, StockEffect};

/// Payment service
#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
    client: Option<PaymentClient>,
    currency: String,
    success_url: String,
    cancel_url: String,
}

/// A provider webhook event envelope
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: WebhookObject,
}

/// The provider object carried by an event: a checkout session, a payment
/// intent or a charge, depending on the event type
#[derive(Debug, Deserialize)]
pub struct WebhookObject {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl WebhookObject {
    fn order_id_from_metadata(&self) -> Option<Uuid> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("order_id"))
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

/// Response for starting a checkout
#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: String,
}

/// Payment state poll response
#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub status: String,
    pub payment_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

impl PaymentService {
    /// Create a new PaymentService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            client: PaymentClient::from_config(&config.payment),
            currency: config.payment.currency.clone(),
            success_url: config.payment.success_url.clone(),
            cancel_url: config.payment.cancel_url.clone(),
        }
    }

    /// Create a hosted checkout session for a card order. Line items come
    /// from the order's snapshot, never from the live catalog.
    pub async fn create_checkout_session(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        orders: &OrderService,
    ) -> AppResult<CheckoutSessionResponse> {
        let client = self.require_client()?;
        let order = orders.get_order(actor, order_id).await?;

        // Only the buyer (or an admin) can start payment
        if !actor.is_admin() && order.customer_id != actor.user_id {
            return Err(AppError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }

        if order.payment_method != PaymentMethod::Card {
            return Err(AppError::PaymentState(
                "Only card orders use the checkout provider".to_string(),
            ));
        }
        match order.payment_status {
            PaymentStatus::Paid => {
                return Err(AppError::PaymentState(
                    "Order is already paid".to_string(),
                ))
            }
            PaymentStatus::Refunded => {
                return Err(AppError::PaymentState(
                    "Order was refunded and cannot be paid again".to_string(),
                ))
            }
            PaymentStatus::Pending | PaymentStatus::Failed => {}
        }

        let line_items = build_line_items(&order)?;
        let session = client
            .create_checkout_session(
                order.id,
                &self.currency,
                &line_items,
                &self.success_url,
                &self.cancel_url,
            )
            .await?;

        // Persist the session id for webhook correlation
        sqlx::query(
            "UPDATE orders SET checkout_session_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(order.id)
        .bind(&session.id)
        .execute(&self.db)
        .await?;

        let url = session.url.clone().ok_or_else(|| {
            AppError::ExternalService("Provider returned a session without a URL".to_string())
        })?;

        Ok(CheckoutSessionResponse {
            session_id: session.id,
            url,
        })
    }

    /// Synchronous fallback for delayed webhooks: ask the provider for the
    /// session state and, when paid, apply the same idempotent transition
    /// the webhook would.
    pub async fn verify_payment(
        &self,
        actor: &AuthUser,
        session_id: &str,
        orders: &OrderService,
        products: &ProductService,
        notifications: &NotificationService,
    ) -> AppResult<PaymentStatusResponse> {
        let client = self.require_client()?;
        let order_id = self
            .find_order_id("checkout_session_id", session_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        // Ownership check before touching the provider
        let order = orders.get_order(actor, order_id).await?;

        let session: CheckoutSession = client.retrieve_session(session_id).await?;
        if session.is_paid() {
            self.apply_payment_success(
                order.id,
                session.payment_intent.as_deref(),
                orders,
                products,
                notifications,
            )
            .await?;
        }

        self.payment_status_response(actor, order_id, orders).await
    }

    /// Poll payment state for an order (customer or admin)
    pub async fn get_payment_status(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        orders: &OrderService,
    ) -> AppResult<PaymentStatusResponse> {
        let order = orders.get_order(actor, order_id).await?;
        if !actor.is_admin() && order.customer_id != actor.user_id {
            return Err(AppError::Forbidden(
                "You do not have access to this order".to_string(),
            ));
        }
        self.payment_status_response(actor, order_id, orders).await
    }

    // ========================================================================
    // Webhook reconciliation
    // ========================================================================

    /// Process one verified webhook event. Unknown event types and events
    /// for unknown orders are acknowledged and ignored; the provider must
    /// always get a 200 once the signature checked out.
    pub async fn process_event(
        &self,
        event: WebhookEvent,
        orders: &OrderService,
        products: &ProductService,
        notifications: &NotificationService,
    ) -> AppResult<()> {
        let Some(payment_event) = PaymentEvent::from_event_type(&event.event_type) else {
            tracing::debug!("Ignoring webhook event type {}", event.event_type);
            return Ok(());
        };

        let object = &event.data.object;
        let order_id = match payment_event {
            PaymentEvent::CheckoutSessionCompleted => {
                match self
                    .find_order_id("checkout_session_id", &object.id)
                    .await?
                {
                    Some(id) => Some(id),
                    None => object.order_id_from_metadata(),
                }
            }
            PaymentEvent::PaymentIntentSucceeded | PaymentEvent::PaymentIntentFailed => {
                match self.find_order_id("payment_intent_id", &object.id).await? {
                    Some(id) => Some(id),
                    None => object.order_id_from_metadata(),
                }
            }
            PaymentEvent::ChargeRefunded => match &object.payment_intent {
                Some(intent) => self.find_order_id("payment_intent_id", intent).await?,
                None => object.order_id_from_metadata(),
            },
        };

        let Some(order_id) = order_id else {
            tracing::warn!(
                "Webhook event {} ({}) matches no known order",
                event.id,
                event.event_type
            );
            return Ok(());
        };

        match payment_event.transition().stock_effect {
            StockEffect::Decrement => {
                let intent = match payment_event {
                    PaymentEvent::CheckoutSessionCompleted => object.payment_intent.as_deref(),
                    _ => Some(object.id.as_str()),
                };
                self.apply_payment_success(order_id, intent, orders, products, notifications)
                    .await
            }
            StockEffect::None => self.apply_payment_failure(order_id).await,
            StockEffect::Restore => {
                self.apply_refund(order_id, orders, products, notifications)
                    .await
            }
        }
    }

    /// Confirm payment: guarded transition to paid/confirmed plus a single
    /// stock commit. A repeat delivery matches no row and changes nothing.
    async fn apply_payment_success(
        &self,
        order_id: Uuid,
        payment_intent_id: Option<&str>,
        orders: &OrderService,
        products: &ProductService,
        notifications: &NotificationService,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        // A cancelled order stays cancelled; a late success is not processed
        let transitioned = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE orders
            SET payment_status = 'paid',
                status = 'confirmed',
                payment_intent_id = COALESCE($2, payment_intent_id),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1
              AND payment_status IN ('pending', 'failed')
              AND status <> 'cancelled'
            RETURNING id
            "#,
        )
        .bind(order_id)
        .bind(payment_intent_id)
        .fetch_optional(&mut *tx)
        .await?;

        if transitioned.is_none() {
            tracing::debug!("Payment success for order {} already applied", order_id);
            return Ok(());
        }

        let order = orders.load_order(order_id).await?;
        for item in &order.items {
            products
                .reduce_stock_clamped(
                    &mut tx,
                    item.product_id,
                    item.variant_id,
                    item.quantity,
                    &item.product_name,
                )
                .await?;
        }

        tx.commit().await?;
        tracing::info!("Order {} confirmed via payment provider", order.order_number);

        match orders.customer_email(order.customer_id).await {
            Ok(email) => notifications.send_payment_received(&order, &email).await,
            Err(e) => tracing::warn!("Could not resolve customer email: {}", e),
        }

        Ok(())
    }

    /// Record a failed attempt; the order stays pending so payment can be
    /// retried.
    async fn apply_payment_failure(&self, order_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_status = 'failed', updated_at = NOW()
            WHERE id = $1 AND payment_status = 'pending'
            "#,
        )
        .bind(order_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!("Payment failure for order {} already recorded", order_id);
        }
        Ok(())
    }

    /// Refund: guarded transition to refunded/cancelled plus stock restore,
    /// only ever from the paid state.
    async fn apply_refund(
        &self,
        order_id: Uuid,
        orders: &OrderService,
        products: &ProductService,
        notifications: &NotificationService,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        // Lock the row and remember whether a manual cancellation already
        // put the stock back; restoring it twice would inflate the counters
        let prior_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(prior_status) = prior_status else {
            return Ok(());
        };

        let transitioned = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE orders
            SET payment_status = 'refunded',
                status = 'cancelled',
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND payment_status = 'paid'
            RETURNING id
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        if transitioned.is_none() {
            tracing::debug!("Refund for order {} already applied or not applicable", order_id);
            return Ok(());
        }

        let order = orders.load_order(order_id).await?;
        if OrderStatus::parse(&prior_status) != Some(OrderStatus::Cancelled) {
            restore_order_stock(&mut tx, products, &order.items).await?;
        }

        tx.commit().await?;
        tracing::info!("Order {} refunded and restocked", order.order_number);

        match orders.customer_email(order.customer_id).await {
            Ok(email) => notifications.send_order_refunded(&order, &email).await,
            Err(e) => tracing::warn!("Could not resolve customer email: {}", e),
        }

        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn require_client(&self) -> AppResult<&PaymentClient> {
        self.client.as_ref().ok_or_else(|| {
            AppError::Configuration("Payment provider is not configured".to_string())
        })
    }

    async fn find_order_id(&self, column: &str, value: &str) -> AppResult<Option<Uuid>> {
        let order_id = sqlx::query_scalar::<_, Uuid>(&format!(
            "SELECT id FROM orders WHERE {column} = $1",
        ))
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(order_id)
    }

    async fn payment_status_response(
        &self,
        actor: &AuthUser,
        order_id: Uuid,
        orders: &OrderService,
    ) -> AppResult<PaymentStatusResponse> {
        let order = orders.get_order(actor, order_id).await?;
        Ok(PaymentStatusResponse {
            order_id: order.id,
            order_number: order.order_number,
            status: order.status.as_str().to_string(),
            payment_status: order.payment_status.as_str().to_string(),
            payment_intent_id: order.payment_intent_id,
        })
    }
}

/// Build provider line items from the order snapshot. Discounted orders
/// collapse to a single line so the charged amount always equals the order
/// total.
fn build_line_items(order: &Order) -> AppResult<Vec<CheckoutLineItem>> {
    if order.discount > Decimal::ZERO {
        return Ok(vec![CheckoutLineItem {
            name: format!("Order {}", order.order_number),
            unit_amount_cents: to_cents(order.total)?,
            quantity: 1,
        }]);
    }

    let mut line_items = Vec::with_capacity(order.items.len() + 1);
    for item in &order.items {
        line_items.push(CheckoutLineItem {
            name: item.product_name.clone(),
            unit_amount_cents: to_cents(item.price_at_purchase)?,
            quantity: item.quantity as i64,
        });
    }
    if order.shipping_cost > Decimal::ZERO {
        line_items.push(CheckoutLineItem {
            name: "Shipping".to_string(),
            unit_amount_cents: to_cents(order.shipping_cost)?,
            quantity: 1,
        });
    }
    Ok(line_items)
}

/// Convert a money amount to the currency's minor unit
fn to_cents(amount: Decimal) -> AppResult<i64> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| AppError::Internal(format!("Amount out of range: {}", amount)))
}
