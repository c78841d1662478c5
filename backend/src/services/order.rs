//! Order lifecycle service
//!
//! Creates orders as immutable line-item snapshots, commits stock
//! synchronously for cash on delivery, and advances fulfilment status under
//! an optimistic version check. All writes for one operation share a single
//! transaction: an order either fully exists or not at all.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::coupon::CouponService;
use crate::services::notification::NotificationService;
use crate::services::product::ProductService;
use crate::services::producer::ProducerService;
use shared::models::{
    generate_order_number, Order, OrderItem, OrderStatus, OrderTotals, PaymentMethod,
    PaymentStatus,
};
use shared::types::{Address, Language};
use shared::validation::validate_quantity;

/// Order service
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
    shipping_fee: Decimal,
    bank_instructions: BankTransferInstructions,
}

/// Order row as stored
#[derive(Debug, FromRow)]
pub(crate) struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub coupon_id: Option<Uuid>,
    pub total: Decimal,
    pub status: String,
    pub payment_method: String,
    pub payment_status: String,
    pub shipping_address: Json<Address>,
    pub payment_intent_id: Option<String>,
    pub checkout_session_id: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order item row as stored
#[derive(Debug, FromRow)]
pub(crate) struct OrderItemRow {
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub producer_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
    pub commission_rate: Decimal,
}

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, customer_id, subtotal, \
    shipping_cost, discount, coupon_id, total, status, payment_method, payment_status, \
    shipping_address, payment_intent_id, checkout_session_id, tracking_number, carrier, \
    shipped_at, delivered_at, version, created_at, updated_at";

pub(crate) const ORDER_ITEM_COLUMNS: &str = "product_id, variant_id, producer_id, \
    product_name, quantity, price_at_purchase, commission_rate";

/// One requested cart line
#[derive(Debug, Deserialize)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    pub variant_id: Option<Uuid>,
}

/// Input for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub items: Vec<OrderItemInput>,
    pub shipping_address: Address,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
}

/// Static bank transfer instructions, keyed to the order number
#[derive(Debug, Clone, Serialize)]
pub struct BankTransferInstructions {
    pub account_holder: String,
    pub bank_name: String,
    pub iban: String,
    pub bic: String,
    pub amount: Decimal,
    /// Use the order number as the payment reference
    pub payment_reference: String,
}

/// Response for a created order
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: Order,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_transfer: Option<BankTransferInstructions>,
}

/// Input for advancing order status
#[derive(Debug, Deserialize)]
pub struct UpdateOrderStatusInput {
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    /// Optimistic concurrency token; defaults to the freshly loaded version
    pub expected_version: Option<i32>,
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            shipping_fee: config.market.shipping_fee,
            bank_instructions: BankTransferInstructions {
                account_holder: config.market.bank_account_holder.clone(),
                bank_name: config.market.bank_name.clone(),
                iban: config.market.bank_iban.clone(),
                bic: config.market.bank_bic.clone(),
                amount: Decimal::ZERO,
                payment_reference: String::new(),
            },
        }
    }

    /// Create an order from a cart. Prices, product names and commission
    /// rates are snapshotted from the current catalog; user-supplied amounts
    /// are never trusted.
    pub async fn create_order(
        &self,
        customer_id: Uuid,
        input: CreateOrderInput,
        products: &ProductService,
        producers: &ProducerService,
        coupons: &CouponService,
        notifications: &NotificationService,
    ) -> AppResult<CreateOrderResponse> {
        if input.items.is_empty() {
            return Err(AppError::Validation {
                field: "items".to_string(),
                message: "Order must contain at least one item".to_string(),
            });
        }
        for item in &input.items {
            validate_quantity(item.quantity).map_err(|e| AppError::Validation {
                field: "quantity".to_string(),
                message: e.to_string(),
            })?;
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        // Build the immutable item snapshot from the live catalog
        let mut items: Vec<OrderItem> = Vec::with_capacity(input.items.len());
        for requested in &input.items {
            let product = products.get(requested.product_id).await?;
            let product_name = product.display_name(Language::Italian).to_string();

            let producer = producers.get(product.producer_id).await?;
            if !producer.can_sell() {
                return Err(AppError::Validation {
                    field: "items".to_string(),
                    message: format!("{} is not currently available", product_name),
                });
            }

            let variant_id = product.resolve_variant_id(requested.variant_id)?;
            if !product.has_stock(requested.quantity, variant_id) {
                return Err(AppError::InsufficientStock(product_name));
            }

            let price_at_purchase = product.unit_price(variant_id)?;
            // Snapshot the producer's live effective rate, so later rate
            // changes never touch historical orders
            let commission_rate = producer.effective_commission_rate(now);

            items.push(OrderItem {
                product_id: product.id,
                variant_id,
                producer_id: producer.id,
                product_name,
                quantity: requested.quantity,
                price_at_purchase,
                commission_rate,
            });
        }

        let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();

        // Coupon: validated and consumed inside this transaction
        let (coupon_id, discount) = match &input.coupon_code {
            Some(code) => {
                let (id, discount) = coupons
                    .apply_for_order(&mut tx, customer_id, code, subtotal)
                    .await?;
                (Some(id), discount)
            }
            None => (None, Decimal::ZERO),
        };

        let totals = OrderTotals::compute(&items, self.shipping_fee, discount);
        let status = input.payment_method.initial_order_status();
        let order_number = generate_order_number(now);

        let order_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO orders (
                order_number, customer_id, subtotal, shipping_cost, discount,
                coupon_id, total, status, payment_method, payment_status,
                shipping_address
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(&order_number)
        .bind(customer_id)
        .bind(totals.subtotal)
        .bind(totals.shipping_cost)
        .bind(totals.discount)
        .bind(coupon_id)
        .bind(totals.total)
        .bind(status.as_str())
        .bind(input.payment_method.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(Json(&input.shipping_address))
        .fetch_one(&mut *tx)
        .await?;

        for (position, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, product_id, variant_id, producer_id, product_name,
                    quantity, price_at_purchase, commission_rate, position
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.variant_id)
            .bind(item.producer_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.price_at_purchase)
            .bind(item.commission_rate)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        // Cash on delivery has no later payment gate: commit stock now.
        // A conditional-update failure rolls the whole order back.
        if input.payment_method.confirms_at_creation() {
            for item in &items {
                products
                    .reduce_stock(
                        &mut tx,
                        item.product_id,
                        item.variant_id,
                        item.quantity,
                        &item.product_name,
                    )
                    .await?;
            }
        }

        tx.commit().await?;

        let order = self.load_order(order_id).await?;

        // Best-effort notifications; failures never surface to the customer
        self.dispatch_order_notifications(&order, notifications).await;

        let bank_transfer = match input.payment_method {
            PaymentMethod::BankTransfer => Some(BankTransferInstructions {
                amount: order.total,
                payment_reference: order.order_number.clone(),
                ..self.bank_instructions.clone()
            }),
            _ => None,
        };

        Ok(CreateOrderResponse {
            order,
            bank_transfer,
        })
    }

    /// Fetch one order, enforcing ownership: the customer, a producer with
    /// an item in the order, or an admin.
    pub async fn get_order(&self, actor: &AuthUser, order_id: Uuid) -> AppResult<Order> {
        let order = self.load_order(order_id).await?;
        self.check_order_access(actor, &order).await?;
        Ok(order)
    }

    /// List the calling customer's orders
    pub async fn list_for_customer(&self, customer_id: Uuid) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY created_at DESC",
        ))
        .bind(customer_id)
        .fetch_all(&self.db)
        .await?;
        self.assemble_orders(rows).await
    }

    /// List orders containing items from one producer
    pub async fn list_for_producer(&self, producer_id: Uuid) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            SELECT DISTINCT o.{}
            FROM orders o
            JOIN order_items oi ON oi.order_id = o.id
            WHERE oi.producer_id = $1
            ORDER BY o.created_at DESC
            "#,
            ORDER_COLUMNS.replace(", ", ", o."),
        ))
        .bind(producer_id)
        .fetch_all(&self.db)
        .await?;
        self.assemble_orders(rows).await
    }

    /// List all orders (admin)
    pub async fn list_all(&self) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC",
        ))
        .fetch_all(&self.db)
        .await?;
        self.assemble_orders(rows).await
    }

    /// Advance order status. Only a producer with items in the order or an
    /// admin may do this; transitions outside the state machine are
    /// rejected, and a version mismatch means someone else got there first.
    pub async fn update_status(
        &self,
        actor: &AuthUser,
        producer_id: Option<Uuid>,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
        products: &ProductService,
    ) -> AppResult<Order> {
        let order = self.load_order(order_id).await?;

        if !actor.is_admin() {
            let producer_id = producer_id.ok_or_else(|| {
                AppError::Forbidden("Only producers or admins can update order status".to_string())
            })?;
            let has_items = order.items.iter().any(|i| i.producer_id == producer_id);
            if !has_items {
                return Err(AppError::Forbidden(
                    "This order contains none of your items".to_string(),
                ));
            }
        }

        let next = input.status;
        if !order.status.can_transition_to(next) {
            return Err(AppError::InvalidStateTransition(format!(
                "Cannot move order from {} to {}",
                order.status, next
            )));
        }

        let expected_version = input.expected_version.unwrap_or(order.version);
        let shipped_at = (next == OrderStatus::Shipped).then(Utc::now);
        let delivered_at = (next == OrderStatus::Delivered).then(Utc::now);

        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2,
                tracking_number = COALESCE($3, tracking_number),
                carrier = COALESCE($4, carrier),
                shipped_at = COALESCE($5, shipped_at),
                delivered_at = COALESCE($6, delivered_at),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $7
            "#,
        )
        .bind(order_id)
        .bind(next.as_str())
        .bind(&input.tracking_number)
        .bind(&input.carrier)
        .bind(shipped_at)
        .bind(delivered_at)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "Order was modified concurrently; reload and retry".to_string(),
            ));
        }

        // Cancelling an order whose stock was already committed puts the
        // units back on the shelf
        if next == OrderStatus::Cancelled && order.stock_committed() {
            for item in &order.items {
                products
                    .increase_stock(&mut tx, item.product_id, item.variant_id, item.quantity)
                    .await?;
            }
        }

        tx.commit().await?;
        self.load_order(order_id).await
    }

    // ========================================================================
    // Internal helpers (shared with the payment reconciler)
    // ========================================================================

    pub(crate) async fn load_order(&self, order_id: Uuid) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1",
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position",
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        order_from_rows(row, items)
    }

    async fn assemble_orders(&self, rows: Vec<OrderRow>) -> AppResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = sqlx::query_as::<_, OrderItemRow>(&format!(
                "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY position",
            ))
            .bind(row.id)
            .fetch_all(&self.db)
            .await?;
            orders.push(order_from_rows(row, items)?);
        }
        Ok(orders)
    }

    async fn check_order_access(&self, actor: &AuthUser, order: &Order) -> AppResult<()> {
        if actor.is_admin() || order.customer_id == actor.user_id {
            return Ok(());
        }
        let producer_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM producers WHERE user_id = $1",
        )
        .bind(actor.user_id)
        .fetch_optional(&self.db)
        .await?;
        if let Some(producer_id) = producer_id {
            if order.items.iter().any(|i| i.producer_id == producer_id) {
                return Ok(());
            }
        }
        Err(AppError::Forbidden(
            "You do not have access to this order".to_string(),
        ))
    }

    async fn dispatch_order_notifications(
        &self,
        order: &Order,
        notifications: &NotificationService,
    ) {
        match self.customer_email(order.customer_id).await {
            Ok(email) => notifications.send_order_confirmation(order, &email).await,
            Err(e) => tracing::warn!("Could not resolve customer email: {}", e),
        }

        for producer_id in order.producer_ids() {
            let email = sqlx::query_scalar::<_, String>(
                r#"
                SELECT u.email
                FROM producers p
                JOIN users u ON u.id = p.user_id
                WHERE p.id = $1
                "#,
            )
            .bind(producer_id)
            .fetch_optional(&self.db)
            .await;
            match email {
                Ok(Some(email)) => {
                    notifications
                        .send_producer_order_notice(order, &email)
                        .await
                }
                Ok(None) => {
                    tracing::warn!("No account email for producer {}", producer_id)
                }
                Err(e) => tracing::warn!("Could not resolve producer email: {}", e),
            }
        }
    }

    pub(crate) async fn customer_email(&self, customer_id: Uuid) -> AppResult<String> {
        let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(customer_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))?;
        Ok(email)
    }
}

/// Restore stock for every line item of an order (refund/cancellation path)
pub(crate) async fn restore_order_stock(
    tx: &mut Transaction<'_, Postgres>,
    products: &ProductService,
    items: &[OrderItem],
) -> AppResult<()> {
    for item in items {
        products
            .increase_stock(tx, item.product_id, item.variant_id, item.quantity)
            .await?;
    }
    Ok(())
}

pub(crate) fn order_from_rows(row: OrderRow, items: Vec<OrderItemRow>) -> AppResult<Order> {
    let status = OrderStatus::parse(&row.status)
        .ok_or_else(|| AppError::Internal(format!("Unknown order status: {}", row.status)))?;
    let payment_method = PaymentMethod::parse(&row.payment_method).ok_or_else(|| {
        AppError::Internal(format!("Unknown payment method: {}", row.payment_method))
    })?;
    let payment_status = PaymentStatus::parse(&row.payment_status).ok_or_else(|| {
        AppError::Internal(format!("Unknown payment status: {}", row.payment_status))
    })?;

    Ok(Order {
        id: row.id,
        order_number: row.order_number,
        customer_id: row.customer_id,
        items: items
            .into_iter()
            .map(|i| OrderItem {
                product_id: i.product_id,
                variant_id: i.variant_id,
                producer_id: i.producer_id,
                product_name: i.product_name,
                quantity: i.quantity,
                price_at_purchase: i.price_at_purchase,
                commission_rate: i.commission_rate,
            })
            .collect(),
        subtotal: row.subtotal,
        shipping_cost: row.shipping_cost,
        discount: row.discount,
        coupon_id: row.coupon_id,
        total: row.total,
        status,
        payment_method,
        payment_status,
        shipping_address: row.shipping_address.0,
        payment_intent_id: row.payment_intent_id,
        checkout_session_id: row.checkout_session_id,
        tracking_number: row.tracking_number,
        carrier: row.carrier,
        shipped_at: row.shipped_at,
        delivered_at: row.delivered_at,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
