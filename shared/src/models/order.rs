//! Order aggregate: line-item snapshots, totals, status machines and the
//! payment-event reconciliation table

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Address;

/// Order fulfilment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Forward chain plus cancellation before shipment. Delivered and
    /// cancelled are terminal.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Preparing, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(PaymentMethod::Card),
            "bank_transfer" => Some(PaymentMethod::BankTransfer),
            "cash_on_delivery" => Some(PaymentMethod::CashOnDelivery),
            _ => None,
        }
    }

    /// Cash on delivery is guaranteed at the door, so the order confirms
    /// (and stock commits) at creation. Card and bank transfer confirm later.
    pub fn confirms_at_creation(&self) -> bool {
        matches!(self, PaymentMethod::CashOnDelivery)
    }

    /// Card payments go through the external checkout provider
    pub fn collects_via_provider(&self) -> bool {
        matches!(self, PaymentMethod::Card)
    }

    pub fn initial_order_status(&self) -> OrderStatus {
        if self.confirms_at_creation() {
            OrderStatus::Confirmed
        } else {
            OrderStatus::Pending
        }
    }
}

/// Payment collection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "paid" => Some(PaymentStatus::Paid),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}

/// Immutable snapshot of one product line at the moment the order was placed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<Uuid>,
    pub producer_id: Uuid,
    /// Product name at purchase time
    pub product_name: String,
    pub quantity: i32,
    /// Catalog unit price at purchase time
    pub price_at_purchase: Decimal,
    /// Producer's effective commission rate at purchase time, in percent
    pub commission_rate: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price_at_purchase * Decimal::from(self.quantity)
    }

    /// Platform commission for this line, from the snapshot rate
    pub fn commission_amount(&self) -> Decimal {
        self.line_total() * self.commission_rate / Decimal::from(100)
    }

    /// Producer payout for this line
    pub fn net_amount(&self) -> Decimal {
        self.line_total() - self.commission_amount()
    }
}

/// Order money totals, fixed at creation time
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// total = subtotal + shipping - discount
    pub fn compute(items: &[OrderItem], shipping_cost: Decimal, discount: Decimal) -> Self {
        let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
        Self {
            subtotal,
            shipping_cost,
            discount,
            total: subtotal + shipping_cost - discount,
        }
    }
}

/// An order placed by a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub discount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_id: Option<Uuid>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub shipping_address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipped_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether stock has already been committed for this order: either
    /// synchronously at creation (cash on delivery) or on payment.
    pub fn stock_committed(&self) -> bool {
        self.payment_method.confirms_at_creation() || self.payment_status == PaymentStatus::Paid
    }

    pub fn producer_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.items.iter().map(|i| i.producer_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Generate a human-readable order number, time plus random suffix
/// (e.g. "MKT-20260807-3F9A2C")
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!(
        "MKT-{}-{}",
        now.format("%Y%m%d"),
        raw[..6].to_ascii_uppercase()
    )
}

// ============================================================================
// Payment event reconciliation
// ============================================================================

/// Payment-provider events the reconciler understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutSessionCompleted,
    PaymentIntentSucceeded,
    PaymentIntentFailed,
    ChargeRefunded,
}

impl PaymentEvent {
    pub fn from_event_type(event_type: &str) -> Option<Self> {
        match event_type {
            "checkout.session.completed" => Some(PaymentEvent::CheckoutSessionCompleted),
            "payment_intent.succeeded" => Some(PaymentEvent::PaymentIntentSucceeded),
            "payment_intent.payment_failed" => Some(PaymentEvent::PaymentIntentFailed),
            "charge.refunded" => Some(PaymentEvent::ChargeRefunded),
            _ => None,
        }
    }
}

/// Stock side effect of a payment transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Commit the sale: decrement every line item
    Decrement,
    /// Undo the sale: restore every line item
    Restore,
}

/// The state change a payment event maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTransition {
    pub payment_status: PaymentStatus,
    /// New order status, when the event changes it
    pub order_status: Option<OrderStatus>,
    pub stock_effect: StockEffect,
}

impl PaymentEvent {
    /// Target transition for this event
    pub fn transition(&self) -> PaymentTransition {
        match self {
            PaymentEvent::CheckoutSessionCompleted | PaymentEvent::PaymentIntentSucceeded => {
                PaymentTransition {
                    payment_status: PaymentStatus::Paid,
                    order_status: Some(OrderStatus::Confirmed),
                    stock_effect: StockEffect::Decrement,
                }
            }
            // A failed attempt leaves the order pending so payment can be
            // retried.
            PaymentEvent::PaymentIntentFailed => PaymentTransition {
                payment_status: PaymentStatus::Failed,
                order_status: None,
                stock_effect: StockEffect::None,
            },
            PaymentEvent::ChargeRefunded => PaymentTransition {
                payment_status: PaymentStatus::Refunded,
                order_status: Some(OrderStatus::Cancelled),
                stock_effect: StockEffect::Restore,
            },
        }
    }

    /// Idempotency guard: whether the transition applies given the order's
    /// current payment status. Repeat deliveries of the same event are
    /// no-ops, and a refund only applies to a paid order.
    pub fn applies_to(&self, current: PaymentStatus) -> bool {
        let target = self.transition().payment_status;
        if current == target {
            return false;
        }
        match self {
            PaymentEvent::CheckoutSessionCompleted | PaymentEvent::PaymentIntentSucceeded => {
                matches!(current, PaymentStatus::Pending | PaymentStatus::Failed)
            }
            PaymentEvent::PaymentIntentFailed => current == PaymentStatus::Pending,
            PaymentEvent::ChargeRefunded => current == PaymentStatus::Paid,
        }
    }
}
