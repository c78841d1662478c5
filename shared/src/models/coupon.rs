//! Coupon models and discount computation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Discount type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "percentage" => Some(DiscountType::Percentage),
            "fixed" => Some(DiscountType::Fixed),
            _ => None,
        }
    }
}

/// A discount coupon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// Minimum order subtotal for the coupon to apply
    pub min_order_amount: Decimal,
    /// Absolute cap on the computed discount
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_discount_amount: Option<Decimal>,
    pub first_order_only: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    /// Global usage cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<i32>,
    /// Per-user usage cap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses_per_user: Option<i32>,
    pub times_used: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Reasons a coupon cannot be applied
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CouponError {
    #[error("coupon is not active")]
    NotActive,

    #[error("coupon is not valid yet")]
    NotStarted,

    #[error("coupon has expired")]
    Expired,

    #[error("order subtotal below the coupon minimum of {0}")]
    MinOrderNotMet(Decimal),

    #[error("coupon usage limit reached")]
    UsageLimitReached,

    #[error("coupon already used the maximum number of times by this user")]
    UserLimitReached,

    #[error("coupon is valid for first orders only")]
    FirstOrderOnly,
}

impl Coupon {
    /// Check every applicability rule for a given order context
    pub fn check_valid(
        &self,
        now: DateTime<Utc>,
        subtotal: Decimal,
        user_uses: i32,
        is_first_order: bool,
    ) -> Result<(), CouponError> {
        if !self.is_active {
            return Err(CouponError::NotActive);
        }
        if now < self.valid_from {
            return Err(CouponError::NotStarted);
        }
        if now > self.valid_until {
            return Err(CouponError::Expired);
        }
        if subtotal < self.min_order_amount {
            return Err(CouponError::MinOrderNotMet(self.min_order_amount));
        }
        if let Some(max) = self.max_uses {
            if self.times_used >= max {
                return Err(CouponError::UsageLimitReached);
            }
        }
        if let Some(max) = self.max_uses_per_user {
            if user_uses >= max {
                return Err(CouponError::UserLimitReached);
            }
        }
        if self.first_order_only && !is_first_order {
            return Err(CouponError::FirstOrderOnly);
        }
        Ok(())
    }

    /// Compute the discount for a subtotal, clamped to `[0, subtotal]` and
    /// to `max_discount_amount` when set.
    pub fn calculate_discount(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::from(100),
            DiscountType::Fixed => self.discount_value,
        };
        let capped = match self.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        };
        capped.clamp(Decimal::ZERO, subtotal)
    }
}
