//! Coupon service: admin CRUD, validation previews and order application
//!
//! The global usage cap is enforced with a conditional counter increment so
//! two concurrent orders cannot both consume the last use.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::models::{Coupon, CouponError, DiscountType};
use shared::validation::validate_coupon_code;

/// Coupon service
#[derive(Clone)]
pub struct CouponService {
    db: PgPool,
}

/// Coupon row as stored
#[derive(Debug, FromRow)]
struct CouponRow {
    id: Uuid,
    code: String,
    discount_type: String,
    discount_value: Decimal,
    min_order_amount: Decimal,
    max_discount_amount: Option<Decimal>,
    first_order_only: bool,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    max_uses: Option<i32>,
    max_uses_per_user: Option<i32>,
    times_used: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, min_order_amount, \
    max_discount_amount, first_order_only, valid_from, valid_until, max_uses, \
    max_uses_per_user, times_used, is_active, created_at, updated_at";

/// Input for creating a coupon (admin)
#[derive(Debug, Deserialize)]
pub struct CreateCouponInput {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    #[serde(default)]
    pub first_order_only: bool,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub max_uses: Option<i32>,
    pub max_uses_per_user: Option<i32>,
}

/// Input for updating a coupon (admin)
#[derive(Debug, Deserialize)]
pub struct UpdateCouponInput {
    pub discount_value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub max_discount_amount: Option<Option<Decimal>>,
    pub first_order_only: Option<bool>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub max_uses: Option<Option<i32>>,
    pub max_uses_per_user: Option<Option<i32>>,
    pub is_active: Option<bool>,
}

/// Result of a coupon validation preview
#[derive(Debug, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount: Decimal,
    pub subtotal_after_discount: Decimal,
}

impl CouponService {
    /// Create a new CouponService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a coupon (admin)
    pub async fn create(&self, input: CreateCouponInput) -> AppResult<Coupon> {
        validate_coupon_code(&input.code).map_err(|e| AppError::Validation {
            field: "code".to_string(),
            message: e.to_string(),
        })?;
        validate_discount_value(input.discount_type, input.discount_value)?;
        if input.valid_until <= input.valid_from {
            return Err(AppError::Validation {
                field: "valid_until".to_string(),
                message: "Validity window must end after it starts".to_string(),
            });
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM coupons WHERE code = $1",
        )
        .bind(&input.code)
        .fetch_one(&self.db)
        .await?;
        if existing > 0 {
            return Err(AppError::DuplicateEntry("coupon code".to_string()));
        }

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r#"
            INSERT INTO coupons (
                code, discount_type, discount_value, min_order_amount,
                max_discount_amount, first_order_only, valid_from, valid_until,
                max_uses, max_uses_per_user
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {COUPON_COLUMNS}
            "#,
        ))
        .bind(&input.code)
        .bind(input.discount_type.as_str())
        .bind(input.discount_value)
        .bind(input.min_order_amount)
        .bind(input.max_discount_amount)
        .bind(input.first_order_only)
        .bind(input.valid_from)
        .bind(input.valid_until)
        .bind(input.max_uses)
        .bind(input.max_uses_per_user)
        .fetch_one(&self.db)
        .await?;

        coupon_from_row(row)
    }

    /// Update a coupon (admin)
    pub async fn update(&self, coupon_id: Uuid, input: UpdateCouponInput) -> AppResult<Coupon> {
        let current = self.get(coupon_id).await?;

        let discount_value = input.discount_value.unwrap_or(current.discount_value);
        validate_discount_value(current.discount_type, discount_value)?;

        let min_order_amount = input.min_order_amount.unwrap_or(current.min_order_amount);
        let max_discount_amount = input
            .max_discount_amount
            .unwrap_or(current.max_discount_amount);
        let first_order_only = input.first_order_only.unwrap_or(current.first_order_only);
        let valid_from = input.valid_from.unwrap_or(current.valid_from);
        let valid_until = input.valid_until.unwrap_or(current.valid_until);
        let max_uses = input.max_uses.unwrap_or(current.max_uses);
        let max_uses_per_user = input.max_uses_per_user.unwrap_or(current.max_uses_per_user);
        let is_active = input.is_active.unwrap_or(current.is_active);

        if valid_until <= valid_from {
            return Err(AppError::Validation {
                field: "valid_until".to_string(),
                message: "Validity window must end after it starts".to_string(),
            });
        }

        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r#"
            UPDATE coupons
            SET discount_value = $2, min_order_amount = $3, max_discount_amount = $4,
                first_order_only = $5, valid_from = $6, valid_until = $7,
                max_uses = $8, max_uses_per_user = $9, is_active = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "#,
        ))
        .bind(coupon_id)
        .bind(discount_value)
        .bind(min_order_amount)
        .bind(max_discount_amount)
        .bind(first_order_only)
        .bind(valid_from)
        .bind(valid_until)
        .bind(max_uses)
        .bind(max_uses_per_user)
        .bind(is_active)
        .fetch_one(&self.db)
        .await?;

        coupon_from_row(row)
    }

    /// Fetch a coupon by id
    pub async fn get(&self, coupon_id: Uuid) -> AppResult<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1",
        ))
        .bind(coupon_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon".to_string()))?;
        coupon_from_row(row)
    }

    /// List all coupons (admin)
    pub async fn list(&self) -> AppResult<Vec<Coupon>> {
        let rows = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC",
        ))
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(coupon_from_row).collect()
    }

    /// Delete a coupon (admin); its usage log rows go with it
    pub async fn delete(&self, coupon_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(coupon_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Coupon".to_string()));
        }
        Ok(())
    }

    /// Validate a coupon against a subtotal without consuming a use
    pub async fn preview(
        &self,
        user_id: Uuid,
        code: &str,
        subtotal: Decimal,
    ) -> AppResult<CouponPreview> {
        let coupon = self.get_by_code(code).await?;
        let user_uses = self.user_usage_count(&coupon.id, user_id).await?;
        let is_first_order = self.is_first_order(user_id).await?;

        coupon.check_valid(Utc::now(), subtotal, user_uses, is_first_order)?;
        let discount = coupon.calculate_discount(subtotal);

        Ok(CouponPreview {
            code: coupon.code,
            discount,
            subtotal_after_discount: subtotal - discount,
        })
    }

    /// Validate and consume a coupon inside an order-creation transaction.
    /// Returns the coupon id and the computed discount.
    pub async fn apply_for_order(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        code: &str,
        subtotal: Decimal,
    ) -> AppResult<(Uuid, Decimal)> {
        let coupon = self.get_by_code(code).await?;
        let user_uses = self.user_usage_count(&coupon.id, user_id).await?;
        let is_first_order = self.is_first_order(user_id).await?;

        coupon.check_valid(Utc::now(), subtotal, user_uses, is_first_order)?;
        let discount = coupon.calculate_discount(subtotal);

        // Conditional increment: the global cap holds under concurrency
        let consumed = sqlx::query(
            r#"
            UPDATE coupons
            SET times_used = times_used + 1, updated_at = NOW()
            WHERE id = $1 AND (max_uses IS NULL OR times_used < max_uses)
            "#,
        )
        .bind(coupon.id)
        .execute(&mut **tx)
        .await?;

        if consumed.rows_affected() == 0 {
            return Err(CouponError::UsageLimitReached.into());
        }

        // Append-only usage log; drives the per-user cap
        sqlx::query(
            "INSERT INTO coupon_usages (coupon_id, user_id, discount_amount)
             VALUES ($1, $2, $3)",
        )
        .bind(coupon.id)
        .bind(user_id)
        .bind(discount)
        .execute(&mut **tx)
        .await?;

        Ok((coupon.id, discount))
    }

    async fn get_by_code(&self, code: &str) -> AppResult<Coupon> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1",
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Coupon".to_string()))?;
        coupon_from_row(row)
    }

    async fn user_usage_count(&self, coupon_id: &Uuid, user_id: Uuid) -> AppResult<i32> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count as i32)
    }

    async fn is_first_order(&self, user_id: Uuid) -> AppResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM orders WHERE customer_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count == 0)
    }
}

fn validate_discount_value(discount_type: DiscountType, value: Decimal) -> AppResult<()> {
    if value <= Decimal::ZERO {
        return Err(AppError::Validation {
            field: "discount_value".to_string(),
            message: "Discount value must be positive".to_string(),
        });
    }
    if discount_type == DiscountType::Percentage && value > Decimal::from(100) {
        return Err(AppError::Validation {
            field: "discount_value".to_string(),
            message: "Percentage discount cannot exceed 100".to_string(),
        });
    }
    Ok(())
}

fn coupon_from_row(row: CouponRow) -> AppResult<Coupon> {
    let discount_type = DiscountType::parse(&row.discount_type)
        .ok_or_else(|| AppError::Internal(format!("Unknown discount type: {}", row.discount_type)))?;
    Ok(Coupon {
        id: row.id,
        code: row.code,
        discount_type,
        discount_value: row.discount_value,
        min_order_amount: row.min_order_amount,
        max_discount_amount: row.max_discount_amount,
        first_order_only: row.first_order_only,
        valid_from: row.valid_from,
        valid_until: row.valid_until,
        max_uses: row.max_uses,
        max_uses_per_user: row.max_uses_per_user,
        times_used: row.times_used,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
