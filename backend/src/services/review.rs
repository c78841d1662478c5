//! Review service
//!
//! A review requires a delivered order containing the product, is unique
//! per (user, product), and refreshes the persisted rating aggregates on
//! both the product and the producer in the same transaction.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use shared::models::{OrderStatus, Review};
use shared::types::{PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::validate_rating;

/// Review service
#[derive(Clone)]
pub struct ReviewService {
    db: PgPool,
}

/// Review row as stored
#[derive(Debug, FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    product_id: Uuid,
    producer_id: Uuid,
    order_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

const REVIEW_COLUMNS: &str =
    "id, user_id, product_id, producer_id, order_id, rating, comment, created_at";

/// Input for creating a review
#[derive(Debug, Deserialize)]
pub struct CreateReviewInput {
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub rating: i32,
    pub comment: Option<String>,
}

impl ReviewService {
    /// Create a new ReviewService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a review for a delivered purchase
    pub async fn create(&self, user_id: Uuid, input: CreateReviewInput) -> AppResult<Review> {
        validate_rating(input.rating).map_err(|e| AppError::Validation {
            field: "rating".to_string(),
            message: e.to_string(),
        })?;

        // The order must belong to the reviewer and be delivered
        let order_status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM orders WHERE id = $1 AND customer_id = $2",
        )
        .bind(input.order_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        if OrderStatus::parse(&order_status) != Some(OrderStatus::Delivered) {
            return Err(AppError::Validation {
                field: "order_id".to_string(),
                message: "Reviews are only allowed once the order is delivered".to_string(),
            });
        }

        // The product must appear in that order; its producer comes from the
        // order snapshot
        let producer_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT producer_id FROM order_items WHERE order_id = $1 AND product_id = $2",
        )
        .bind(input.order_id)
        .bind(input.product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Validation {
            field: "product_id".to_string(),
            message: "The product is not part of this order".to_string(),
        })?;

        let already_reviewed = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE user_id = $1 AND product_id = $2)",
        )
        .bind(user_id)
        .bind(input.product_id)
        .fetch_one(&self.db)
        .await?;
        if already_reviewed {
            return Err(AppError::DuplicateEntry("review".to_string()));
        }

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            INSERT INTO reviews (user_id, product_id, producer_id, order_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {REVIEW_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(input.product_id)
        .bind(producer_id)
        .bind(input.order_id)
        .bind(input.rating)
        .bind(&input.comment)
        .fetch_one(&mut *tx)
        .await?;

        refresh_aggregates(&mut tx, input.product_id, producer_id).await?;
        tx.commit().await?;

        Ok(review_from_row(row))
    }

    /// Delete a review (owner or admin) and refresh the aggregates
    pub async fn delete(&self, actor: &AuthUser, review_id: Uuid) -> AppResult<()> {
        let review = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1",
        ))
        .bind(review_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Review".to_string()))?;

        if !actor.is_admin() && review.user_id != actor.user_id {
            return Err(AppError::Forbidden(
                "You can only delete your own reviews".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(review_id)
            .execute(&mut *tx)
            .await?;
        refresh_aggregates(&mut tx, review.product_id, review.producer_id).await?;
        tx.commit().await?;

        Ok(())
    }

    /// List reviews for a product
    pub async fn list_by_product(
        &self,
        product_id: Uuid,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Review>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reviews WHERE product_id = $1")
                .bind(product_id)
                .fetch_one(&self.db)
                .await?;

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS}
            FROM reviews
            WHERE product_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        ))
        .bind(product_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse {
            data: rows.into_iter().map(review_from_row).collect(),
            pagination: PaginationMeta::new(&pagination, total as u64),
        })
    }
}

/// Recompute and persist the average rating and count on the product and
/// the producer
async fn refresh_aggregates(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    producer_id: Uuid,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE products
        SET average_rating = COALESCE(
                (SELECT ROUND(AVG(rating)::numeric, 2) FROM reviews WHERE product_id = $1), 0
            ),
            review_count = (SELECT COUNT(*) FROM reviews WHERE product_id = $1),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(product_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE producers
        SET average_rating = COALESCE(
                (SELECT ROUND(AVG(rating)::numeric, 2) FROM reviews WHERE producer_id = $1), 0
            ),
            review_count = (SELECT COUNT(*) FROM reviews WHERE producer_id = $1),
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(producer_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn review_from_row(row: ReviewRow) -> Review {
    Review {
        id: row.id,
        user_id: row.user_id,
        product_id: row.product_id,
        producer_id: row.producer_id,
        order_id: row.order_id,
        rating: row.rating,
        comment: row.comment,
        created_at: row.created_at,
    }
}
