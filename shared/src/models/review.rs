//! Review model and rating aggregation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const RATING_MIN: i32 = 1;
pub const RATING_MAX: i32 = 5;

/// A customer review, one per (user, product), only after delivery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub producer_id: Uuid,
    pub order_id: Uuid,
    pub rating: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Recompute a rating aggregate from scratch
pub fn rating_aggregate(ratings: &[i32]) -> (Decimal, i64) {
    if ratings.is_empty() {
        return (Decimal::ZERO, 0);
    }
    let sum: i64 = ratings.iter().map(|r| *r as i64).sum();
    let count = ratings.len() as i64;
    let average = (Decimal::from(sum) / Decimal::from(count)).round_dp(2);
    (average, count)
}
