//! Commission reporting service
//!
//! Revenue and payout figures come exclusively from paid orders, computed
//! from the commission-rate snapshots on the order items. Rate changes
//! after the fact never alter historical numbers.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Commission reporting service
#[derive(Clone)]
pub struct CommissionService {
    db: PgPool,
}

/// Per-producer commission report entry
#[derive(Debug, Serialize)]
pub struct ProducerCommissionReport {
    pub producer_id: Uuid,
    pub business_name: String,
    /// Σ price-at-purchase × quantity over paid orders
    pub gross_revenue: Decimal,
    /// Σ line commission from the snapshot rates
    pub commission_total: Decimal,
    pub net_payout: Decimal,
    pub paid_order_count: i64,
    pub item_count: i64,
}

/// Platform-wide totals
#[derive(Debug, Serialize)]
pub struct PlatformCommissionReport {
    pub producers: Vec<ProducerCommissionReport>,
    pub gross_revenue: Decimal,
    pub commission_total: Decimal,
    pub net_payout: Decimal,
}

/// Report filter parameters
#[derive(Debug, Deserialize)]
pub struct ReportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct ReportRow {
    producer_id: Uuid,
    business_name: String,
    gross_revenue: Decimal,
    commission_total: Decimal,
    paid_order_count: i64,
    item_count: i64,
}

impl CommissionService {
    /// Create a new CommissionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Commission report for one producer
    pub async fn producer_report(
        &self,
        producer_id: Uuid,
        filter: &ReportFilter,
    ) -> AppResult<ProducerCommissionReport> {
        let rows = self.query_report(Some(producer_id), filter).await?;
        match rows.into_iter().next() {
            Some(report) => Ok(report),
            None => {
                // No paid orders yet: an empty report, not an error
                let business_name = sqlx::query_scalar::<_, String>(
                    "SELECT business_name FROM producers WHERE id = $1",
                )
                .bind(producer_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Producer".to_string()))?;
                Ok(ProducerCommissionReport {
                    producer_id,
                    business_name,
                    gross_revenue: Decimal::ZERO,
                    commission_total: Decimal::ZERO,
                    net_payout: Decimal::ZERO,
                    paid_order_count: 0,
                    item_count: 0,
                })
            }
        }
    }

    /// Platform-wide commission report (admin)
    pub async fn platform_report(
        &self,
        filter: &ReportFilter,
    ) -> AppResult<PlatformCommissionReport> {
        let producers = self.query_report(None, filter).await?;

        let gross_revenue = producers.iter().map(|p| p.gross_revenue).sum();
        let commission_total = producers.iter().map(|p| p.commission_total).sum();
        let net_payout = producers.iter().map(|p| p.net_payout).sum();

        Ok(PlatformCommissionReport {
            producers,
            gross_revenue,
            commission_total,
            net_payout,
        })
    }

    async fn query_report(
        &self,
        producer_id: Option<Uuid>,
        filter: &ReportFilter,
    ) -> AppResult<Vec<ProducerCommissionReport>> {
        let start = filter
            .start_date
            .unwrap_or(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        let end = filter
            .end_date
            .unwrap_or(NaiveDate::from_ymd_opt(2100, 12, 31).unwrap());

        let rows = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT oi.producer_id,
                   pr.business_name,
                   COALESCE(SUM(oi.price_at_purchase * oi.quantity), 0) AS gross_revenue,
                   COALESCE(SUM(oi.price_at_purchase * oi.quantity * oi.commission_rate / 100), 0)
                       AS commission_total,
                   COUNT(DISTINCT o.id) AS paid_order_count,
                   COALESCE(SUM(oi.quantity), 0)::bigint AS item_count
            FROM order_items oi
            JOIN orders o ON o.id = oi.order_id
            JOIN producers pr ON pr.id = oi.producer_id
            WHERE o.payment_status = 'paid'
              AND o.created_at >= $1::date
              AND o.created_at < ($2::date + INTERVAL '1 day')
              AND ($3::uuid IS NULL OR oi.producer_id = $3)
            GROUP BY oi.producer_id, pr.business_name
            ORDER BY gross_revenue DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(producer_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ProducerCommissionReport {
                producer_id: r.producer_id,
                business_name: r.business_name,
                net_payout: r.gross_revenue - r.commission_total,
                gross_revenue: r.gross_revenue,
                commission_total: r.commission_total,
                paid_order_count: r.paid_order_count,
                item_count: r.item_count,
            })
            .collect())
    }

    /// Serialize report rows to CSV for download
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization failed: {}", e)))?;
        }
        let csv_data = String::from_utf8(wtr.into_inner().map_err(|e| {
            AppError::Internal(format!("CSV writer error: {}", e))
        })?)
        .map_err(|e| AppError::Internal(format!("CSV encoding error: {}", e)))?;
        Ok(csv_data)
    }
}
