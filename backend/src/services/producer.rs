//! Producer onboarding service: applications, approval, suspension and the
//! one-shot referral bonus

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use shared::models::{generate_referral_code, Producer, UserRole};
use shared::types::LocalizedText;
use shared::validation::validate_business_name;

/// Producer service
#[derive(Clone)]
pub struct ProducerService {
    db: PgPool,
    default_commission_rate: Decimal,
    referral_bonus_rate: Decimal,
    referral_bonus_days: i64,
}

/// Producer row as stored
#[derive(Debug, FromRow)]
struct ProducerRow {
    id: Uuid,
    user_id: Uuid,
    business_name: String,
    description: Json<LocalizedText>,
    is_approved: bool,
    is_suspended: bool,
    commission_rate: Decimal,
    special_commission_rate: Option<Decimal>,
    special_commission_until: Option<DateTime<Utc>>,
    referral_code: String,
    referred_by: Option<Uuid>,
    referral_count: i32,
    referral_bonus_applied: bool,
    average_rating: Decimal,
    review_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const PRODUCER_COLUMNS: &str = "id, user_id, business_name, description, is_approved, \
    is_suspended, commission_rate, special_commission_rate, special_commission_until, \
    referral_code, referred_by, referral_count, referral_bonus_applied, average_rating, \
    review_count, created_at, updated_at";

/// Input for applying as a producer
#[derive(Debug, Deserialize)]
pub struct ApplyProducerInput {
    pub business_name: String,
    #[serde(default)]
    pub description: LocalizedText,
    /// Referral code of an existing producer, when referred
    pub referral_code: Option<String>,
}

/// Input for updating one's own producer profile
#[derive(Debug, Deserialize)]
pub struct UpdateProducerInput {
    pub business_name: Option<String>,
    pub description: Option<LocalizedText>,
}

impl ProducerService {
    /// Create a new ProducerService instance
    pub fn new(db: PgPool, config: &Config) -> Self {
        Self {
            db,
            default_commission_rate: config.market.default_commission_rate,
            referral_bonus_rate: config.market.referral_bonus_rate,
            referral_bonus_days: config.market.referral_bonus_days,
        }
    }

    /// Apply to sell on the marketplace; the application starts unapproved
    pub async fn apply(&self, user_id: Uuid, input: ApplyProducerInput) -> AppResult<Producer> {
        validate_business_name(&input.business_name).map_err(|e| AppError::Validation {
            field: "business_name".to_string(),
            message: e.to_string(),
        })?;

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM producers WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        if existing > 0 {
            return Err(AppError::Conflict(
                "A producer profile already exists for this account".to_string(),
            ));
        }

        // Resolve the referring producer, when a code was supplied
        let referred_by = match &input.referral_code {
            Some(code) => {
                let referrer = sqlx::query_scalar::<_, Uuid>(
                    "SELECT id FROM producers WHERE referral_code = $1 AND is_approved = true",
                )
                .bind(code)
                .fetch_optional(&self.db)
                .await?;
                Some(referrer.ok_or_else(|| AppError::Validation {
                    field: "referral_code".to_string(),
                    message: "Unknown referral code".to_string(),
                })?)
            }
            None => None,
        };

        let row = sqlx::query_as::<_, ProducerRow>(&format!(
            r#"
            INSERT INTO producers (
                user_id, business_name, description, commission_rate,
                referral_code, referred_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PRODUCER_COLUMNS}
            "#,
        ))
        .bind(user_id)
        .bind(&input.business_name)
        .bind(Json(&input.description))
        .bind(self.default_commission_rate)
        .bind(generate_referral_code())
        .bind(referred_by)
        .fetch_one(&self.db)
        .await?;

        Ok(producer_from_row(row))
    }

    /// Fetch a producer profile by user id
    pub async fn get_by_user(&self, user_id: Uuid) -> AppResult<Producer> {
        let row = sqlx::query_as::<_, ProducerRow>(&format!(
            "SELECT {PRODUCER_COLUMNS} FROM producers WHERE user_id = $1",
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Producer".to_string()))?;
        Ok(producer_from_row(row))
    }

    /// Fetch a producer by id
    pub async fn get(&self, producer_id: Uuid) -> AppResult<Producer> {
        let row = sqlx::query_as::<_, ProducerRow>(&format!(
            "SELECT {PRODUCER_COLUMNS} FROM producers WHERE id = $1",
        ))
        .bind(producer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Producer".to_string()))?;
        Ok(producer_from_row(row))
    }

    /// The id of the producer owned by a user, when one exists
    pub async fn producer_id_for_user(&self, user_id: Uuid) -> AppResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM producers WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(id)
    }

    /// Update one's own producer profile
    pub async fn update_own(
        &self,
        user_id: Uuid,
        input: UpdateProducerInput,
    ) -> AppResult<Producer> {
        let current = self.get_by_user(user_id).await?;

        let business_name = input.business_name.unwrap_or(current.business_name);
        validate_business_name(&business_name).map_err(|e| AppError::Validation {
            field: "business_name".to_string(),
            message: e.to_string(),
        })?;
        let description = input.description.unwrap_or(current.description);

        let row = sqlx::query_as::<_, ProducerRow>(&format!(
            r#"
            UPDATE producers
            SET business_name = $2, description = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCER_COLUMNS}
            "#,
        ))
        .bind(current.id)
        .bind(&business_name)
        .bind(Json(&description))
        .fetch_one(&self.db)
        .await?;

        Ok(producer_from_row(row))
    }

    /// List producers, optionally only pending applications (admin)
    pub async fn list(&self, pending_only: bool) -> AppResult<Vec<Producer>> {
        let rows = sqlx::query_as::<_, ProducerRow>(&format!(
            r#"
            SELECT {PRODUCER_COLUMNS}
            FROM producers
            WHERE ($1 = false OR is_approved = false)
            ORDER BY created_at DESC
            "#,
        ))
        .bind(pending_only)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(producer_from_row).collect())
    }

    /// Approve a producer application (admin). Repeat calls are no-ops, and
    /// the referral bonus is applied at most once, guarded by a conditional
    /// flag update.
    pub async fn approve(&self, producer_id: Uuid) -> AppResult<Producer> {
        let mut tx = self.db.begin().await?;

        // First approval only; a second call matches no row
        let approved = sqlx::query_as::<_, (Uuid, Option<Uuid>)>(
            r#"
            UPDATE producers
            SET is_approved = true, updated_at = NOW()
            WHERE id = $1 AND is_approved = false
            RETURNING user_id, referred_by
            "#,
        )
        .bind(producer_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((user_id, referred_by)) = approved {
            // The owning account becomes a producer account
            sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
                .bind(user_id)
                .bind(UserRole::Producer.as_str())
                .execute(&mut *tx)
                .await?;

            if let Some(referrer_id) = referred_by {
                self.apply_referral_bonus(&mut tx, producer_id, referrer_id)
                    .await?;
            }
        } else {
            // Ensure the producer exists before reporting an idempotent success
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM producers WHERE id = $1)",
            )
            .bind(producer_id)
            .fetch_one(&mut *tx)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Producer".to_string()));
            }
        }

        tx.commit().await?;
        self.get(producer_id).await
    }

    /// Grant the referral bonus to both parties, exactly once. The flag
    /// update is conditional so a concurrent or repeated approval cannot
    /// apply it twice.
    async fn apply_referral_bonus(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        producer_id: Uuid,
        referrer_id: Uuid,
    ) -> AppResult<()> {
        let claimed = sqlx::query(
            "UPDATE producers SET referral_bonus_applied = true
             WHERE id = $1 AND referral_bonus_applied = false",
        )
        .bind(producer_id)
        .execute(&mut **tx)
        .await?;

        if claimed.rows_affected() == 0 {
            return Ok(());
        }

        let until = Utc::now() + Duration::days(self.referral_bonus_days);

        // The newly approved producer gets a fresh bonus window
        sqlx::query(
            r#"
            UPDATE producers
            SET special_commission_rate = $2, special_commission_until = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(producer_id)
        .bind(self.referral_bonus_rate)
        .bind(until)
        .execute(&mut **tx)
        .await?;

        // The referrer's window is extended, never reset
        sqlx::query(
            r#"
            UPDATE producers
            SET special_commission_rate = $2,
                special_commission_until = GREATEST(
                    COALESCE(special_commission_until, TO_TIMESTAMP(0)), $3
                ),
                referral_count = referral_count + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(referrer_id)
        .bind(self.referral_bonus_rate)
        .bind(until)
        .execute(&mut **tx)
        .await?;

        tracing::info!(
            "Referral bonus applied: producer {} referred by {}",
            producer_id,
            referrer_id
        );

        Ok(())
    }

    /// Reject (delete) a pending application (admin)
    pub async fn reject(&self, producer_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "DELETE FROM producers WHERE id = $1 AND is_approved = false",
        )
        .bind(producer_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Pending producer application".to_string()));
        }
        Ok(())
    }

    /// Suspend or reinstate a producer (admin)
    pub async fn set_suspended(&self, producer_id: Uuid, suspended: bool) -> AppResult<Producer> {
        let result = sqlx::query(
            "UPDATE producers SET is_suspended = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(producer_id)
        .bind(suspended)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Producer".to_string()));
        }
        self.get(producer_id).await
    }
}

fn producer_from_row(row: ProducerRow) -> Producer {
    Producer {
        id: row.id,
        user_id: row.user_id,
        business_name: row.business_name,
        description: row.description.0,
        is_approved: row.is_approved,
        is_suspended: row.is_suspended,
        commission_rate: row.commission_rate,
        special_commission_rate: row.special_commission_rate,
        special_commission_until: row.special_commission_until,
        referral_code: row.referral_code,
        referred_by: row.referred_by,
        referral_count: row.referral_count,
        referral_bonus_applied: row.referral_bonus_applied,
        average_rating: row.average_rating,
        review_count: row.review_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}
