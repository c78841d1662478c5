//! Producer models: commission rates and the referral bonus window

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::LocalizedText;

/// A producer selling on the marketplace
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Producer {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub description: LocalizedText,
    pub is_approved: bool,
    pub is_suspended: bool,
    /// Base commission rate in percent
    pub commission_rate: Decimal,
    /// Time-bounded promotional rate, active while `special_commission_until`
    /// lies in the future
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_commission_rate: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_commission_until: Option<DateTime<Utc>>,
    pub referral_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<Uuid>,
    pub referral_count: i32,
    pub referral_bonus_applied: bool,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Producer {
    /// Resolve the currently active commission rate: the special rate while
    /// its window is open, the base rate otherwise.
    pub fn effective_commission_rate(&self, now: DateTime<Utc>) -> Decimal {
        match (self.special_commission_rate, self.special_commission_until) {
            (Some(rate), Some(until)) if now < until => rate,
            _ => self.commission_rate,
        }
    }

    pub fn can_sell(&self) -> bool {
        self.is_approved && !self.is_suspended
    }
}

/// Extend a bonus window rather than reset it: keep the later of the
/// current expiry and the newly granted one.
pub fn extend_bonus_window(
    current: Option<DateTime<Utc>>,
    granted_until: DateTime<Utc>,
) -> DateTime<Utc> {
    match current {
        Some(existing) if existing > granted_until => existing,
        _ => granted_until,
    }
}

/// Generate a referral code from a fresh random identifier
pub fn generate_referral_code() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw[..8].to_ascii_uppercase()
}
