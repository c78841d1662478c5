//! Commission calculation tests
//!
//! Covers effective-rate resolution with time-bounded special rates, the
//! per-line commission arithmetic from snapshot rates, and revenue
//! aggregation over paid orders only.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{OrderItem, PaymentStatus, Producer};
use shared::types::LocalizedText;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn producer(base_rate: &str) -> Producer {
    let now = Utc::now();
    Producer {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        business_name: "Azienda Agricola Bianchi".to_string(),
        description: LocalizedText::new(),
        is_approved: true,
        is_suspended: false,
        commission_rate: dec(base_rate),
        special_commission_rate: None,
        special_commission_until: None,
        referral_code: "AB12CD34".to_string(),
        referred_by: None,
        referral_count: 0,
        referral_bonus_applied: false,
        average_rating: Decimal::ZERO,
        review_count: 0,
        created_at: now,
        updated_at: now,
    }
}

fn item(price: &str, quantity: i32, rate: &str) -> OrderItem {
    OrderItem {
        product_id: Uuid::new_v4(),
        variant_id: None,
        producer_id: Uuid::new_v4(),
        product_name: "Taleggio".to_string(),
        quantity,
        price_at_purchase: dec(price),
        commission_rate: dec(rate),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// The special rate applies only while its window is open
    #[test]
    fn test_effective_rate_with_active_window() {
        let now = Utc::now();
        let mut p = producer("15");
        p.special_commission_rate = Some(dec("10"));
        p.special_commission_until = Some(now + Duration::days(30));

        assert_eq!(p.effective_commission_rate(now), dec("10"));
    }

    /// At and after expiry the base rate is back
    #[test]
    fn test_effective_rate_at_expiry_boundary() {
        let now = Utc::now();
        let mut p = producer("15");
        p.special_commission_rate = Some(dec("10"));
        p.special_commission_until = Some(now);

        // now < until is false at the boundary
        assert_eq!(p.effective_commission_rate(now), dec("15"));
        assert_eq!(
            p.effective_commission_rate(now + Duration::seconds(1)),
            dec("15")
        );
        assert_eq!(
            p.effective_commission_rate(now - Duration::seconds(1)),
            dec("10")
        );
    }

    #[test]
    fn test_effective_rate_without_special() {
        let p = producer("15");
        assert_eq!(p.effective_commission_rate(Utc::now()), dec("15"));
    }

    /// A special rate without an expiry never applies
    #[test]
    fn test_special_rate_requires_expiry() {
        let mut p = producer("15");
        p.special_commission_rate = Some(dec("5"));
        assert_eq!(p.effective_commission_rate(Utc::now()), dec("15"));
    }

    /// price x quantity x rate / 100, from the snapshot rate
    #[test]
    fn test_per_item_commission() {
        let line = item("20.00", 3, "12.5");
        assert_eq!(line.line_total(), dec("60.00"));
        assert_eq!(line.commission_amount(), dec("7.50"));
        assert_eq!(line.net_amount(), dec("52.50"));
    }

    /// Only paid orders count toward revenue
    #[test]
    fn test_only_paid_orders_counted() {
        let orders = vec![
            (PaymentStatus::Paid, item("10.00", 2, "15")),
            (PaymentStatus::Pending, item("99.00", 1, "15")),
            (PaymentStatus::Failed, item("50.00", 1, "15")),
            (PaymentStatus::Paid, item("5.00", 4, "15")),
            (PaymentStatus::Refunded, item("70.00", 1, "15")),
        ];

        let gross: Decimal = orders
            .iter()
            .filter(|(status, _)| *status == PaymentStatus::Paid)
            .map(|(_, line)| line.line_total())
            .sum();
        let commission: Decimal = orders
            .iter()
            .filter(|(status, _)| *status == PaymentStatus::Paid)
            .map(|(_, line)| line.commission_amount())
            .sum();

        assert_eq!(gross, dec("40.00"));
        assert_eq!(commission, dec("6.00"));
        assert_eq!(gross - commission, dec("34.00"));
    }

    /// Rate changes after order creation do not alter the snapshot
    #[test]
    fn test_rate_change_does_not_rewrite_history() {
        let now = Utc::now();
        let mut p = producer("15");

        // Order placed while the promotional window is open
        p.special_commission_rate = Some(dec("8"));
        p.special_commission_until = Some(now + Duration::days(10));
        let snapshot_rate = p.effective_commission_rate(now);
        let line = OrderItem {
            commission_rate: snapshot_rate,
            ..item("30.00", 1, "0")
        };

        // Window lapses; the line still carries 8%
        let later = now + Duration::days(11);
        assert_eq!(p.effective_commission_rate(later), dec("15"));
        assert_eq!(line.commission_rate, dec("8"));
        assert_eq!(line.commission_amount(), dec("2.40"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn rate_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The effective rate is always one of the two configured rates
        #[test]
        fn prop_effective_rate_is_configured(
            base in rate_strategy(),
            special in rate_strategy(),
            offset_days in -30i64..30,
        ) {
            let now = Utc::now();
            let mut p = producer("1");
            p.commission_rate = base;
            p.special_commission_rate = Some(special);
            p.special_commission_until = Some(now + Duration::days(offset_days));

            let effective = p.effective_commission_rate(now);
            if offset_days > 0 {
                prop_assert_eq!(effective, special);
            } else {
                prop_assert_eq!(effective, base);
            }
        }

        /// Gross always splits exactly into commission plus payout
        #[test]
        fn prop_gross_splits_exactly(
            lines in prop::collection::vec(
                (price_strategy(), 1i32..20, rate_strategy()),
                1..15
            ),
        ) {
            let items: Vec<OrderItem> = lines
                .iter()
                .map(|(price, qty, rate)| OrderItem {
                    product_id: Uuid::new_v4(),
                    variant_id: None,
                    producer_id: Uuid::new_v4(),
                    product_name: "item".to_string(),
                    quantity: *qty,
                    price_at_purchase: *price,
                    commission_rate: (*rate).min(Decimal::from(100)),
                })
                .collect();

            let gross: Decimal = items.iter().map(|i| i.line_total()).sum();
            let commission: Decimal = items.iter().map(|i| i.commission_amount()).sum();
            let net: Decimal = items.iter().map(|i| i.net_amount()).sum();

            prop_assert_eq!(gross, commission + net);
            prop_assert!(commission >= Decimal::ZERO);
            prop_assert!(net >= Decimal::ZERO);
        }
    }
}
