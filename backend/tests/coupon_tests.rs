//! Coupon tests
//!
//! Covers discount computation with clamping, validity windows, minimum
//! order amounts and usage caps.

use chrono::{Duration, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{Coupon, CouponError, DiscountType};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn coupon(discount_type: DiscountType, value: &str) -> Coupon {
    let now = Utc::now();
    Coupon {
        id: Uuid::new_v4(),
        code: "SUMMER10".to_string(),
        discount_type,
        discount_value: dec(value),
        min_order_amount: Decimal::ZERO,
        max_discount_amount: None,
        first_order_only: false,
        valid_from: now - Duration::days(1),
        valid_until: now + Duration::days(30),
        max_uses: None,
        max_uses_per_user: None,
        times_used: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// 10% of 100 capped at 5 yields 5, not 10
    #[test]
    fn test_percentage_discount_capped() {
        let mut c = coupon(DiscountType::Percentage, "10");
        c.max_discount_amount = Some(dec("5"));

        assert_eq!(c.calculate_discount(dec("100")), dec("5"));
    }

    #[test]
    fn test_percentage_discount_uncapped() {
        let c = coupon(DiscountType::Percentage, "10");
        assert_eq!(c.calculate_discount(dec("80")), dec("8"));
    }

    /// A fixed discount larger than the subtotal clamps to the subtotal
    #[test]
    fn test_fixed_discount_clamped_to_subtotal() {
        let c = coupon(DiscountType::Fixed, "25");
        assert_eq!(c.calculate_discount(dec("18.50")), dec("18.50"));
        assert_eq!(c.calculate_discount(dec("30")), dec("25"));
    }

    #[test]
    fn test_discount_on_zero_subtotal() {
        let c = coupon(DiscountType::Fixed, "5");
        assert_eq!(c.calculate_discount(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_inactive_coupon_rejected() {
        let mut c = coupon(DiscountType::Fixed, "5");
        c.is_active = false;
        assert_eq!(
            c.check_valid(Utc::now(), dec("50"), 0, false),
            Err(CouponError::NotActive)
        );
    }

    #[test]
    fn test_validity_window() {
        let c = coupon(DiscountType::Fixed, "5");

        let too_early = c.valid_from - Duration::hours(1);
        assert_eq!(
            c.check_valid(too_early, dec("50"), 0, false),
            Err(CouponError::NotStarted)
        );

        let too_late = c.valid_until + Duration::hours(1);
        assert_eq!(
            c.check_valid(too_late, dec("50"), 0, false),
            Err(CouponError::Expired)
        );

        assert!(c.check_valid(Utc::now(), dec("50"), 0, false).is_ok());
    }

    #[test]
    fn test_min_order_amount() {
        let mut c = coupon(DiscountType::Percentage, "10");
        c.min_order_amount = dec("30");

        assert_eq!(
            c.check_valid(Utc::now(), dec("29.99"), 0, false),
            Err(CouponError::MinOrderNotMet(dec("30")))
        );
        assert!(c.check_valid(Utc::now(), dec("30"), 0, false).is_ok());
    }

    #[test]
    fn test_global_usage_cap() {
        let mut c = coupon(DiscountType::Fixed, "5");
        c.max_uses = Some(100);
        c.times_used = 100;

        assert_eq!(
            c.check_valid(Utc::now(), dec("50"), 0, false),
            Err(CouponError::UsageLimitReached)
        );
    }

    #[test]
    fn test_per_user_usage_cap() {
        let mut c = coupon(DiscountType::Fixed, "5");
        c.max_uses_per_user = Some(2);

        assert!(c.check_valid(Utc::now(), dec("50"), 1, false).is_ok());
        assert_eq!(
            c.check_valid(Utc::now(), dec("50"), 2, false),
            Err(CouponError::UserLimitReached)
        );
    }

    #[test]
    fn test_first_order_only() {
        let mut c = coupon(DiscountType::Fixed, "5");
        c.first_order_only = true;

        assert!(c.check_valid(Utc::now(), dec("50"), 0, true).is_ok());
        assert_eq!(
            c.check_valid(Utc::now(), dec("50"), 0, false),
            Err(CouponError::FirstOrderOnly)
        );
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn amount_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=1_000_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn percent_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100i64).prop_map(Decimal::from)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Discounts are always within [0, subtotal]
        #[test]
        fn prop_discount_clamped_to_subtotal(
            subtotal in amount_strategy(),
            value in amount_strategy(),
            fixed in proptest::bool::ANY,
        ) {
            let c = coupon(
                if fixed { DiscountType::Fixed } else { DiscountType::Percentage },
                "1",
            );
            let mut c = c;
            c.discount_value = if fixed { value } else { value.min(Decimal::from(100)) };

            let discount = c.calculate_discount(subtotal);
            prop_assert!(discount >= Decimal::ZERO);
            prop_assert!(discount <= subtotal);
        }

        /// The cap bounds the discount whenever it is set
        #[test]
        fn prop_discount_respects_cap(
            subtotal in amount_strategy(),
            percent in percent_strategy(),
            cap in amount_strategy(),
        ) {
            let mut c = coupon(DiscountType::Percentage, "1");
            c.discount_value = percent;
            c.max_discount_amount = Some(cap);

            let discount = c.calculate_discount(subtotal);
            prop_assert!(discount <= cap.max(Decimal::ZERO) || discount == Decimal::ZERO);
            prop_assert!(discount <= subtotal);
        }

        /// A percentage discount of p% never exceeds p% of the subtotal
        #[test]
        fn prop_percentage_is_proportional(
            subtotal in amount_strategy(),
            percent in percent_strategy(),
        ) {
            let mut c = coupon(DiscountType::Percentage, "1");
            c.discount_value = percent;

            let discount = c.calculate_discount(subtotal);
            prop_assert_eq!(discount, subtotal * percent / Decimal::from(100));
        }
    }
}
