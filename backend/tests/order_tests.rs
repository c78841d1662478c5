//! Order aggregate tests
//!
//! Covers the totals invariant (total = subtotal + shipping - discount),
//! snapshot arithmetic, payment-method branching, the fulfilment state
//! machine and order number generation.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use shared::models::{
    generate_order_number, OrderItem, OrderStatus, OrderTotals, PaymentMethod,
};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn item(price: &str, quantity: i32, commission_rate: &str) -> OrderItem {
    OrderItem {
        product_id: Uuid::new_v4(),
        variant_id: None,
        producer_id: Uuid::new_v4(),
        product_name: "Pecorino stagionato".to_string(),
        quantity,
        price_at_purchase: dec(price),
        commission_rate: dec(commission_rate),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// total = subtotal + shipping - discount
    #[test]
    fn test_totals_invariant() {
        let items = vec![item("10.00", 2, "15"), item("4.50", 1, "15")];
        let totals = OrderTotals::compute(&items, dec("3.00"), dec("2.00"));

        assert_eq!(totals.subtotal, dec("24.50"));
        assert_eq!(totals.total, dec("25.50"));
        assert_eq!(
            totals.total,
            totals.subtotal + totals.shipping_cost - totals.discount
        );
    }

    /// The cash-on-delivery scenario: 2 x 10.00 plus 3.00 shipping
    #[test]
    fn test_cod_order_totals() {
        let items = vec![item("10.00", 2, "15")];
        let totals = OrderTotals::compute(&items, dec("3.00"), Decimal::ZERO);

        assert_eq!(totals.subtotal, dec("20.00"));
        assert_eq!(totals.total, dec("23.00"));
        assert_eq!(
            PaymentMethod::CashOnDelivery.initial_order_status(),
            OrderStatus::Confirmed
        );
    }

    /// Card and bank transfer orders start pending
    #[test]
    fn test_deferred_methods_start_pending() {
        assert_eq!(
            PaymentMethod::Card.initial_order_status(),
            OrderStatus::Pending
        );
        assert_eq!(
            PaymentMethod::BankTransfer.initial_order_status(),
            OrderStatus::Pending
        );
        assert!(!PaymentMethod::Card.confirms_at_creation());
        assert!(PaymentMethod::CashOnDelivery.confirms_at_creation());
    }

    /// Only card payments go through the checkout provider
    #[test]
    fn test_provider_collection() {
        assert!(PaymentMethod::Card.collects_via_provider());
        assert!(!PaymentMethod::BankTransfer.collects_via_provider());
        assert!(!PaymentMethod::CashOnDelivery.collects_via_provider());
    }

    /// Line snapshot arithmetic
    #[test]
    fn test_item_amounts() {
        let line = item("10.00", 2, "15");
        assert_eq!(line.line_total(), dec("20.00"));
        assert_eq!(line.commission_amount(), dec("3.00"));
        assert_eq!(line.net_amount(), dec("17.00"));
    }

    /// Catalog edits after creation cannot touch an existing snapshot
    #[test]
    fn test_snapshot_is_immutable() {
        let line = item("10.00", 3, "12");
        let totals = OrderTotals::compute(
            std::slice::from_ref(&line),
            dec("3.00"),
            Decimal::ZERO,
        );

        // A later "price change" is a different catalog value; the stored
        // snapshot keeps producing the same numbers
        let new_catalog_price = dec("99.99");
        assert_ne!(line.price_at_purchase, new_catalog_price);
        assert_eq!(totals.total, dec("33.00"));
        assert_eq!(line.line_total(), dec("30.00"));
    }

    #[test]
    fn test_order_number_format() {
        let number = generate_order_number(Utc::now());
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "MKT");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_order_numbers_are_distinct() {
        let now = Utc::now();
        let a = generate_order_number(now);
        let b = generate_order_number(now);
        assert_ne!(a, b);
    }

    /// Forward chain transitions are allowed
    #[test]
    fn test_valid_status_transitions() {
        use OrderStatus::*;
        let valid = [
            (Pending, Confirmed),
            (Confirmed, Preparing),
            (Preparing, Shipped),
            (Shipped, Delivered),
            (Pending, Cancelled),
            (Confirmed, Cancelled),
            (Preparing, Cancelled),
        ];
        for (from, to) in valid {
            assert!(from.can_transition_to(to), "{} -> {}", from, to);
        }
    }

    /// Skips, reversals and exits from terminal states are rejected
    #[test]
    fn test_invalid_status_transitions() {
        use OrderStatus::*;
        let invalid = [
            (Pending, Preparing),  // Skip confirmation
            (Pending, Shipped),    // Skip stages
            (Confirmed, Pending),  // Backward
            (Shipped, Cancelled),  // Too late to cancel
            (Delivered, Cancelled),
            (Cancelled, Confirmed),
            (Delivered, Shipped),
        ];
        for (from, to) in invalid {
            assert!(!from.can_transition_to(to), "{} -> {}", from, to);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Confirmed.is_terminal());
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn price_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=100_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    fn rate_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=10_000i64).prop_map(|n| Decimal::new(n, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// The totals invariant holds for arbitrary carts
        #[test]
        fn prop_totals_invariant(
            lines in prop::collection::vec((price_strategy(), 1i32..20), 1..10),
            shipping in price_strategy(),
        ) {
            let items: Vec<OrderItem> = lines
                .iter()
                .map(|(price, qty)| OrderItem {
                    product_id: Uuid::new_v4(),
                    variant_id: None,
                    producer_id: Uuid::new_v4(),
                    product_name: "item".to_string(),
                    quantity: *qty,
                    price_at_purchase: *price,
                    commission_rate: Decimal::from(15),
                })
                .collect();

            let subtotal: Decimal = items.iter().map(|i| i.line_total()).sum();
            // Any discount the coupon rules can produce is within the subtotal
            let discount = subtotal / Decimal::from(2);
            let totals = OrderTotals::compute(&items, shipping, discount);

            prop_assert_eq!(totals.subtotal, subtotal);
            prop_assert_eq!(totals.total, subtotal + shipping - discount);
        }

        /// Commission never exceeds the line total for rates up to 100%
        #[test]
        fn prop_commission_bounded(
            price in price_strategy(),
            quantity in 1i32..50,
            rate in rate_strategy(),
        ) {
            prop_assume!(rate <= Decimal::from(100));

            let line = OrderItem {
                product_id: Uuid::new_v4(),
                variant_id: None,
                producer_id: Uuid::new_v4(),
                product_name: "item".to_string(),
                quantity,
                price_at_purchase: price,
                commission_rate: rate,
            };

            prop_assert!(line.commission_amount() >= Decimal::ZERO);
            prop_assert!(line.commission_amount() <= line.line_total());
            prop_assert_eq!(
                line.net_amount() + line.commission_amount(),
                line.line_total()
            );
        }

        /// Status can never leave a terminal state
        #[test]
        fn prop_terminal_states_absorb(to_idx in 0usize..6) {
            let all = [
                OrderStatus::Pending,
                OrderStatus::Confirmed,
                OrderStatus::Preparing,
                OrderStatus::Shipped,
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
            ];
            let target = all[to_idx];

            prop_assert!(!OrderStatus::Delivered.can_transition_to(target));
            prop_assert!(!OrderStatus::Cancelled.can_transition_to(target));
        }
    }
}
