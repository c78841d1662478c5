//! Stock ledger tests
//!
//! Covers the checked decrement/increment arithmetic, availability flips at
//! the zero boundary, and the variant fallback rules.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::models::{Product, ProductCategory, StockError, Variant, WeightUnit};
use shared::types::{Language, LocalizedText};

fn text(s: &str) -> LocalizedText {
    LocalizedText::from_single(Language::Italian, s)
}

fn simple_product(stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        producer_id: Uuid::new_v4(),
        name: text("Olio extravergine"),
        description: text("Olio della casa"),
        category: ProductCategory::Pantry,
        price: Decimal::new(1250, 2),
        stock,
        has_variants: false,
        variants: vec![],
        images: vec![],
        is_available: stock > 0,
        average_rating: Decimal::ZERO,
        review_count: 0,
        created_at: now,
        updated_at: now,
    }
}

fn variant(stock: i32, is_default: bool) -> Variant {
    Variant {
        id: Uuid::new_v4(),
        name: text("500ml"),
        price: Decimal::new(700, 2),
        compare_at_price: None,
        stock,
        weight: Decimal::from(500),
        weight_unit: WeightUnit::Milliliters,
        is_default,
        is_available: stock > 0,
    }
}

fn variant_product(stocks: &[i32]) -> Product {
    let mut product = simple_product(0);
    product.has_variants = true;
    product.variants = stocks
        .iter()
        .enumerate()
        .map(|(i, &s)| variant(s, i == 0))
        .collect();
    product.is_available = stocks.iter().any(|&s| s > 0);
    product
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Reduce then increase restores both the counter and the flag
    #[test]
    fn test_reduce_increase_round_trip() {
        let mut product = simple_product(5);
        product.reduce_stock(3, None).unwrap();
        assert_eq!(product.stock, 2);
        assert!(product.is_available);

        product.increase_stock(3, None).unwrap();
        assert_eq!(product.stock, 5);
        assert!(product.is_available);
    }

    /// Full depletion flips availability off; restock flips it back
    #[test]
    fn test_round_trip_through_zero() {
        let mut product = simple_product(4);
        product.reduce_stock(4, None).unwrap();
        assert_eq!(product.stock, 0);
        assert!(!product.is_available);

        product.increase_stock(4, None).unwrap();
        assert_eq!(product.stock, 4);
        assert!(product.is_available);
    }

    /// Requesting more than available fails and leaves state untouched
    #[test]
    fn test_insufficient_stock_untouched() {
        let mut product = simple_product(3);
        let err = product.reduce_stock(5, None).unwrap_err();
        assert!(matches!(err, StockError::Insufficient(_)));
        assert_eq!(product.stock, 3);
        assert!(product.is_available);
    }

    #[test]
    fn test_non_positive_quantity_rejected() {
        let mut product = simple_product(3);
        assert_eq!(
            product.reduce_stock(0, None),
            Err(StockError::NonPositiveQuantity)
        );
        assert_eq!(
            product.increase_stock(-1, None),
            Err(StockError::NonPositiveQuantity)
        );
    }

    #[test]
    fn test_has_stock_basic() {
        let product = simple_product(3);
        assert!(product.has_stock(3, None));
        assert!(!product.has_stock(4, None));
        assert!(!product.has_stock(0, None));
    }

    /// An unavailable product reports no stock regardless of the counter
    #[test]
    fn test_has_stock_unavailable() {
        let mut product = simple_product(10);
        product.is_available = false;
        assert!(!product.has_stock(1, None));
    }

    #[test]
    fn test_variant_reduce_flips_variant_only() {
        let mut product = variant_product(&[2, 5]);
        let first = product.variants[0].id;

        product.reduce_stock(2, Some(first)).unwrap();
        assert_eq!(product.variants[0].stock, 0);
        assert!(!product.variants[0].is_available);
        // The second variant still has stock, so the product stays available
        assert!(product.is_available);
    }

    #[test]
    fn test_all_variants_depleted_product_unavailable() {
        let mut product = variant_product(&[1, 1]);
        let (a, b) = (product.variants[0].id, product.variants[1].id);

        product.reduce_stock(1, Some(a)).unwrap();
        product.reduce_stock(1, Some(b)).unwrap();
        assert!(!product.is_available);

        product.increase_stock(1, Some(a)).unwrap();
        assert!(product.is_available);
    }

    #[test]
    fn test_variant_required_for_variant_product() {
        let mut product = variant_product(&[3]);
        assert_eq!(
            product.reduce_stock(1, None),
            Err(StockError::VariantRequired)
        );
    }

    #[test]
    fn test_unknown_variant() {
        let mut product = variant_product(&[3]);
        let unknown = Uuid::new_v4();
        assert_eq!(
            product.reduce_stock(1, Some(unknown)),
            Err(StockError::VariantNotFound)
        );
        assert!(!product.has_stock(1, Some(unknown)));
    }

    /// Total displayed stock sums variants when variants are used
    #[test]
    fn test_total_stock() {
        assert_eq!(simple_product(7).total_stock(), 7);
        assert_eq!(variant_product(&[2, 3, 4]).total_stock(), 9);
    }

    /// Resolving without an explicit variant falls back to the default one
    #[test]
    fn test_resolve_variant_default_fallback() {
        let product = variant_product(&[2, 3]);
        let resolved = product.resolve_variant_id(None).unwrap();
        assert_eq!(resolved, Some(product.variants[0].id));

        let simple = simple_product(2);
        assert_eq!(simple.resolve_variant_id(None).unwrap(), None);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// reduce(q) then increase(q) restores stock and availability
        #[test]
        fn prop_round_trip_restores_state(
            initial in 1i32..1000,
            quantity in 1i32..1000
        ) {
            prop_assume!(quantity <= initial);

            let mut product = simple_product(initial);
            let available_before = product.is_available;

            product.reduce_stock(quantity, None).unwrap();
            product.increase_stock(quantity, None).unwrap();

            prop_assert_eq!(product.stock, initial);
            prop_assert_eq!(product.is_available, available_before);
        }

        /// A failed decrement never changes the counter
        #[test]
        fn prop_insufficient_leaves_stock(
            initial in 0i32..100,
            extra in 1i32..100
        ) {
            let mut product = simple_product(initial);
            let result = product.reduce_stock(initial + extra, None);

            prop_assert!(result.is_err());
            prop_assert_eq!(product.stock, initial);
        }

        /// Stock never goes negative through any reduce sequence
        #[test]
        fn prop_stock_never_negative(
            initial in 0i32..50,
            requests in prop::collection::vec(1i32..20, 1..10)
        ) {
            let mut product = simple_product(initial);
            for q in requests {
                let _ = product.reduce_stock(q, None);
                prop_assert!(product.stock >= 0);
            }
        }

        /// Availability tracks the zero boundary on the base counter
        #[test]
        fn prop_availability_matches_zero_boundary(
            initial in 1i32..100,
            quantity in 1i32..100
        ) {
            prop_assume!(quantity <= initial);

            let mut product = simple_product(initial);
            product.reduce_stock(quantity, None).unwrap();

            if product.stock == 0 {
                prop_assert!(!product.is_available);
            } else {
                prop_assert!(product.is_available);
            }
        }

        /// has_stock agrees with what reduce_stock will accept
        #[test]
        fn prop_has_stock_consistent_with_reduce(
            initial in 0i32..100,
            quantity in 1i32..100
        ) {
            let product = simple_product(initial);
            let mut copy = product.clone();

            let check = product.has_stock(quantity, None);
            let reduced = copy.reduce_stock(quantity, None).is_ok();

            // has_stock also gates on availability, which reduce does not;
            // for a consistent product (available == stock > 0) they agree
            if product.is_available || initial == 0 {
                prop_assert_eq!(check, reduced);
            }
        }
    }
}
