//! Review tests
//!
//! Covers rating bounds and the aggregate recomputation applied to products
//! and producers when reviews are created or deleted.

use rust_decimal::Decimal;
use std::str::FromStr;

use shared::models::rating_aggregate;
use shared::validation::validate_rating;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        for rating in 1..=5 {
            assert!(validate_rating(rating).is_ok());
        }
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
        assert!(validate_rating(-1).is_err());
    }

    #[test]
    fn test_aggregate_empty() {
        let (average, count) = rating_aggregate(&[]);
        assert_eq!(average, Decimal::ZERO);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_aggregate_simple() {
        let (average, count) = rating_aggregate(&[5, 4, 4]);
        assert_eq!(average, dec("4.33"));
        assert_eq!(count, 3);
    }

    #[test]
    fn test_aggregate_single() {
        let (average, count) = rating_aggregate(&[2]);
        assert_eq!(average, dec("2"));
        assert_eq!(count, 1);
    }

    /// Deleting a review means recomputing from the remaining set
    #[test]
    fn test_aggregate_after_removal() {
        let (before, _) = rating_aggregate(&[5, 1]);
        assert_eq!(before, dec("3"));

        let (after, count) = rating_aggregate(&[5]);
        assert_eq!(after, dec("5"));
        assert_eq!(count, 1);
    }

    #[test]
    fn test_aggregate_rounding() {
        // 1 + 2 + 2 = 5 over 3 reviews
        let (average, _) = rating_aggregate(&[1, 2, 2]);
        assert_eq!(average, dec("1.67"));
    }
}
