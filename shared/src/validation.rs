//! Validation utilities for the Mercato Marketplace Platform

use rust_decimal::Decimal;

use crate::models::review::{RATING_MAX, RATING_MIN};

// ============================================================================
// General Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    if email.contains('@') && email.contains('.') && email.len() >= 5 {
        Ok(())
    } else {
        Err("Invalid email format")
    }
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters");
    }
    Ok(())
}

// ============================================================================
// Marketplace Validations
// ============================================================================

/// Validate a monetary amount (non-negative, at most 2 decimal places)
pub fn validate_amount(amount: Decimal) -> Result<(), &'static str> {
    if amount < Decimal::ZERO {
        return Err("Amount cannot be negative");
    }
    if amount.scale() > 2 {
        return Err("Amount cannot have more than 2 decimal places");
    }
    Ok(())
}

/// Validate an order line quantity
pub fn validate_quantity(quantity: i32) -> Result<(), &'static str> {
    if quantity <= 0 {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a review rating (1-5 inclusive)
pub fn validate_rating(rating: i32) -> Result<(), &'static str> {
    if !(RATING_MIN..=RATING_MAX).contains(&rating) {
        return Err("Rating must be between 1 and 5");
    }
    Ok(())
}

/// Validate a commission rate percentage (0-100)
pub fn validate_commission_rate(rate: Decimal) -> Result<(), &'static str> {
    if rate < Decimal::ZERO || rate > Decimal::from(100) {
        return Err("Commission rate must be between 0 and 100");
    }
    Ok(())
}

/// Validate coupon code format (4-20 uppercase alphanumeric)
pub fn validate_coupon_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 4 {
        return Err("Coupon code must be at least 4 characters");
    }
    if code.len() > 20 {
        return Err("Coupon code must be at most 20 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err("Coupon code must be uppercase alphanumeric only");
    }
    Ok(())
}

/// Validate a business name
pub fn validate_business_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.len() < 2 {
        return Err("Business name must be at least 2 characters");
    }
    if trimmed.len() > 120 {
        return Err("Business name must be at most 120 characters");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_validate_email_valid() {
        assert!(validate_email("test@example.com").is_ok());
        assert!(validate_email("user.name@domain.co.it").is_ok());
    }

    #[test]
    fn test_validate_email_invalid() {
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("no@domain").is_err());
        assert!(validate_email("@.").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("password123").is_ok());
        assert!(validate_password("12345678").is_ok());
        assert!(validate_password("short").is_err());
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec("10.50")).is_ok());
        assert!(validate_amount(Decimal::ZERO).is_ok());
        assert!(validate_amount(dec("-0.01")).is_err());
        assert!(validate_amount(dec("1.999")).is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(100).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
    }

    #[test]
    fn test_validate_rating() {
        assert!(validate_rating(1).is_ok());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_validate_commission_rate() {
        assert!(validate_commission_rate(Decimal::ZERO).is_ok());
        assert!(validate_commission_rate(dec("15")).is_ok());
        assert!(validate_commission_rate(dec("100")).is_ok());
        assert!(validate_commission_rate(dec("-1")).is_err());
        assert!(validate_commission_rate(dec("100.5")).is_err());
    }

    #[test]
    fn test_validate_coupon_code_valid() {
        assert!(validate_coupon_code("SUMMER10").is_ok());
        assert!(validate_coupon_code("WELCOME").is_ok());
        assert!(validate_coupon_code("A1B2").is_ok());
    }

    #[test]
    fn test_validate_coupon_code_invalid() {
        assert!(validate_coupon_code("AB1").is_err()); // Too short
        assert!(validate_coupon_code("ABCDEFGHIJKLMNOPQRSTU").is_err()); // Too long
        assert!(validate_coupon_code("summer10").is_err()); // Lowercase
        assert!(validate_coupon_code("SUMMER-10").is_err()); // Special char
    }

    #[test]
    fn test_validate_business_name() {
        assert!(validate_business_name("Azienda Agricola Rossi").is_ok());
        assert!(validate_business_name("X").is_err());
        assert!(validate_business_name(&"a".repeat(121)).is_err());
    }
}
