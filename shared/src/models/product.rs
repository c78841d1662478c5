//! Product catalog models and stock ledger arithmetic
//!
//! The stock methods here define the ledger semantics (checked decrement,
//! availability flips at the zero boundary). The API server enforces the
//! same rules with atomic conditional updates when persisting.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Language, LocalizedText};

/// A product sold by a producer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub producer_id: Uuid,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub category: ProductCategory,
    /// Unit price used when the product has no variants
    pub price: Decimal,
    /// Stock counter used when the product has no variants
    pub stock: i32,
    pub has_variants: bool,
    /// Ordered variant list; the relevant stock counters when `has_variants`
    pub variants: Vec<Variant>,
    pub images: Vec<ProductImage>,
    pub is_available: bool,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Produce,
    Dairy,
    Bakery,
    Meat,
    Seafood,
    Pantry,
    Beverages,
    Sweets,
    Other,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Produce => "produce",
            ProductCategory::Dairy => "dairy",
            ProductCategory::Bakery => "bakery",
            ProductCategory::Meat => "meat",
            ProductCategory::Seafood => "seafood",
            ProductCategory::Pantry => "pantry",
            ProductCategory::Beverages => "beverages",
            ProductCategory::Sweets => "sweets",
            ProductCategory::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "produce" => Some(ProductCategory::Produce),
            "dairy" => Some(ProductCategory::Dairy),
            "bakery" => Some(ProductCategory::Bakery),
            "meat" => Some(ProductCategory::Meat),
            "seafood" => Some(ProductCategory::Seafood),
            "pantry" => Some(ProductCategory::Pantry),
            "beverages" => Some(ProductCategory::Beverages),
            "sweets" => Some(ProductCategory::Sweets),
            "other" => Some(ProductCategory::Other),
            _ => None,
        }
    }
}

/// A purchasable variant of a product (size, weight, packaging)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub name: LocalizedText,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub weight: Decimal,
    pub weight_unit: WeightUnit,
    pub is_default: bool,
    pub is_available: bool,
}

/// Unit of measure for a variant's weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    Grams,
    Kilograms,
    Milliliters,
    Liters,
    Pieces,
}

impl WeightUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightUnit::Grams => "grams",
            WeightUnit::Kilograms => "kilograms",
            WeightUnit::Milliliters => "milliliters",
            WeightUnit::Liters => "liters",
            WeightUnit::Pieces => "pieces",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "grams" => Some(WeightUnit::Grams),
            "kilograms" => Some(WeightUnit::Kilograms),
            "milliliters" => Some(WeightUnit::Milliliters),
            "liters" => Some(WeightUnit::Liters),
            "pieces" => Some(WeightUnit::Pieces),
            _ => None,
        }
    }
}

/// Reference to an image stored on the CDN
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImage {
    pub url: String,
    pub public_id: String,
}

/// Stock ledger errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StockError {
    #[error("insufficient stock for {0}")]
    Insufficient(String),

    #[error("product variant not found")]
    VariantNotFound,

    #[error("a variant must be specified for this product")]
    VariantRequired,

    #[error("quantity must be positive")]
    NonPositiveQuantity,
}

impl Product {
    /// Total displayed stock: sum of variant stocks when variants are used,
    /// else the base counter.
    pub fn total_stock(&self) -> i32 {
        if self.has_variants {
            self.variants.iter().map(|v| v.stock).sum()
        } else {
            self.stock
        }
    }

    pub fn variant(&self, variant_id: Uuid) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    /// The default variant among available ones
    pub fn default_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.is_default && v.is_available)
            .or_else(|| self.variants.iter().find(|v| v.is_available))
    }

    /// Resolve the variant to order against: the requested one, or the
    /// default variant when the product uses variants and none was named.
    pub fn resolve_variant_id(&self, requested: Option<Uuid>) -> Result<Option<Uuid>, StockError> {
        match (self.has_variants, requested) {
            (false, _) => Ok(None),
            (true, Some(id)) => {
                if self.variant(id).is_some() {
                    Ok(Some(id))
                } else {
                    Err(StockError::VariantNotFound)
                }
            }
            (true, None) => self
                .default_variant()
                .map(|v| Some(v.id))
                .ok_or(StockError::VariantRequired),
        }
    }

    /// Current catalog unit price for the relevant counter
    pub fn unit_price(&self, variant_id: Option<Uuid>) -> Result<Decimal, StockError> {
        match variant_id {
            Some(id) => self
                .variant(id)
                .map(|v| v.price)
                .ok_or(StockError::VariantNotFound),
            None => Ok(self.price),
        }
    }

    pub fn display_name(&self, language: Language) -> &str {
        self.name.resolve(language)
    }

    /// Read-only stock check against the relevant counter. Returns false
    /// when the product (or the named variant) is unavailable.
    pub fn has_stock(&self, quantity: i32, variant_id: Option<Uuid>) -> bool {
        if quantity <= 0 || !self.is_available {
            return false;
        }
        match variant_id {
            Some(id) => match self.variant(id) {
                Some(v) => v.is_available && v.stock >= quantity,
                None => false,
            },
            None => {
                if self.has_variants {
                    match self.default_variant() {
                        Some(v) => v.stock >= quantity,
                        None => false,
                    }
                } else {
                    self.stock >= quantity
                }
            }
        }
    }

    /// Decrement the relevant counter. Fails when the requested quantity
    /// exceeds current stock; flips availability off when stock hits zero.
    pub fn reduce_stock(
        &mut self,
        quantity: i32,
        variant_id: Option<Uuid>,
    ) -> Result<(), StockError> {
        if quantity <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        match variant_id {
            Some(id) => {
                let name = self.name.resolve(Language::Italian).to_string();
                let variant = self
                    .variants
                    .iter_mut()
                    .find(|v| v.id == id)
                    .ok_or(StockError::VariantNotFound)?;
                if variant.stock < quantity {
                    return Err(StockError::Insufficient(name));
                }
                variant.stock -= quantity;
                if variant.stock == 0 {
                    variant.is_available = false;
                }
                self.refresh_availability();
            }
            None => {
                if self.has_variants {
                    return Err(StockError::VariantRequired);
                }
                if self.stock < quantity {
                    return Err(StockError::Insufficient(
                        self.name.resolve(Language::Italian).to_string(),
                    ));
                }
                self.stock -= quantity;
                if self.stock == 0 {
                    self.is_available = false;
                }
            }
        }
        Ok(())
    }

    /// Increment the relevant counter (refund path); flips availability back
    /// on when stock becomes positive from zero.
    pub fn increase_stock(
        &mut self,
        quantity: i32,
        variant_id: Option<Uuid>,
    ) -> Result<(), StockError> {
        if quantity <= 0 {
            return Err(StockError::NonPositiveQuantity);
        }
        match variant_id {
            Some(id) => {
                let variant = self
                    .variants
                    .iter_mut()
                    .find(|v| v.id == id)
                    .ok_or(StockError::VariantNotFound)?;
                let was_empty = variant.stock == 0;
                variant.stock += quantity;
                if was_empty {
                    variant.is_available = true;
                }
                self.refresh_availability();
            }
            None => {
                if self.has_variants {
                    return Err(StockError::VariantRequired);
                }
                let was_empty = self.stock == 0;
                self.stock += quantity;
                if was_empty {
                    self.is_available = true;
                }
            }
        }
        Ok(())
    }

    /// Derived product availability when variants are used: available while
    /// any variant still is.
    fn refresh_availability(&mut self) {
        if self.has_variants {
            self.is_available = self.variants.iter().any(|v| v.is_available && v.stock > 0);
        }
    }
}

/// Check the default-variant invariant: when variants are used and any of
/// them is available, exactly one available variant is marked default.
pub fn validate_variants(variants: &[Variant]) -> Result<(), &'static str> {
    if variants.is_empty() {
        return Err("A product with variants must have at least one variant");
    }
    let available_defaults = variants
        .iter()
        .filter(|v| v.is_default && v.is_available)
        .count();
    let any_available = variants.iter().any(|v| v.is_available);
    if any_available && available_defaults != 1 {
        return Err("Exactly one available variant must be marked as default");
    }
    Ok(())
}
