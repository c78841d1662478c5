//! Product catalog service and the persisted stock ledger
//!
//! Stock mutations are atomic conditional updates: a decrement only happens
//! where the current counter still covers the requested quantity, and a
//! zero-row result means insufficient stock. No read-then-write.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::CdnClient;
use shared::models::{
    validate_variants, Product, ProductCategory, ProductImage, Variant, WeightUnit,
};
use shared::types::{LocalizedText, PaginatedResponse, Pagination, PaginationMeta};
use shared::validation::validate_amount;

/// Product service for catalog management and stock movements
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
    cdn: Option<CdnClient>,
}

/// Product row as stored
#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    producer_id: Uuid,
    name: Json<LocalizedText>,
    description: Json<LocalizedText>,
    category: String,
    price: Decimal,
    stock: i32,
    has_variants: bool,
    images: Json<Vec<ProductImage>>,
    is_available: bool,
    average_rating: Decimal,
    review_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Variant row as stored
#[derive(Debug, FromRow)]
struct VariantRow {
    id: Uuid,
    name: Json<LocalizedText>,
    price: Decimal,
    compare_at_price: Option<Decimal>,
    stock: i32,
    weight: Decimal,
    weight_unit: String,
    is_default: bool,
    is_available: bool,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub category: ProductCategory,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub variants: Vec<VariantInput>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
}

/// Input for one variant
#[derive(Debug, Deserialize)]
pub struct VariantInput {
    pub name: LocalizedText,
    pub price: Decimal,
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    pub weight: Decimal,
    pub weight_unit: WeightUnit,
    #[serde(default)]
    pub is_default: bool,
}

/// Input for updating a product
#[derive(Debug, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<LocalizedText>,
    pub description: Option<LocalizedText>,
    pub category: Option<ProductCategory>,
    pub price: Option<Decimal>,
    pub stock: Option<i32>,
    pub is_available: Option<bool>,
    /// When present, replaces the whole variant list
    pub variants: Option<Vec<VariantInput>>,
    pub images: Option<Vec<ProductImage>>,
}

/// Catalog listing filter
#[derive(Debug, Deserialize)]
pub struct ProductFilter {
    pub category: Option<ProductCategory>,
    pub producer_id: Option<Uuid>,
    #[serde(default)]
    pub include_unavailable: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool, cdn: Option<CdnClient>) -> Self {
        Self { db, cdn }
    }

    /// Create a product for an approved producer
    pub async fn create(
        &self,
        producer_id: Uuid,
        input: CreateProductInput,
    ) -> AppResult<Product> {
        if input.name.is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Product name is required".to_string(),
            });
        }
        validate_amount(input.price).map_err(|e| AppError::Validation {
            field: "price".to_string(),
            message: e.to_string(),
        })?;
        if input.stock < 0 {
            return Err(AppError::Validation {
                field: "stock".to_string(),
                message: "Stock cannot be negative".to_string(),
            });
        }

        let has_variants = !input.variants.is_empty();
        if has_variants {
            let candidate: Vec<Variant> = input
                .variants
                .iter()
                .map(|v| variant_from_input(Uuid::new_v4(), v))
                .collect();
            validate_variants(&candidate).map_err(|e| AppError::Validation {
                field: "variants".to_string(),
                message: e.to_string(),
            })?;
        }

        let is_available = if has_variants {
            input.variants.iter().any(|v| v.stock > 0)
        } else {
            input.stock > 0
        };

        let mut tx = self.db.begin().await?;

        let product_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO products (
                producer_id, name, description, category, price, stock,
                has_variants, images, is_available
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(producer_id)
        .bind(Json(&input.name))
        .bind(Json(&input.description))
        .bind(input.category.as_str())
        .bind(input.price)
        .bind(input.stock)
        .bind(has_variants)
        .bind(Json(&input.images))
        .bind(is_available)
        .fetch_one(&mut *tx)
        .await?;

        for (position, variant) in input.variants.iter().enumerate() {
            insert_variant(&mut tx, product_id, position as i32, variant).await?;
        }

        tx.commit().await?;

        self.get(product_id).await
    }

    /// Fetch one product with its variants
    pub async fn get(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, producer_id, name, description, category, price, stock,
                   has_variants, images, is_available, average_rating,
                   review_count, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let variants = self.load_variants(product_id).await?;
        product_from_rows(row, variants)
    }

    /// List products with category/producer filters
    pub async fn list(&self, filter: ProductFilter) -> AppResult<PaginatedResponse<Product>> {
        let pagination = Pagination {
            page: filter.page.unwrap_or(1),
            per_page: filter.per_page.unwrap_or(20),
        };
        let category = filter.category.map(|c| c.as_str().to_string());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM products
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::uuid IS NULL OR producer_id = $2)
              AND ($3 OR is_available)
            "#,
        )
        .bind(&category)
        .bind(filter.producer_id)
        .bind(filter.include_unavailable)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, producer_id, name, description, category, price, stock,
                   has_variants, images, is_available, average_rating,
                   review_count, created_at, updated_at
            FROM products
            WHERE ($1::text IS NULL OR category = $1)
              AND ($2::uuid IS NULL OR producer_id = $2)
              AND ($3 OR is_available)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(&category)
        .bind(filter.producer_id)
        .bind(filter.include_unavailable)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let variants = self.load_variants(row.id).await?;
            products.push(product_from_rows(row, variants)?);
        }

        Ok(PaginatedResponse {
            pagination: PaginationMeta::new(&pagination, total as u64),
            data: products,
        })
    }

    /// Update a product owned by the given producer
    pub async fn update(
        &self,
        producer_id: Uuid,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let current = self.get(product_id).await?;
        if current.producer_id != producer_id {
            return Err(AppError::Forbidden(
                "You can only edit your own products".to_string(),
            ));
        }

        if let Some(price) = input.price {
            validate_amount(price).map_err(|e| AppError::Validation {
                field: "price".to_string(),
                message: e.to_string(),
            })?;
        }
        if matches!(input.stock, Some(s) if s < 0) {
            return Err(AppError::Validation {
                field: "stock".to_string(),
                message: "Stock cannot be negative".to_string(),
            });
        }

        let name = input.name.unwrap_or(current.name);
        let description = input.description.unwrap_or(current.description);
        let category = input.category.unwrap_or(current.category);
        let price = input.price.unwrap_or(current.price);
        let stock = input.stock.unwrap_or(current.stock);
        let images = input.images.unwrap_or(current.images);
        // A replaced variant list re-derives availability from its stocks
        let is_available = match &input.variants {
            Some(variants) if !variants.is_empty() => variants.iter().any(|v| v.stock > 0),
            _ => input.is_available.unwrap_or(current.is_available),
        };

        let mut tx = self.db.begin().await?;

        if let Some(variants) = &input.variants {
            let candidate: Vec<Variant> = variants
                .iter()
                .map(|v| variant_from_input(Uuid::new_v4(), v))
                .collect();
            if !candidate.is_empty() {
                validate_variants(&candidate).map_err(|e| AppError::Validation {
                    field: "variants".to_string(),
                    message: e.to_string(),
                })?;
            }

            sqlx::query("DELETE FROM product_variants WHERE product_id = $1")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
            for (position, variant) in variants.iter().enumerate() {
                insert_variant(&mut tx, product_id, position as i32, variant).await?;
            }
        }

        let has_variants = match &input.variants {
            Some(variants) => !variants.is_empty(),
            None => current.has_variants,
        };

        sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, category = $4, price = $5,
                stock = $6, has_variants = $7, images = $8, is_available = $9,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .bind(Json(&name))
        .bind(Json(&description))
        .bind(category.as_str())
        .bind(price)
        .bind(stock)
        .bind(has_variants)
        .bind(Json(&images))
        .bind(is_available)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        self.get(product_id).await
    }

    /// Soft-remove a product from the catalog
    pub async fn soft_delete(&self, producer_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE products SET is_available = false, updated_at = NOW()
             WHERE id = $1 AND producer_id = $2",
        )
        .bind(product_id)
        .bind(producer_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }
        Ok(())
    }

    /// Hard-delete a product and clean up its CDN images (best-effort)
    pub async fn hard_delete(&self, producer_id: Uuid, product_id: Uuid) -> AppResult<()> {
        let product = self.get(product_id).await?;
        if product.producer_id != producer_id {
            return Err(AppError::Forbidden(
                "You can only delete your own products".to_string(),
            ));
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.db)
            .await?;

        if let Some(cdn) = &self.cdn {
            for image in &product.images {
                if let Err(e) = cdn.delete_image(&image.public_id).await {
                    tracing::warn!(
                        "Failed to delete CDN image {}: {}",
                        image.public_id,
                        e
                    );
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Stock ledger
    // ========================================================================

    /// Read-only stock check against the relevant counter
    pub async fn has_stock(
        &self,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> AppResult<bool> {
        let product = self.get(product_id).await?;
        Ok(product.has_stock(quantity, variant_id))
    }

    /// Atomically decrement stock; fails with insufficient stock when the
    /// conditional update matches no row.
    pub async fn reduce_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        product_name: &str,
    ) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
            });
        }

        match variant_id {
            Some(variant_id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE product_variants
                    SET stock = stock - $3,
                        is_available = CASE WHEN stock - $3 <= 0 THEN false ELSE is_available END
                    WHERE id = $1 AND product_id = $2 AND stock >= $3
                    "#,
                )
                .bind(variant_id)
                .bind(product_id)
                .bind(quantity)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::InsufficientStock(product_name.to_string()));
                }
                self.refresh_derived_availability(tx, product_id).await?;
            }
            None => {
                let result = sqlx::query(
                    r#"
                    UPDATE products
                    SET stock = stock - $2,
                        is_available = CASE WHEN stock - $2 <= 0 THEN false ELSE is_available END,
                        updated_at = NOW()
                    WHERE id = $1 AND has_variants = false AND stock >= $2
                    "#,
                )
                .bind(product_id)
                .bind(quantity)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::InsufficientStock(product_name.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Decrement stock for an already-paid sale. When the counter no longer
    /// covers the quantity (the pending window had no reservation), it is
    /// clamped to zero and the oversell is logged for manual resolution.
    pub async fn reduce_stock_clamped(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
        product_name: &str,
    ) -> AppResult<()> {
        match self
            .reduce_stock(tx, product_id, variant_id, quantity, product_name)
            .await
        {
            Err(AppError::InsufficientStock(_)) => {
                tracing::error!(
                    "Oversell on paid order: product {} ({}) short of {} units; clamping stock to zero",
                    product_name,
                    product_id,
                    quantity
                );
                match variant_id {
                    Some(variant_id) => {
                        sqlx::query(
                            "UPDATE product_variants SET stock = 0, is_available = false
                             WHERE id = $1 AND product_id = $2",
                        )
                        .bind(variant_id)
                        .bind(product_id)
                        .execute(&mut **tx)
                        .await?;
                        self.refresh_derived_availability(tx, product_id).await?;
                    }
                    None => {
                        sqlx::query(
                            "UPDATE products SET stock = 0, is_available = false, updated_at = NOW()
                             WHERE id = $1 AND has_variants = false",
                        )
                        .bind(product_id)
                        .execute(&mut **tx)
                        .await?;
                    }
                }
                Ok(())
            }
            other => other,
        }
    }

    /// Atomically increment stock (refund path); availability comes back
    /// when the counter leaves zero.
    pub async fn increase_stock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        quantity: i32,
    ) -> AppResult<()> {
        if quantity <= 0 {
            return Err(AppError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be positive".to_string(),
            });
        }

        match variant_id {
            Some(variant_id) => {
                let result = sqlx::query(
                    r#"
                    UPDATE product_variants
                    SET stock = stock + $3,
                        is_available = CASE WHEN stock = 0 THEN true ELSE is_available END
                    WHERE id = $1 AND product_id = $2
                    "#,
                )
                .bind(variant_id)
                .bind(product_id)
                .bind(quantity)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("Product variant".to_string()));
                }
                self.refresh_derived_availability(tx, product_id).await?;
            }
            None => {
                let result = sqlx::query(
                    r#"
                    UPDATE products
                    SET stock = stock + $2,
                        is_available = CASE WHEN stock = 0 THEN true ELSE is_available END,
                        updated_at = NOW()
                    WHERE id = $1 AND has_variants = false
                    "#,
                )
                .bind(product_id)
                .bind(quantity)
                .execute(&mut **tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(AppError::NotFound("Product".to_string()));
                }
            }
        }

        Ok(())
    }

    /// Derived product availability for variant products: available while
    /// any variant still has stock.
    async fn refresh_derived_availability(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        product_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE products p
            SET is_available = EXISTS (
                    SELECT 1 FROM product_variants v
                    WHERE v.product_id = p.id AND v.is_available AND v.stock > 0
                ),
                updated_at = NOW()
            WHERE p.id = $1 AND p.has_variants = true
            "#,
        )
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn load_variants(&self, product_id: Uuid) -> AppResult<Vec<VariantRow>> {
        let variants = sqlx::query_as::<_, VariantRow>(
            r#"
            SELECT id, name, price, compare_at_price, stock, weight,
                   weight_unit, is_default, is_available
            FROM product_variants
            WHERE product_id = $1
            ORDER BY position
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        Ok(variants)
    }
}

async fn insert_variant(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    position: i32,
    input: &VariantInput,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO product_variants (
            product_id, name, price, compare_at_price, stock, weight,
            weight_unit, is_default, is_available, position
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(product_id)
    .bind(Json(&input.name))
    .bind(input.price)
    .bind(input.compare_at_price)
    .bind(input.stock)
    .bind(input.weight)
    .bind(input.weight_unit.as_str())
    .bind(input.is_default)
    .bind(input.stock > 0)
    .bind(position)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn variant_from_input(id: Uuid, input: &VariantInput) -> Variant {
    Variant {
        id,
        name: input.name.clone(),
        price: input.price,
        compare_at_price: input.compare_at_price,
        stock: input.stock,
        weight: input.weight,
        weight_unit: input.weight_unit,
        is_default: input.is_default,
        is_available: input.stock > 0,
    }
}

fn product_from_rows(row: ProductRow, variants: Vec<VariantRow>) -> AppResult<Product> {
    let category = ProductCategory::parse(&row.category)
        .ok_or_else(|| AppError::Internal(format!("Unknown product category: {}", row.category)))?;

    let variants = variants
        .into_iter()
        .map(|v| {
            let weight_unit = WeightUnit::parse(&v.weight_unit).ok_or_else(|| {
                AppError::Internal(format!("Unknown weight unit: {}", v.weight_unit))
            })?;
            Ok(Variant {
                id: v.id,
                name: v.name.0,
                price: v.price,
                compare_at_price: v.compare_at_price,
                stock: v.stock,
                weight: v.weight,
                weight_unit,
                is_default: v.is_default,
                is_available: v.is_available,
            })
        })
        .collect::<AppResult<Vec<Variant>>>()?;

    Ok(Product {
        id: row.id,
        producer_id: row.producer_id,
        name: row.name.0,
        description: row.description.0,
        category,
        price: row.price,
        stock: row.stock,
        has_variants: row.has_variants,
        variants,
        images: row.images.0,
        is_available: row.is_available,
        average_rating: row.average_rating,
        review_count: row.review_count,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
