//! Product catalog service
//!
//! Owns product records: identity, reorder threshold, and the aggregate stock
//! counter. The counter itself is written only by the movement recorder (and
//! by batch creation when a lot is seeded with initial stock); this service
//! never touches it outside of reads.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use shared::{format_product_code, validate_product_code, validate_stock_minimum, Product};

use crate::error::{AppError, AppResult};

use super::sequence;

/// Product catalog service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Row shape shared by all product queries
type ProductRow = (
    Uuid,
    String,
    String,
    Option<String>,
    i64,
    i64,
    bool,
    DateTime<Utc>,
    DateTime<Utc>,
);

fn product_from_row(row: ProductRow) -> Product {
    Product {
        id: row.0,
        code: row.1,
        name: row.2,
        description: row.3,
        stock_minimum: row.4,
        stock_current: row.5,
        is_active: row.6,
        created_at: row.7,
        updated_at: row.8,
    }
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    /// Caller-supplied code; generated (PRD-YYYY-NNNN) when omitted
    pub code: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub stock_minimum: i64,
}

/// Input for updating a product
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub stock_minimum: Option<i64>,
    pub is_active: Option<bool>,
}

/// Summary entry for catalog listings
#[derive(Debug, Clone, Serialize)]
pub struct ProductStockLevel {
    pub product_id: Uuid,
    pub code: String,
    pub name: String,
    pub stock_minimum: i64,
    pub stock_current: i64,
    pub batch_count: i64,
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a product
    pub async fn create_product(&self, input: CreateProductInput) -> AppResult<Product> {
        if input.name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Product name cannot be empty".to_string(),
                message_th: "ชื่อสินค้าไม่สามารถว่างได้".to_string(),
            });
        }

        if let Err(msg) = validate_stock_minimum(input.stock_minimum) {
            return Err(AppError::Validation {
                field: "stock_minimum".to_string(),
                message: msg.to_string(),
                message_th: "เกณฑ์ขั้นต่ำต้องไม่ติดลบ".to_string(),
            });
        }

        let code = match input.code {
            Some(code) => {
                if let Err(msg) = validate_product_code(&code) {
                    return Err(AppError::Validation {
                        field: "code".to_string(),
                        message: msg.to_string(),
                        message_th: "รหัสสินค้าไม่ถูกต้อง".to_string(),
                    });
                }

                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM products WHERE code = $1)",
                )
                .bind(&code)
                .fetch_one(&self.db)
                .await?;

                if exists {
                    return Err(AppError::DuplicateEntry("code".to_string()));
                }

                code
            }
            None => self.generate_product_code().await?,
        };

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            INSERT INTO products (code, name, description, stock_minimum)
            VALUES ($1, $2, $3, $4)
            RETURNING id, code, name, description, stock_minimum, stock_current,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(&code)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.stock_minimum)
        .fetch_one(&self.db)
        .await?;

        Ok(product_from_row(row))
    }

    /// Generate a unique product code: PRD-YYYY-NNNN
    pub async fn generate_product_code(&self) -> AppResult<String> {
        let year = Utc::now().year();
        let sequence = sequence::next_value(&self.db, "PRD", &year.to_string()).await?;
        Ok(format_product_code(year, sequence))
    }

    /// Get a product by ID
    pub async fn get_product(&self, product_id: Uuid) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, code, name, description, stock_minimum, stock_current,
                   is_active, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(product_from_row(row))
    }

    /// Get a product by its unique code
    pub async fn get_product_by_code(&self, code: &str) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, code, name, description, stock_minimum, stock_current,
                   is_active, created_at, updated_at
            FROM products
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        Ok(product_from_row(row))
    }

    /// List products, optionally restricted to active ones
    pub async fn list_products(&self, active_only: bool) -> AppResult<Vec<Product>> {
        let rows = if active_only {
            sqlx::query_as::<_, ProductRow>(
                r#"
                SELECT id, code, name, description, stock_minimum, stock_current,
                       is_active, created_at, updated_at
                FROM products
                WHERE is_active = true
                ORDER BY code
                "#,
            )
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query_as::<_, ProductRow>(
                r#"
                SELECT id, code, name, description, stock_minimum, stock_current,
                       is_active, created_at, updated_at
                FROM products
                ORDER BY code
                "#,
            )
            .fetch_all(&self.db)
            .await?
        };

        Ok(rows.into_iter().map(product_from_row).collect())
    }

    /// List stock levels with batch counts, lowest cover first
    pub async fn list_stock_levels(&self) -> AppResult<Vec<ProductStockLevel>> {
        let rows = sqlx::query_as::<_, (Uuid, String, String, i64, i64, i64)>(
            r#"
            SELECT p.id, p.code, p.name, p.stock_minimum, p.stock_current,
                   COUNT(b.id) AS batch_count
            FROM products p
            LEFT JOIN batches b ON b.product_id = p.id
            WHERE p.is_active = true
            GROUP BY p.id, p.code, p.name, p.stock_minimum, p.stock_current
            ORDER BY p.stock_current - p.stock_minimum ASC, p.code
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ProductStockLevel {
                product_id: r.0,
                code: r.1,
                name: r.2,
                stock_minimum: r.3,
                stock_current: r.4,
                batch_count: r.5,
            })
            .collect())
    }

    /// Update a product's catalog fields (never the stock counter)
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: UpdateProductInput,
    ) -> AppResult<Product> {
        let existing = sqlx::query_as::<_, (String, Option<String>, i64, bool)>(
            "SELECT name, description, stock_minimum, is_active FROM products WHERE id = $1",
        )
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let name = input.name.unwrap_or(existing.0);
        let description = input.description.or(existing.1);
        let stock_minimum = input.stock_minimum.unwrap_or(existing.2);
        let is_active = input.is_active.unwrap_or(existing.3);

        if name.trim().is_empty() {
            return Err(AppError::Validation {
                field: "name".to_string(),
                message: "Product name cannot be empty".to_string(),
                message_th: "ชื่อสินค้าไม่สามารถว่างได้".to_string(),
            });
        }

        if let Err(msg) = validate_stock_minimum(stock_minimum) {
            return Err(AppError::Validation {
                field: "stock_minimum".to_string(),
                message: msg.to_string(),
                message_th: "เกณฑ์ขั้นต่ำต้องไม่ติดลบ".to_string(),
            });
        }

        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            UPDATE products
            SET name = $1, description = $2, stock_minimum = $3, is_active = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING id, code, name, description, stock_minimum, stock_current,
                      is_active, created_at, updated_at
            "#,
        )
        .bind(&name)
        .bind(&description)
        .bind(stock_minimum)
        .bind(is_active)
        .bind(product_id)
        .fetch_one(&self.db)
        .await?;

        Ok(product_from_row(row))
    }

    /// Delete a product. Fails while batches still reference it or stock
    /// remains on the aggregate counter.
    pub async fn delete_product(&self, product_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let stock_current = sqlx::query_scalar::<_, i64>(
            "SELECT stock_current FROM products WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let has_batches = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM batches WHERE product_id = $1)",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        if has_batches {
            return Err(AppError::InvalidStateTransition(
                "product still has batches".to_string(),
            ));
        }

        if stock_current != 0 {
            return Err(AppError::InvalidStateTransition(
                "product still has stock".to_string(),
            ));
        }

        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
