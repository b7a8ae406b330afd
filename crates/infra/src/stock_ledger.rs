//! Catalog storage and the variant stock ledger.
//!
//! The ledger is the one shared mutable resource in the system: every
//! mutation of `reserved_quantity` is a single atomic conditional update
//! keyed by variant id, never an application-level read-then-write. The
//! in-memory implementation runs check-then-apply inside one write-lock
//! critical section; the Postgres implementation expresses the same rule as
//! a conditional `UPDATE`.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::debug;

use shopforge_catalog::{Product, ProductStatus, Variant};
use shopforge_core::{DomainError, ProductId, VariantId};

use crate::error::StoreError;

/// Catalog reads/writes (products and variants minus the reservation paths).
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: Product) -> Result<(), StoreError>;
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;
    async fn list_active_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn insert_variant(&self, variant: Variant) -> Result<(), StoreError>;
    async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>, StoreError>;
    async fn variants_for_product(&self, product_id: ProductId)
    -> Result<Vec<Variant>, StoreError>;
}

/// Per-variant stock counters.
///
/// Reservation mutations are linearizable per variant; no cross-variant
/// ordering is guaranteed or needed.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Atomically reserve `quantity` units of a variant.
    ///
    /// Fails with `InsufficientStock` (carrying the availability observed at
    /// failure time) and no mutation when the stock is short. Returns the
    /// variant snapshot after the mutation.
    async fn reserve(&self, variant_id: VariantId, quantity: i64) -> Result<Variant, StoreError>;

    /// Release up to `quantity` reserved units, floored at zero to tolerate
    /// drift from crashed compensations.
    async fn release(&self, variant_id: VariantId, quantity: i64) -> Result<(), StoreError>;

    /// Adjust physical inventory; guarded so inventory never drops below the
    /// reserved quantity or zero.
    async fn restock(&self, variant_id: VariantId, delta: i64) -> Result<Variant, StoreError>;
}

/// Reserve with one internal retry on a lost conditional update.
///
/// A `Conflict` from the ledger means the availability check and the write
/// raced a concurrent mutation; one fresh attempt resolves the common case,
/// after which the conflict surfaces to the caller as transient.
pub async fn reserve_with_retry(
    ledger: &dyn StockLedger,
    variant_id: VariantId,
    quantity: i64,
) -> Result<Variant, StoreError> {
    match ledger.reserve(variant_id, quantity).await {
        Err(StoreError::Conflict(reason)) => {
            debug!(%variant_id, %reason, "reservation conflicted; retrying with fresh state");
            ledger.reserve(variant_id, quantity).await
        }
        result => result,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation (dev/test)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory catalog + ledger.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    variants: RwLock<HashMap<VariantId, Variant>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_products(&self) -> Result<RwLockReadGuard<'_, HashMap<ProductId, Product>>, StoreError> {
        self.products
            .read()
            .map_err(|_| StoreError::Backend("product lock poisoned".to_string()))
    }

    fn write_products(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<ProductId, Product>>, StoreError> {
        self.products
            .write()
            .map_err(|_| StoreError::Backend("product lock poisoned".to_string()))
    }

    fn read_variants(&self) -> Result<RwLockReadGuard<'_, HashMap<VariantId, Variant>>, StoreError> {
        self.variants
            .read()
            .map_err(|_| StoreError::Backend("variant lock poisoned".to_string()))
    }

    fn write_variants(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<VariantId, Variant>>, StoreError> {
        self.variants
            .write()
            .map_err(|_| StoreError::Backend("variant lock poisoned".to_string()))
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self.write_products()?;
        if products.contains_key(&product.id) {
            return Err(StoreError::Conflict("product already exists".to_string()));
        }
        products.insert(product.id, product);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.read_products()?.get(&id).cloned())
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut products: Vec<Product> = self
            .read_products()?
            .values()
            .filter(|p| p.status == ProductStatus::Active)
            .cloned()
            .collect();
        products.sort_by_key(|p| (p.created_at, *p.id.as_uuid()));
        Ok(products)
    }

    async fn insert_variant(&self, variant: Variant) -> Result<(), StoreError> {
        if !self.read_products()?.contains_key(&variant.product_id) {
            return Err(StoreError::NotFound);
        }
        let mut variants = self.write_variants()?;
        if variants.contains_key(&variant.id) {
            return Err(StoreError::Conflict("variant already exists".to_string()));
        }
        variants.insert(variant.id, variant);
        Ok(())
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>, StoreError> {
        Ok(self.read_variants()?.get(&id).cloned())
    }

    async fn variants_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Variant>, StoreError> {
        let mut variants: Vec<Variant> = self
            .read_variants()?
            .values()
            .filter(|v| v.product_id == product_id)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(variants)
    }
}

#[async_trait]
impl StockLedger for InMemoryCatalog {
    async fn reserve(&self, variant_id: VariantId, quantity: i64) -> Result<Variant, StoreError> {
        let mut variants = self.write_variants()?;
        let variant = variants.get_mut(&variant_id).ok_or(StoreError::NotFound)?;
        variant.reserve(quantity).map_err(|err| match err {
            DomainError::InsufficientStock { available } => {
                StoreError::InsufficientStock { available }
            }
            other => StoreError::Invariant(other.to_string()),
        })?;
        Ok(variant.clone())
    }

    async fn release(&self, variant_id: VariantId, quantity: i64) -> Result<(), StoreError> {
        let mut variants = self.write_variants()?;
        let variant = variants.get_mut(&variant_id).ok_or(StoreError::NotFound)?;
        variant.release(quantity);
        Ok(())
    }

    async fn restock(&self, variant_id: VariantId, delta: i64) -> Result<Variant, StoreError> {
        let mut variants = self.write_variants()?;
        let variant = variants.get_mut(&variant_id).ok_or(StoreError::NotFound)?;
        variant
            .restock(delta)
            .map_err(|err| StoreError::Invariant(err.to_string()))?;
        Ok(variant.clone())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Postgres-backed catalog + ledger.
///
/// All reservation mutations are conditional `UPDATE`s so two requests
/// racing on the same variant can never both observe stale availability.
pub struct PostgresCatalog {
    pool: PgPool,
}

impl PostgresCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &PgRow) -> Result<Product, StoreError> {
    let status: String = row.try_get("status")?;
    let status = match status.as_str() {
        "active" => ProductStatus::Active,
        "archived" => ProductStatus::Archived,
        other => return Err(StoreError::Backend(format!("unknown product status: {other}"))),
    };
    Ok(Product {
        id: ProductId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        status,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_variant(row: &PgRow) -> Result<Variant, StoreError> {
    let price: i64 = row.try_get("price")?;
    Ok(Variant {
        id: VariantId::from_uuid(row.try_get("id")?),
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        price: price.max(0) as u64,
        inventory_quantity: row.try_get("inventory_quantity")?,
        reserved_quantity: row.try_get("reserved_quantity")?,
    })
}

const VARIANT_COLUMNS: &str = "id, product_id, sku, name, price, inventory_quantity, reserved_quantity";

#[async_trait]
impl CatalogStore for PostgresCatalog {
    async fn insert_product(&self, product: Product) -> Result<(), StoreError> {
        let status = match product.status {
            ProductStatus::Active => "active",
            ProductStatus::Archived => "archived",
        };
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(&product.description)
        .bind(status)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, description, status, created_at FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_product).transpose()
    }

    async fn list_active_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, status, created_at
            FROM products
            WHERE status = 'active'
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn insert_variant(&self, variant: Variant) -> Result<(), StoreError> {
        if self.get_product(variant.product_id).await?.is_none() {
            return Err(StoreError::NotFound);
        }
        sqlx::query(
            r#"
            INSERT INTO variants (id, product_id, sku, name, price, inventory_quantity, reserved_quantity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(variant.id.as_uuid())
        .bind(variant.product_id.as_uuid())
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.price as i64)
        .bind(variant.inventory_quantity)
        .bind(variant.reserved_quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<Variant>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_variant).transpose()
    }

    async fn variants_for_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<Variant>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {VARIANT_COLUMNS} FROM variants WHERE product_id = $1 ORDER BY sku"
        ))
        .bind(product_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_variant).collect()
    }
}

#[async_trait]
impl StockLedger for PostgresCatalog {
    async fn reserve(&self, variant_id: VariantId, quantity: i64) -> Result<Variant, StoreError> {
        if quantity <= 0 {
            return Err(StoreError::Invariant(
                "reserve quantity must be positive".to_string(),
            ));
        }
        let row = sqlx::query(&format!(
            r#"
            UPDATE variants
            SET reserved_quantity = reserved_quantity + $2
            WHERE id = $1 AND inventory_quantity - reserved_quantity >= $2
            RETURNING {VARIANT_COLUMNS}
            "#
        ))
        .bind(variant_id.as_uuid())
        .bind(quantity)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_variant(&row),
            None => {
                // Conditional update matched nothing: missing variant or short
                // stock. Re-read to tell the two apart.
                let current = self
                    .get_variant(variant_id)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                if current.available() >= quantity {
                    Err(StoreError::Conflict(
                        "reservation raced a concurrent ledger update".to_string(),
                    ))
                } else {
                    Err(StoreError::InsufficientStock {
                        available: current.available(),
                    })
                }
            }
        }
    }

    async fn release(&self, variant_id: VariantId, quantity: i64) -> Result<(), StoreError> {
        if quantity <= 0 {
            return Ok(());
        }
        let result = sqlx::query(
            r#"
            UPDATE variants
            SET reserved_quantity = GREATEST(reserved_quantity - $2, 0)
            WHERE id = $1
            "#,
        )
        .bind(variant_id.as_uuid())
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn restock(&self, variant_id: VariantId, delta: i64) -> Result<Variant, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE variants
            SET inventory_quantity = inventory_quantity + $2
            WHERE id = $1
              AND inventory_quantity + $2 >= reserved_quantity
              AND inventory_quantity + $2 >= 0
            RETURNING {VARIANT_COLUMNS}
            "#
        ))
        .bind(variant_id.as_uuid())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row_to_variant(&row),
            None => {
                if self.get_variant(variant_id).await?.is_none() {
                    Err(StoreError::NotFound)
                } else {
                    Err(StoreError::Invariant(
                        "inventory cannot drop below reserved stock".to_string(),
                    ))
                }
            }
        }
    }
}
