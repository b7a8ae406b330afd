//! Cart line item storage.
//!
//! Lines are effectively single-owner; the only cross-request contention is
//! the hold expiry, which is guarded by the `clear_hold` compare-and-swap
//! (null the expiry only if it is currently non-null) so the sweep, checkout
//! claim, and removal can never release the same hold twice.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use shopforge_cart::CartLineItem;
use shopforge_core::{CartItemId, Owner, ProductId, SessionToken, UserId, VariantId};

use crate::error::StoreError;

#[async_trait]
pub trait CartStore: Send + Sync {
    /// Insert a new line. One line per (owner, variant).
    async fn insert(&self, line: CartLineItem) -> Result<(), StoreError>;

    async fn get(&self, id: CartItemId) -> Result<Option<CartLineItem>, StoreError>;

    async fn find_for_variant(
        &self,
        owner: &Owner,
        variant_id: VariantId,
    ) -> Result<Option<CartLineItem>, StoreError>;

    async fn list_for_owner(&self, owner: &Owner) -> Result<Vec<CartLineItem>, StoreError>;

    async fn update_quantity(&self, id: CartItemId, quantity: u32) -> Result<(), StoreError>;

    /// Overwrite the hold expiry (restarting or re-establishing a hold).
    async fn set_hold(
        &self,
        id: CartItemId,
        reserved_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// CAS: null the hold only if it is currently non-null.
    ///
    /// Returns whether *this* call cleared it; a `false` means another path
    /// (sweep, claim, removal) already consumed the hold.
    async fn clear_hold(&self, id: CartItemId) -> Result<bool, StoreError>;

    /// Lines whose hold exists and whose window has lapsed.
    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<CartLineItem>, StoreError>;

    /// Swap the line's owner (guest-to-user merge; no ledger interaction).
    async fn rehome(&self, id: CartItemId, owner: &Owner) -> Result<(), StoreError>;

    async fn delete(&self, id: CartItemId) -> Result<(), StoreError>;

    /// Bulk-delete all lines for an owner. Returns the number deleted.
    async fn delete_for_owner(&self, owner: &Owner) -> Result<u64, StoreError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory implementation (dev/test)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct InMemoryCartStore {
    inner: RwLock<HashMap<CartItemId, CartLineItem>>,
}

impl InMemoryCartStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<CartItemId, CartLineItem>>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Backend("cart lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<CartItemId, CartLineItem>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Backend("cart lock poisoned".to_string()))
    }
}

#[async_trait]
impl CartStore for InMemoryCartStore {
    async fn insert(&self, line: CartLineItem) -> Result<(), StoreError> {
        let mut lines = self.write()?;
        if lines
            .values()
            .any(|l| l.owner == line.owner && l.variant_id == line.variant_id)
        {
            return Err(StoreError::Conflict(
                "owner already has a line for this variant".to_string(),
            ));
        }
        lines.insert(line.id, line);
        Ok(())
    }

    async fn get(&self, id: CartItemId) -> Result<Option<CartLineItem>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn find_for_variant(
        &self,
        owner: &Owner,
        variant_id: VariantId,
    ) -> Result<Option<CartLineItem>, StoreError> {
        Ok(self
            .read()?
            .values()
            .find(|l| l.owner == *owner && l.variant_id == variant_id)
            .cloned())
    }

    async fn list_for_owner(&self, owner: &Owner) -> Result<Vec<CartLineItem>, StoreError> {
        let mut lines: Vec<CartLineItem> = self
            .read()?
            .values()
            .filter(|l| l.owner == *owner)
            .cloned()
            .collect();
        lines.sort_by_key(|l| (l.created_at, *l.id.as_uuid()));
        Ok(lines)
    }

    async fn update_quantity(&self, id: CartItemId, quantity: u32) -> Result<(), StoreError> {
        let mut lines = self.write()?;
        let line = lines.get_mut(&id).ok_or(StoreError::NotFound)?;
        line.quantity = quantity;
        Ok(())
    }

    async fn set_hold(
        &self,
        id: CartItemId,
        reserved_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let mut lines = self.write()?;
        let line = lines.get_mut(&id).ok_or(StoreError::NotFound)?;
        line.reserved_until = reserved_until;
        Ok(())
    }

    async fn clear_hold(&self, id: CartItemId) -> Result<bool, StoreError> {
        let mut lines = self.write()?;
        match lines.get_mut(&id) {
            Some(line) if line.reserved_until.is_some() => {
                line.reserved_until = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<CartLineItem>, StoreError> {
        let mut lines: Vec<CartLineItem> = self
            .read()?
            .values()
            .filter(|l| l.hold_expired(now))
            .cloned()
            .collect();
        lines.sort_by_key(|l| (l.created_at, *l.id.as_uuid()));
        Ok(lines)
    }

    async fn rehome(&self, id: CartItemId, owner: &Owner) -> Result<(), StoreError> {
        let mut lines = self.write()?;
        let line = lines.get_mut(&id).ok_or(StoreError::NotFound)?;
        line.owner = owner.clone();
        Ok(())
    }

    async fn delete(&self, id: CartItemId) -> Result<(), StoreError> {
        self.write()?.remove(&id);
        Ok(())
    }

    async fn delete_for_owner(&self, owner: &Owner) -> Result<u64, StoreError> {
        let mut lines = self.write()?;
        let before = lines.len();
        lines.retain(|_, l| l.owner != *owner);
        Ok((before - lines.len()) as u64)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Postgres implementation
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresCartStore {
    pool: PgPool,
}

impl PostgresCartStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn owner_columns(owner: &Owner) -> (Option<Uuid>, Option<String>) {
    match owner {
        Owner::User(id) => (Some(*id.as_uuid()), None),
        Owner::Guest(token) => (None, Some(token.as_str().to_string())),
    }
}

fn row_to_line(row: &PgRow) -> Result<CartLineItem, StoreError> {
    let user_id: Option<Uuid> = row.try_get("user_id")?;
    let session_id: Option<String> = row.try_get("session_id")?;
    let owner = match (user_id, session_id) {
        (Some(id), None) => Owner::User(UserId::from_uuid(id)),
        (None, Some(token)) => Owner::Guest(
            SessionToken::new(token)
                .map_err(|e| StoreError::Backend(format!("corrupt session token: {e}")))?,
        ),
        _ => {
            return Err(StoreError::Backend(
                "cart line must have exactly one owner".to_string(),
            ));
        }
    };
    let quantity: i32 = row.try_get("quantity")?;
    let price_at_time: i64 = row.try_get("price_at_time")?;
    Ok(CartLineItem {
        id: CartItemId::from_uuid(row.try_get("id")?),
        owner,
        product_id: ProductId::from_uuid(row.try_get("product_id")?),
        variant_id: VariantId::from_uuid(row.try_get("variant_id")?),
        quantity: quantity.max(0) as u32,
        price_at_time: price_at_time.max(0) as u64,
        reserved_until: row.try_get("reserved_until")?,
        created_at: row.try_get("created_at")?,
    })
}

const LINE_COLUMNS: &str = "id, user_id, session_id, product_id, variant_id, quantity, price_at_time, reserved_until, created_at";

#[async_trait]
impl CartStore for PostgresCartStore {
    async fn insert(&self, line: CartLineItem) -> Result<(), StoreError> {
        let (user_id, session_id) = owner_columns(&line.owner);
        sqlx::query(
            r#"
            INSERT INTO cart_items
                (id, user_id, session_id, product_id, variant_id, quantity, price_at_time, reserved_until, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(user_id)
        .bind(session_id)
        .bind(line.product_id.as_uuid())
        .bind(line.variant_id.as_uuid())
        .bind(line.quantity as i32)
        .bind(line.price_at_time as i64)
        .bind(line.reserved_until)
        .bind(line.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: CartItemId) -> Result<Option<CartLineItem>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM cart_items WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_line).transpose()
    }

    async fn find_for_variant(
        &self,
        owner: &Owner,
        variant_id: VariantId,
    ) -> Result<Option<CartLineItem>, StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        let row = sqlx::query(&format!(
            r#"
            SELECT {LINE_COLUMNS} FROM cart_items
            WHERE user_id IS NOT DISTINCT FROM $1
              AND session_id IS NOT DISTINCT FROM $2
              AND variant_id = $3
            "#
        ))
        .bind(user_id)
        .bind(session_id)
        .bind(variant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_line).transpose()
    }

    async fn list_for_owner(&self, owner: &Owner) -> Result<Vec<CartLineItem>, StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LINE_COLUMNS} FROM cart_items
            WHERE user_id IS NOT DISTINCT FROM $1
              AND session_id IS NOT DISTINCT FROM $2
            ORDER BY created_at, id
            "#
        ))
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_line).collect()
    }

    async fn update_quantity(&self, id: CartItemId, quantity: u32) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE cart_items SET quantity = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(quantity as i32)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn set_hold(
        &self,
        id: CartItemId,
        reserved_until: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE cart_items SET reserved_until = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(reserved_until)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn clear_hold(&self, id: CartItemId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE cart_items SET reserved_until = NULL WHERE id = $1 AND reserved_until IS NOT NULL",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<CartLineItem>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LINE_COLUMNS} FROM cart_items
            WHERE reserved_until IS NOT NULL AND reserved_until <= $1
            ORDER BY reserved_until
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_line).collect()
    }

    async fn rehome(&self, id: CartItemId, owner: &Owner) -> Result<(), StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        let result =
            sqlx::query("UPDATE cart_items SET user_id = $2, session_id = $3 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(user_id)
                .bind(session_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: CartItemId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_for_owner(&self, owner: &Owner) -> Result<u64, StoreError> {
        let (user_id, session_id) = owner_columns(owner);
        let result = sqlx::query(
            r#"
            DELETE FROM cart_items
            WHERE user_id IS NOT DISTINCT FROM $1
              AND session_id IS NOT DISTINCT FROM $2
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn guest(token: &str) -> Owner {
        Owner::Guest(SessionToken::new(token).unwrap())
    }

    fn line(owner: &Owner, now: DateTime<Utc>) -> CartLineItem {
        CartLineItem::new(
            owner.clone(),
            ProductId::new(),
            VariantId::new(),
            2,
            1_000,
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn insert_enforces_one_line_per_owner_variant() {
        let store = InMemoryCartStore::new();
        let owner = guest("sess-a");
        let now = Utc::now();
        let first = line(&owner, now);
        let mut duplicate = line(&owner, now);
        duplicate.variant_id = first.variant_id;

        store.insert(first).await.unwrap();
        assert!(matches!(
            store.insert(duplicate).await.unwrap_err(),
            StoreError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn clear_hold_is_a_single_shot_cas() {
        let store = InMemoryCartStore::new();
        let owner = guest("sess-b");
        let item = line(&owner, Utc::now());
        let id = item.id;
        store.insert(item).await.unwrap();

        assert!(store.clear_hold(id).await.unwrap());
        assert!(!store.clear_hold(id).await.unwrap());
        assert!(!store.clear_hold(CartItemId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn list_expired_only_sees_lapsed_active_holds() {
        let store = InMemoryCartStore::new();
        let owner = guest("sess-c");
        let now = Utc::now();

        let fresh = line(&owner, now);
        let mut lapsed = line(&owner, now);
        lapsed.reserved_until = Some(now - Duration::minutes(1));
        let mut cleared = line(&owner, now);
        cleared.reserved_until = None;
        let lapsed_id = lapsed.id;

        store.insert(fresh).await.unwrap();
        store.insert(lapsed).await.unwrap();
        store.insert(cleared).await.unwrap();

        let expired = store.list_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, lapsed_id);
    }

    #[tokio::test]
    async fn rehome_moves_a_line_between_owners() {
        let store = InMemoryCartStore::new();
        let owner = guest("sess-d");
        let user = Owner::User(UserId::new());
        let item = line(&owner, Utc::now());
        let id = item.id;
        store.insert(item).await.unwrap();

        store.rehome(id, &user).await.unwrap();
        assert!(store.list_for_owner(&owner).await.unwrap().is_empty());
        assert_eq!(store.list_for_owner(&user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_for_owner_reports_count() {
        let store = InMemoryCartStore::new();
        let owner = guest("sess-e");
        let other = guest("sess-f");
        store.insert(line(&owner, Utc::now())).await.unwrap();
        store.insert(line(&owner, Utc::now())).await.unwrap();
        store.insert(line(&other, Utc::now())).await.unwrap();

        assert_eq!(store.delete_for_owner(&owner).await.unwrap(), 2);
        assert_eq!(store.list_for_owner(&other).await.unwrap().len(), 1);
    }
}
