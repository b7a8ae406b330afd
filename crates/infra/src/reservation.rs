//! Reservation manager.
//!
//! Reserves stock when an item enters a cart, adjusts the hold on quantity
//! edits, releases it on removal, reclaims lapsed holds in the sweep, and
//! reconciles guest carts into user carts on login. The service never does
//! an application-level read-then-write on `reserved_quantity`; every
//! mutation goes through the ledger's atomic conditional operations.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use shopforge_cart::{
    CartLineItem, CartSummary, MAX_QUANTITY, reservation_window, summarize, validate_quantity,
};
use shopforge_core::{
    CartItemId, DomainError, Owner, ProductId, SessionToken, UserId, VariantId,
};

use crate::cart_store::CartStore;
use crate::error::ServiceError;
use crate::stock_ledger::{StockLedger, reserve_with_retry};

/// Result of a quantity update: the line survived or was removed entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(CartLineItem),
    Removed,
}

/// Counts reported by a guest-cart merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Guest lines combined into an existing user line for the same variant.
    pub merged: u32,
    /// Guest lines re-homed to the user unchanged.
    pub rehomed: u32,
    /// Guest lines dropped because the combined quantity could not be satisfied.
    pub dropped: u32,
}

pub struct ReservationService {
    ledger: Arc<dyn StockLedger>,
    carts: Arc<dyn CartStore>,
}

impl ReservationService {
    pub fn new(ledger: Arc<dyn StockLedger>, carts: Arc<dyn CartStore>) -> Self {
        Self { ledger, carts }
    }

    /// Reserve stock and add a line item.
    ///
    /// Adding a variant the owner already has in the cart routes through the
    /// quantity-update path with the combined quantity.
    pub async fn add_item(
        &self,
        owner: &Owner,
        product_id: ProductId,
        variant_id: VariantId,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CartLineItem, ServiceError> {
        validate_quantity(quantity)?;

        if let Some(existing) = self.carts.find_for_variant(owner, variant_id).await? {
            let combined = existing.quantity.saturating_add(quantity);
            validate_quantity(combined)?;
            return self.apply_quantity(existing, combined, now).await;
        }

        let variant = reserve_with_retry(self.ledger.as_ref(), variant_id, i64::from(quantity))
            .await
            .map_err(ServiceError::from)?;
        if variant.product_id != product_id {
            self.release_quietly(variant_id, i64::from(quantity)).await;
            return Err(DomainError::validation("variant does not belong to product").into());
        }

        let line = CartLineItem::new(
            owner.clone(),
            product_id,
            variant_id,
            quantity,
            variant.price,
            now,
        )?;
        if let Err(err) = self.carts.insert(line.clone()).await {
            // Compensate the hold so the ledger does not leak; the sweep
            // bounds any drift if this release itself fails.
            self.release_quietly(variant_id, i64::from(quantity)).await;
            return Err(err.into());
        }

        debug!(owner = %owner, %variant_id, quantity, "reserved stock for new cart line");
        Ok(line)
    }

    /// Update a line's quantity. A target of zero or less removes the line.
    pub async fn update_quantity(
        &self,
        caller: &Owner,
        line_id: CartItemId,
        new_quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<UpdateOutcome, ServiceError> {
        let line = self.owned_line(caller, line_id).await?;

        if new_quantity <= 0 {
            self.remove_line(&line).await?;
            return Ok(UpdateOutcome::Removed);
        }
        if new_quantity > i64::from(MAX_QUANTITY) {
            return Err(DomainError::validation(format!(
                "quantity must be at most {MAX_QUANTITY}"
            ))
            .into());
        }

        let line = self.apply_quantity(line, new_quantity as u32, now).await?;
        Ok(UpdateOutcome::Updated(line))
    }

    /// Remove a line, releasing its hold if still active.
    pub async fn remove_item(
        &self,
        caller: &Owner,
        line_id: CartItemId,
    ) -> Result<(), ServiceError> {
        let line = self.owned_line(caller, line_id).await?;
        self.remove_line(&line).await
    }

    /// Release every hold and delete all of the owner's lines.
    pub async fn clear_cart(&self, owner: &Owner) -> Result<u64, ServiceError> {
        for line in self.carts.list_for_owner(owner).await? {
            if self.carts.clear_hold(line.id).await? {
                self.ledger
                    .release(line.variant_id, i64::from(line.quantity))
                    .await?;
            }
        }
        Ok(self.carts.delete_for_owner(owner).await?)
    }

    pub async fn get_cart(&self, owner: &Owner) -> Result<Vec<CartLineItem>, ServiceError> {
        Ok(self.carts.list_for_owner(owner).await?)
    }

    pub async fn summary(&self, owner: &Owner, discount: u64) -> Result<CartSummary, ServiceError> {
        let lines = self.carts.list_for_owner(owner).await?;
        Ok(summarize(&lines, discount))
    }

    /// Release reservations whose window has lapsed. Returns the number of
    /// holds released.
    ///
    /// The line itself is kept with its quantity; it simply no longer holds
    /// stock, and checkout re-reserves for it. Running the sweep twice is a
    /// no-op: the hold CAS picks exactly one releaser per expired hold.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, ServiceError> {
        let expired = self.carts.list_expired(now).await?;
        let mut released = 0u64;
        for line in expired {
            if !self.carts.clear_hold(line.id).await? {
                continue;
            }
            match self
                .ledger
                .release(line.variant_id, i64::from(line.quantity))
                .await
            {
                Ok(()) => {
                    released += 1;
                    debug!(
                        line_id = %line.id,
                        variant_id = %line.variant_id,
                        quantity = line.quantity,
                        "released expired reservation"
                    );
                }
                Err(err) => {
                    warn!(line_id = %line.id, error = %err, "failed to release expired reservation");
                }
            }
        }
        Ok(released)
    }

    /// Merge a guest session's cart into a user's cart, best-effort per line.
    ///
    /// A guest line whose variant the user already carries is combined via
    /// the quantity-update path (availability re-validated for the delta) and
    /// the guest hold released — net ledger change zero when both holds were
    /// active. A variant new to the user is re-homed without touching the
    /// ledger. Lines that cannot be combined are dropped with their holds
    /// released rather than aborting the merge.
    pub async fn merge_guest_cart(
        &self,
        session: &SessionToken,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<MergeOutcome, ServiceError> {
        let guest = Owner::Guest(session.clone());
        let user = Owner::User(user_id);
        let mut outcome = MergeOutcome::default();

        for line in self.carts.list_for_owner(&guest).await? {
            match self.carts.find_for_variant(&user, line.variant_id).await? {
                Some(user_line) => {
                    let combined = u64::from(user_line.quantity) + u64::from(line.quantity);
                    let merge_result = if combined > u64::from(MAX_QUANTITY) {
                        Err(ServiceError::Domain(DomainError::validation(
                            "combined quantity exceeds the cart limit",
                        )))
                    } else {
                        self.apply_quantity(user_line, combined as u32, now)
                            .await
                            .map(|_| ())
                    };
                    match merge_result {
                        Ok(()) => {
                            self.drop_guest_line(&line).await?;
                            outcome.merged += 1;
                        }
                        Err(ServiceError::Domain(err)) => {
                            // Left guest-owned; swept up by the cleanup below.
                            debug!(line_id = %line.id, error = %err, "skipping unmergeable guest line");
                        }
                        Err(err) => return Err(err),
                    }
                }
                None => {
                    self.carts.rehome(line.id, &user).await?;
                    outcome.rehomed += 1;
                }
            }
        }

        for line in self.carts.list_for_owner(&guest).await? {
            self.drop_guest_line(&line).await?;
            outcome.dropped += 1;
        }

        info!(
            user_id = %user_id,
            merged = outcome.merged,
            rehomed = outcome.rehomed,
            dropped = outcome.dropped,
            "merged guest cart"
        );
        Ok(outcome)
    }

    /// Move a line to `new_quantity`, adjusting the ledger by the delta
    /// against what the line currently holds.
    ///
    /// An active hold keeps its original expiry (edits do not extend the
    /// window); a cleared hold is re-established for the full new quantity
    /// with a fresh clock.
    async fn apply_quantity(
        &self,
        mut line: CartLineItem,
        new_quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CartLineItem, ServiceError> {
        validate_quantity(new_quantity)?;

        let held = if line.hold_active() {
            i64::from(line.quantity)
        } else {
            0
        };
        let delta = i64::from(new_quantity) - held;

        if delta > 0 {
            reserve_with_retry(self.ledger.as_ref(), line.variant_id, delta)
                .await
                .map_err(ServiceError::from)?;
        } else if delta < 0 {
            self.ledger.release(line.variant_id, -delta).await?;
        }

        if let Err(err) = self.carts.update_quantity(line.id, new_quantity).await {
            // Undo the ledger adjustment; drift from a failed undo is bounded
            // by the sweep (positive case) or the floored release (negative).
            if delta > 0 {
                self.release_quietly(line.variant_id, delta).await;
            } else if delta < 0 {
                if let Err(reserve_err) = self.ledger.reserve(line.variant_id, -delta).await {
                    warn!(
                        variant_id = %line.variant_id,
                        error = %reserve_err,
                        "failed to restore hold after quantity update failure"
                    );
                }
            }
            return Err(err.into());
        }

        if !line.hold_active() {
            let reserved_until = Some(now + reservation_window());
            if let Err(err) = self.carts.set_hold(line.id, reserved_until).await {
                self.release_quietly(line.variant_id, i64::from(new_quantity)).await;
                return Err(err.into());
            }
            line.reserved_until = reserved_until;
        }

        line.quantity = new_quantity;
        Ok(line)
    }

    async fn owned_line(
        &self,
        caller: &Owner,
        line_id: CartItemId,
    ) -> Result<CartLineItem, ServiceError> {
        let line = self
            .carts
            .get(line_id)
            .await?
            .ok_or(DomainError::NotFound)?;
        if line.owner != *caller {
            return Err(DomainError::Forbidden.into());
        }
        Ok(line)
    }

    async fn remove_line(&self, line: &CartLineItem) -> Result<(), ServiceError> {
        if self.carts.clear_hold(line.id).await? {
            self.ledger
                .release(line.variant_id, i64::from(line.quantity))
                .await?;
        }
        self.carts.delete(line.id).await?;
        Ok(())
    }

    async fn drop_guest_line(&self, line: &CartLineItem) -> Result<(), ServiceError> {
        if self.carts.clear_hold(line.id).await? {
            self.ledger
                .release(line.variant_id, i64::from(line.quantity))
                .await?;
        }
        self.carts.delete(line.id).await?;
        Ok(())
    }

    async fn release_quietly(&self, variant_id: VariantId, quantity: i64) {
        if let Err(err) = self.ledger.release(variant_id, quantity).await {
            warn!(%variant_id, error = %err, "failed to compensate reservation");
        }
    }
}
