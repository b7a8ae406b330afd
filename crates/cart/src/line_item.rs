use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use shopforge_core::{CartItemId, DomainError, DomainResult, Entity, Owner, ProductId, VariantId};

pub const MIN_QUANTITY: u32 = 1;
pub const MAX_QUANTITY: u32 = 999;

/// How long a cart reservation holds stock before the sweep may reclaim it.
pub fn reservation_window() -> Duration {
    Duration::minutes(15)
}

pub fn validate_quantity(quantity: u32) -> DomainResult<()> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(DomainError::validation(format!(
            "quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

/// One (owner, variant) pairing in a cart.
///
/// `reserved_until` is the stock hold: `Some(_)` means the line holds
/// `quantity` units in the ledger; `None` means the hold was consumed by an
/// order or reclaimed by the expiry sweep. The line survives a sweep with
/// its quantity intact but no longer holds stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub id: CartItemId,
    pub owner: Owner,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: u32,
    /// Price snapshot taken when the item was added; never repriced.
    pub price_at_time: u64,
    pub reserved_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CartLineItem {
    pub fn new(
        owner: Owner,
        product_id: ProductId,
        variant_id: VariantId,
        quantity: u32,
        price_at_time: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_quantity(quantity)?;
        Ok(Self {
            id: CartItemId::new(),
            owner,
            product_id,
            variant_id,
            quantity,
            price_at_time,
            reserved_until: Some(now + reservation_window()),
            created_at: now,
        })
    }

    /// Whether this line still holds stock in the ledger.
    pub fn hold_active(&self) -> bool {
        self.reserved_until.is_some()
    }

    /// Whether the hold exists but its window has lapsed (sweep-eligible).
    pub fn hold_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.reserved_until, Some(until) if until <= now)
    }

    pub fn line_total(&self) -> u64 {
        self.price_at_time * u64::from(self.quantity)
    }
}

impl Entity for CartLineItem {
    type Id = CartItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopforge_core::SessionToken;

    fn guest() -> Owner {
        Owner::Guest(SessionToken::new("sess-test").unwrap())
    }

    #[test]
    fn new_line_starts_the_reservation_clock() {
        let now = Utc::now();
        let line =
            CartLineItem::new(guest(), ProductId::new(), VariantId::new(), 2, 1_000, now).unwrap();
        assert_eq!(line.reserved_until, Some(now + reservation_window()));
        assert!(line.hold_active());
        assert!(!line.hold_expired(now));
        assert!(line.hold_expired(now + Duration::minutes(16)));
    }

    #[test]
    fn quantity_bounds_are_enforced() {
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());
        assert!(validate_quantity(1000).is_err());

        let now = Utc::now();
        assert!(
            CartLineItem::new(guest(), ProductId::new(), VariantId::new(), 0, 1_000, now).is_err()
        );
    }

    #[test]
    fn cleared_hold_is_neither_active_nor_expired() {
        let now = Utc::now();
        let mut line =
            CartLineItem::new(guest(), ProductId::new(), VariantId::new(), 2, 1_000, now).unwrap();
        line.reserved_until = None;
        assert!(!line.hold_active());
        assert!(!line.hold_expired(now + Duration::hours(1)));
    }

    #[test]
    fn line_total_multiplies_snapshot_price() {
        let now = Utc::now();
        let line =
            CartLineItem::new(guest(), ProductId::new(), VariantId::new(), 3, 2_500, now).unwrap();
        assert_eq!(line.line_total(), 7_500);
    }
}
