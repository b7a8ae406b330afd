use serde::{Deserialize, Serialize};

use shopforge_core::{DomainError, DomainResult, Entity, ProductId, VariantId};

/// A purchasable SKU of a product, carrying the stock-ledger counters.
///
/// Invariant after every successful mutation:
/// `0 <= reserved_quantity <= inventory_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    /// Price in smallest currency unit (e.g., cents).
    pub price: u64,
    /// Physical stock on hand.
    pub inventory_quantity: i64,
    /// Stock currently held by unexpired cart reservations or unclaimed orders.
    pub reserved_quantity: i64,
}

impl Variant {
    pub fn new(
        product_id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: u64,
        initial_stock: i64,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        if sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if initial_stock < 0 {
            return Err(DomainError::validation("initial stock cannot be negative"));
        }
        Ok(Self {
            id: VariantId::new(),
            product_id,
            sku: sku.trim().to_string(),
            name: name.into(),
            price,
            inventory_quantity: initial_stock,
            reserved_quantity: 0,
        })
    }

    /// Stock not currently held by any reservation.
    pub fn available(&self) -> i64 {
        self.inventory_quantity - self.reserved_quantity
    }

    /// Take a hold on `quantity` units.
    ///
    /// Rejects the whole mutation when availability is short; the counters
    /// are untouched on failure.
    pub fn reserve(&mut self, quantity: i64) -> DomainResult<()> {
        if quantity <= 0 {
            return Err(DomainError::validation("reserve quantity must be positive"));
        }
        let available = self.available();
        if available < quantity {
            return Err(DomainError::insufficient_stock(available));
        }
        self.reserved_quantity += quantity;
        Ok(())
    }

    /// Give back up to `quantity` held units, floored at zero to tolerate
    /// drift from crashed compensations.
    pub fn release(&mut self, quantity: i64) {
        if quantity <= 0 {
            return;
        }
        self.reserved_quantity = (self.reserved_quantity - quantity).max(0);
    }

    /// Adjust physical inventory. Inventory can never drop below the
    /// currently reserved quantity (or zero).
    pub fn restock(&mut self, delta: i64) -> DomainResult<()> {
        let next = self.inventory_quantity + delta;
        if next < self.reserved_quantity {
            return Err(DomainError::invariant(
                "inventory cannot drop below reserved stock",
            ));
        }
        if next < 0 {
            return Err(DomainError::invariant("inventory cannot go negative"));
        }
        self.inventory_quantity = next;
        Ok(())
    }
}

impl Entity for Variant {
    type Id = VariantId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(stock: i64) -> Variant {
        Variant::new(ProductId::new(), "SKU-001", "Blue / M", 2_500, stock).unwrap()
    }

    #[test]
    fn reserve_within_availability_succeeds() {
        let mut v = variant(10);
        v.reserve(3).unwrap();
        assert_eq!(v.reserved_quantity, 3);
        assert_eq!(v.available(), 7);
    }

    #[test]
    fn reserve_beyond_availability_reports_available_and_mutates_nothing() {
        let mut v = variant(10);
        v.reserve(3).unwrap();
        let err = v.reserve(8).unwrap_err();
        assert_eq!(err, DomainError::InsufficientStock { available: 7 });
        assert_eq!(v.reserved_quantity, 3);
    }

    #[test]
    fn reserve_rejects_non_positive_quantity() {
        let mut v = variant(10);
        assert!(v.reserve(0).is_err());
        assert!(v.reserve(-1).is_err());
    }

    #[test]
    fn release_floors_at_zero() {
        let mut v = variant(10);
        v.reserve(2).unwrap();
        v.release(5);
        assert_eq!(v.reserved_quantity, 0);
    }

    #[test]
    fn release_of_non_positive_quantity_is_a_noop() {
        let mut v = variant(10);
        v.reserve(2).unwrap();
        v.release(0);
        v.release(-3);
        assert_eq!(v.reserved_quantity, 2);
    }

    #[test]
    fn restock_cannot_undercut_reservations() {
        let mut v = variant(10);
        v.reserve(4).unwrap();
        let err = v.restock(-7).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(v.inventory_quantity, 10);

        v.restock(-6).unwrap();
        assert_eq!(v.inventory_quantity, 4);
        assert_eq!(v.available(), 0);
    }

    #[test]
    fn new_variant_rejects_bad_inputs() {
        assert!(Variant::new(ProductId::new(), "  ", "x", 100, 5).is_err());
        assert!(Variant::new(ProductId::new(), "SKU", "x", 100, -1).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Reserve(i64),
            Release(i64),
            Restock(i64),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1i64..20).prop_map(Op::Reserve),
                (1i64..20).prop_map(Op::Release),
                (-20i64..20).prop_map(Op::Restock),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: no interleaving of reserve/release/restock can break
            /// `0 <= reserved <= inventory`.
            #[test]
            fn counters_stay_within_bounds(
                initial in 0i64..50,
                ops in proptest::collection::vec(op_strategy(), 0..64),
            ) {
                let mut v = Variant::new(ProductId::new(), "SKU-P", "prop", 999, initial).unwrap();
                for op in ops {
                    match op {
                        Op::Reserve(q) => { let _ = v.reserve(q); }
                        Op::Release(q) => v.release(q),
                        Op::Restock(d) => { let _ = v.restock(d); }
                    }
                    prop_assert!(v.reserved_quantity >= 0);
                    prop_assert!(v.reserved_quantity <= v.inventory_quantity);
                    prop_assert!(v.available() >= 0);
                }
            }

            /// Property: a failed reserve leaves both counters untouched.
            #[test]
            fn failed_reserve_has_no_effect(
                stock in 0i64..20,
                ask in 1i64..40,
            ) {
                let mut v = Variant::new(ProductId::new(), "SKU-P", "prop", 999, stock).unwrap();
                let before = v.clone();
                if v.reserve(ask).is_err() {
                    prop_assert_eq!(v, before);
                }
            }
        }
    }
}
