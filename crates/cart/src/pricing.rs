//! Pure pricing projection over a cart snapshot.

use serde::{Deserialize, Serialize};

use shopforge_core::ValueObject;

use crate::line_item::CartLineItem;

/// Tax rate in basis points (8.5%).
pub const TAX_RATE_BPS: u64 = 850;
/// Subtotal at or above which shipping is free, in smallest currency unit.
pub const FREE_SHIPPING_THRESHOLD: u64 = 15_000;
/// Flat shipping fee below the threshold, in smallest currency unit.
pub const FLAT_SHIPPING_FEE: u64 = 1_500;

/// Computed pricing summary. All amounts in smallest currency unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub item_count: u32,
    pub subtotal: u64,
    pub tax: u64,
    pub shipping: u64,
    pub discount: u64,
    pub total: u64,
}

impl ValueObject for CartSummary {}

/// Compute the summary for a cart snapshot.
///
/// `subtotal = Σ price_at_time × quantity`; tax is a fixed rate with
/// truncating integer division; shipping is free at/above the threshold;
/// the discount (already evaluated elsewhere) is clamped to the subtotal so
/// the total can never go negative.
pub fn summarize(lines: &[CartLineItem], discount: u64) -> CartSummary {
    let subtotal: u64 = lines.iter().map(CartLineItem::line_total).sum();
    let item_count: u32 = lines.iter().map(|line| line.quantity).sum();

    let tax = subtotal * TAX_RATE_BPS / 10_000;
    let shipping = if lines.is_empty() || subtotal >= FREE_SHIPPING_THRESHOLD {
        0
    } else {
        FLAT_SHIPPING_FEE
    };
    let discount = discount.min(subtotal);

    CartSummary {
        item_count,
        subtotal,
        tax,
        shipping,
        discount,
        total: subtotal + tax + shipping - discount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shopforge_core::{Owner, ProductId, SessionToken, VariantId};

    fn line(price: u64, quantity: u32) -> CartLineItem {
        CartLineItem::new(
            Owner::Guest(SessionToken::new("sess-pricing").unwrap()),
            ProductId::new(),
            VariantId::new(),
            quantity,
            price,
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn subtotal_above_threshold_ships_free() {
        // 200.00 subtotal: shipping 0, tax 17.00, total 217.00.
        let summary = summarize(&[line(10_000, 2)], 0);
        assert_eq!(summary.subtotal, 20_000);
        assert_eq!(summary.shipping, 0);
        assert_eq!(summary.tax, 1_700);
        assert_eq!(summary.total, 21_700);
    }

    #[test]
    fn subtotal_below_threshold_pays_flat_shipping() {
        // 50.00 subtotal: shipping 15.00, tax 4.25, total 69.25.
        let summary = summarize(&[line(5_000, 1)], 0);
        assert_eq!(summary.subtotal, 5_000);
        assert_eq!(summary.shipping, 1_500);
        assert_eq!(summary.tax, 425);
        assert_eq!(summary.total, 6_925);
    }

    #[test]
    fn free_shipping_threshold_boundary() {
        assert_eq!(summarize(&[line(14_999, 1)], 0).shipping, FLAT_SHIPPING_FEE);
        assert_eq!(summarize(&[line(15_000, 1)], 0).shipping, 0);
    }

    #[test]
    fn discount_is_clamped_to_subtotal() {
        let summary = summarize(&[line(5_000, 1)], 100_000);
        assert_eq!(summary.discount, 5_000);
        // tax + shipping remain payable; total never underflows.
        assert_eq!(summary.total, 425 + 1_500);
    }

    #[test]
    fn empty_cart_is_all_zeroes() {
        let summary = summarize(&[], 0);
        assert_eq!(summary.item_count, 0);
        assert_eq!(summary.subtotal, 0);
        assert_eq!(summary.shipping, 0);
        assert_eq!(summary.total, 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Property: the summary identity holds and totals never underflow.
            #[test]
            fn summary_identity(
                prices in proptest::collection::vec((1u64..50_000, 1u32..10), 0..8),
                discount in 0u64..200_000,
            ) {
                let lines: Vec<CartLineItem> =
                    prices.iter().map(|(p, q)| line(*p, *q)).collect();
                let summary = summarize(&lines, discount);

                prop_assert_eq!(
                    summary.total,
                    summary.subtotal + summary.tax + summary.shipping - summary.discount
                );
                prop_assert!(summary.discount <= summary.subtotal);
                if summary.subtotal >= FREE_SHIPPING_THRESHOLD {
                    prop_assert_eq!(summary.shipping, 0);
                }
            }
        }
    }
}
