//! `shopforge-cart` — cart line items and the pure pricing summary.
//!
//! A line item pairs an owner with a variant, snapshots the price at add
//! time, and carries the reservation expiry for the stock hold taken when
//! the item entered the cart.

pub mod line_item;
pub mod pricing;

pub use line_item::{
    CartLineItem, MAX_QUANTITY, MIN_QUANTITY, reservation_window, validate_quantity,
};
pub use pricing::{
    CartSummary, FLAT_SHIPPING_FEE, FREE_SHIPPING_THRESHOLD, TAX_RATE_BPS, summarize,
};
