//! `shopforge-orders` — order aggregate and its pure state machines.
//!
//! The order is created at checkout with price/quantity snapshots from the
//! cart. Status and payment transitions are validated here; the persisted
//! transitions themselves are compare-and-swap updates in the order store.

pub mod order;

pub use order::{
    Order, OrderLine, OrderStatus, PaymentMethod, PaymentStatus, ShippingInfo,
    validate_payment_transition, validate_status_transition,
};
