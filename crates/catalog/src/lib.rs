//! `shopforge-catalog` — product and variant domain types.
//!
//! The variant carries the stock-ledger counters (`inventory_quantity`,
//! `reserved_quantity`) and the pure arithmetic over them. All persisted
//! mutation of the counters goes through the infra stock ledger, which
//! applies these rules atomically per variant.

pub mod product;
pub mod variant;

pub use product::{Product, ProductStatus};
pub use variant::Variant;
