//! Infrastructure layer: storage adapters, coordination services, the
//! payment gateway port, and the background reservation sweeper.
//!
//! Each store trait has an in-memory implementation (dev/test) and a
//! Postgres implementation (sqlx) with identical conditional-update
//! semantics; the services are wired against the traits and never see the
//! difference.

pub mod cart_store;
pub mod checkout;
pub mod error;
pub mod order_store;
pub mod payment;
pub mod reservation;
pub mod stock_ledger;
pub mod sweeper;

pub use cart_store::{CartStore, InMemoryCartStore, PostgresCartStore};
pub use checkout::{CheckoutOutcome, CheckoutService, PaymentOutcome, WebhookDisposition};
pub use error::{ServiceError, StoreError};
pub use order_store::{InMemoryOrderStore, OrderStore, PostgresOrderStore};
pub use payment::{MockPaymentGateway, PaymentError, PaymentGateway, PaymentIntent};
pub use reservation::{MergeOutcome, ReservationService, UpdateOutcome};
pub use stock_ledger::{CatalogStore, InMemoryCatalog, PostgresCatalog, StockLedger};
pub use sweeper::{
    DEFAULT_SWEEP_INTERVAL_SECS, MAX_SWEEP_INTERVAL_SECS, MIN_SWEEP_INTERVAL_SECS,
    ReservationSweeper, SweeperHandle,
};
