//! Infrastructure wiring: stores, coordination services, and the background
//! reservation sweeper.

use std::sync::Arc;

use sqlx::PgPool;

use shopforge_infra::{
    CartStore, CatalogStore, CheckoutService, DEFAULT_SWEEP_INTERVAL_SECS, InMemoryCartStore,
    InMemoryCatalog, InMemoryOrderStore, MockPaymentGateway, OrderStore, PostgresCartStore,
    PostgresCatalog, PostgresOrderStore, ReservationService, ReservationSweeper, StockLedger,
    SweeperHandle,
};

pub struct AppServices {
    pub catalog: Arc<dyn CatalogStore>,
    pub ledger: Arc<dyn StockLedger>,
    pub reservations: Arc<ReservationService>,
    pub checkout: Arc<CheckoutService>,
    // Keeps the background sweep alive for the app lifetime.
    _sweeper: SweeperHandle,
}

/// Build services from environment configuration.
///
/// `USE_PERSISTENT_STORES=true` (+ `DATABASE_URL`) selects the Postgres
/// stores; anything else wires the in-memory stores (dev/test). Both sides
/// present identical conditional-update semantics to the services.
pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let (catalog, ledger, carts, orders): (
        Arc<dyn CatalogStore>,
        Arc<dyn StockLedger>,
        Arc<dyn CartStore>,
        Arc<dyn OrderStore>,
    ) = if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("failed to connect to Postgres");
        let catalog = Arc::new(PostgresCatalog::new(pool.clone()));
        (
            catalog.clone(),
            catalog,
            Arc::new(PostgresCartStore::new(pool.clone())),
            Arc::new(PostgresOrderStore::new(pool)),
        )
    } else {
        let catalog = Arc::new(InMemoryCatalog::new());
        (
            catalog.clone(),
            catalog,
            Arc::new(InMemoryCartStore::new()),
            Arc::new(InMemoryOrderStore::new()),
        )
    };

    let reservations = Arc::new(ReservationService::new(ledger.clone(), carts.clone()));
    let checkout = Arc::new(CheckoutService::new(
        ledger.clone(),
        carts,
        orders,
        Arc::new(MockPaymentGateway),
    ));

    let sweep_interval = std::env::var("SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    let sweeper = ReservationSweeper::new(sweep_interval).spawn(reservations.clone());

    AppServices {
        catalog,
        ledger,
        reservations,
        checkout,
        _sweeper: sweeper,
    }
}
