use axum::Router;

pub mod admin;
pub mod cart;
pub mod common;
pub mod orders;
pub mod products;
pub mod system;
pub mod webhooks;

/// Routes mounted under `/api`.
pub fn router() -> Router {
    Router::new()
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/orders", orders::router())
        .nest("/webhooks", webhooks::router())
        .nest("/admin", admin::router())
}
