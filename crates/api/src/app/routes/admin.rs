use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use shopforge_catalog::{Product, Variant};
use shopforge_core::{OrderId, ProductId, VariantId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id/variants", post(create_variant))
        .route("/variants/:id/restock", post(restock))
        .route("/orders/:id/status", post(transition_status))
        .layer(axum::middleware::from_fn(crate::middleware::require_admin))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let product = match Product::new(body.name, body.description.unwrap_or_default(), Utc::now()) {
        Ok(product) => product,
        Err(err) => return errors::domain_error_to_response(err),
    };

    match services.catalog.insert_product(product.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(dto::product_to_json(&product))).into_response(),
        Err(err) => errors::store_error_to_response(err),
    }
}

pub async fn create_variant(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CreateVariantRequest>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };
    let variant = match Variant::new(product_id, body.sku, body.name, body.price, body.initial_stock)
    {
        Ok(variant) => variant,
        Err(err) => return errors::domain_error_to_response(err),
    };

    match services.catalog.insert_variant(variant.clone()).await {
        Ok(()) => (StatusCode::CREATED, Json(dto::variant_admin_json(&variant))).into_response(),
        Err(err) => errors::store_error_to_response(err),
    }
}

pub async fn restock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::RestockRequest>,
) -> axum::response::Response {
    let variant_id: VariantId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid variant id");
        }
    };

    match services.ledger.restock(variant_id, body.delta).await {
        Ok(variant) => (StatusCode::OK, Json(dto::variant_admin_json(&variant))).into_response(),
        Err(err) => errors::store_error_to_response(err),
    }
}

pub async fn transition_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusTransitionRequest>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };

    match services
        .checkout
        .transition_order_status(order_id, body.status)
        .await
    {
        Ok(order) => (StatusCode::OK, Json(dto::order_to_json(&order))).into_response(),
        Err(err) => errors::service_error_to_response(err),
    }
}
