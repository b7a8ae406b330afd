use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use shopforge_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products))
        .route("/:id", get(get_product))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.catalog.list_active_products().await {
        Ok(products) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "products": products.iter().map(dto::product_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(err) => errors::store_error_to_response(err),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id");
        }
    };

    let product = match services.catalog.get_product(product_id).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
        }
        Err(err) => return errors::store_error_to_response(err),
    };

    let variants = match services.catalog.variants_for_product(product_id).await {
        Ok(variants) => variants,
        Err(err) => return errors::store_error_to_response(err),
    };

    let mut body = dto::product_to_json(&product);
    body["variants"] = serde_json::Value::Array(
        variants.iter().map(dto::variant_to_json).collect(),
    );
    (StatusCode::OK, Json(body)).into_response()
}
