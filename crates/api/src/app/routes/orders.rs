use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use shopforge_core::OrderId;

use crate::app::routes::common::resolve_owner;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order))
        .route("/:id", get(get_order))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    let owner = match resolve_owner(auth.as_deref(), body.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    let result = match body.buy_now {
        Some(item) => {
            services
                .checkout
                .buy_now(
                    &owner,
                    item.product_id,
                    item.variant_id,
                    item.quantity,
                    body.shipping,
                    body.payment_method,
                    Utc::now(),
                )
                .await
        }
        None => {
            services
                .checkout
                .create_order(&owner, body.shipping, body.payment_method, Utc::now())
                .await
        }
    };

    match result {
        Ok(outcome) => {
            (StatusCode::CREATED, Json(dto::checkout_to_json(&outcome))).into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Path(id): Path<String>,
    Query(query): Query<dto::SessionQuery>,
) -> axum::response::Response {
    let order_id: OrderId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id");
        }
    };
    let is_admin = auth.as_deref().map(AuthContext::is_admin).unwrap_or(false);
    let owner = match resolve_owner(auth.as_deref(), query.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services.checkout.get_order(order_id).await {
        Ok(order) => {
            if order.owner != owner && !is_admin {
                return errors::json_error(
                    StatusCode::FORBIDDEN,
                    "forbidden",
                    "order belongs to another customer",
                );
            }
            (StatusCode::OK, Json(dto::order_to_json(&order))).into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}
