use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use chrono::Utc;

use shopforge_core::{CartItemId, SessionToken};
use shopforge_infra::UpdateOutcome;

use crate::app::routes::common::resolve_owner;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::AuthContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_item))
        .route("/items/:id", put(update_quantity).delete(remove_item))
        .route("/clear", post(clear_cart))
        .route("/summary", get(summary))
        .route("/merge", post(merge))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Query(query): Query<dto::SessionQuery>,
) -> axum::response::Response {
    let owner = match resolve_owner(auth.as_deref(), query.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services.reservations.get_cart(&owner).await {
        Ok(lines) => {
            let now = Utc::now();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "items": lines.iter().map(|l| dto::line_to_json(l, now)).collect::<Vec<_>>(),
                })),
            )
                .into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Json(body): Json<dto::AddItemRequest>,
) -> axum::response::Response {
    let owner = match resolve_owner(auth.as_deref(), body.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services
        .reservations
        .add_item(&owner, body.product_id, body.variant_id, body.quantity, Utc::now())
        .await
    {
        Ok(line) => {
            (StatusCode::CREATED, Json(dto::line_to_json(&line, Utc::now()))).into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn update_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateQuantityRequest>,
) -> axum::response::Response {
    let line_id: CartItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid line id");
        }
    };
    let owner = match resolve_owner(auth.as_deref(), body.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services
        .reservations
        .update_quantity(&owner, line_id, body.quantity, Utc::now())
        .await
    {
        Ok(UpdateOutcome::Updated(line)) => {
            (StatusCode::OK, Json(dto::line_to_json(&line, Utc::now()))).into_response()
        }
        Ok(UpdateOutcome::Removed) => {
            (StatusCode::OK, Json(serde_json::json!({ "removed": true }))).into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Path(id): Path<String>,
    Query(query): Query<dto::SessionQuery>,
) -> axum::response::Response {
    let line_id: CartItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid line id");
        }
    };
    let owner = match resolve_owner(auth.as_deref(), query.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services.reservations.remove_item(&owner, line_id).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({ "deleted": true }))).into_response(),
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    body: Option<Json<dto::SessionBody>>,
) -> axum::response::Response {
    let session_id = body.as_ref().and_then(|b| b.session_id.as_deref());
    let owner = match resolve_owner(auth.as_deref(), session_id) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services.reservations.clear_cart(&owner).await {
        Ok(deleted) => {
            (StatusCode::OK, Json(serde_json::json!({ "deleted": deleted }))).into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Query(query): Query<dto::SummaryQuery>,
) -> axum::response::Response {
    let owner = match resolve_owner(auth.as_deref(), query.session_id.as_deref()) {
        Ok(owner) => owner,
        Err(resp) => return resp,
    };

    match services
        .reservations
        .summary(&owner, query.discount.unwrap_or(0))
        .await
    {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(err) => errors::service_error_to_response(err),
    }
}

pub async fn merge(
    Extension(services): Extension<Arc<AppServices>>,
    auth: Option<Extension<AuthContext>>,
    Json(body): Json<dto::MergeRequest>,
) -> axum::response::Response {
    let Some(Extension(auth)) = auth else {
        return errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "merging requires an authenticated user",
        );
    };
    let session = match SessionToken::new(body.session_id) {
        Ok(token) => token,
        Err(err) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                err.to_string(),
            );
        }
    };

    match services
        .reservations
        .merge_guest_cart(&session, auth.user_id(), Utc::now())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => errors::service_error_to_response(err),
    }
}
