use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};
use tracing::debug;

use shopforge_infra::WebhookDisposition;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/payment", post(payment))
}

/// Payment-provider callback. At-least-once delivery: a replayed terminal
/// outcome is answered 200 with `"ignored"`, never an error.
pub async fn payment(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PaymentWebhookRequest>,
) -> axum::response::Response {
    if let Some(event_id) = &body.event_id {
        debug!(%event_id, order_id = %body.order_id, "payment webhook received");
    }

    match services
        .checkout
        .payment_webhook(body.order_id, body.outcome)
        .await
    {
        Ok(WebhookDisposition::Processed) => {
            (StatusCode::OK, Json(serde_json::json!({ "status": "processed" }))).into_response()
        }
        Ok(WebhookDisposition::Ignored) => {
            (StatusCode::OK, Json(serde_json::json!({ "status": "ignored" }))).into_response()
        }
        Err(err) => errors::service_error_to_response(err),
    }
}
