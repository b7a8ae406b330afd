use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use shopforge_core::DomainError;
use shopforge_infra::{ServiceError, StoreError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(err) => domain_error_to_response(err),
        ServiceError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
        ServiceError::Payment(msg) => {
            json_error(StatusCode::BAD_GATEWAY, "payment_gateway_error", msg)
        }
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    service_error_to_response(ServiceError::from(err))
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InsufficientStock { available } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": format!("insufficient stock: {available} available"),
                "available": available,
            })),
        )
            .into_response(),
        DomainError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden"),
        // Post-retry conflicts are transient; the caller is expected to retry.
        DomainError::Conflict(msg) => {
            json_error(StatusCode::SERVICE_UNAVAILABLE, "conflict_retry", msg)
        }
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
