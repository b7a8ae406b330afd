use axum::http::StatusCode;

use shopforge_core::{Owner, SessionToken};

use crate::app::errors;
use crate::context::AuthContext;

/// Resolve the cart owner for a request.
///
/// A verified token wins (authenticated identity beats a stray session id);
/// otherwise a non-empty client-supplied `session_id` names a guest cart.
/// Neither is a 401.
pub fn resolve_owner(
    auth: Option<&AuthContext>,
    session_id: Option<&str>,
) -> Result<Owner, axum::response::Response> {
    if let Some(auth) = auth {
        return Ok(Owner::User(auth.user_id()));
    }
    match session_id {
        Some(raw) => SessionToken::new(raw).map(Owner::Guest).map_err(|e| {
            errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
        }),
        None => Err(errors::json_error(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "a bearer token or session_id is required",
        )),
    }
}
