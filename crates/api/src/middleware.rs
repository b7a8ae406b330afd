use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use shopforge_auth::JwtValidator;

use crate::context::AuthContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Optional bearer auth.
///
/// A request without an `Authorization` header proceeds anonymously (guest
/// carts identify themselves via `session_id`); a presented token must be
/// valid or the request is rejected outright.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if req.headers().contains_key(axum::http::header::AUTHORIZATION) {
        let token = extract_bearer(req.headers())?;

        let claims = state
            .jwt
            .validate(token, Utc::now())
            .map_err(|_e| StatusCode::UNAUTHORIZED)?;

        req.extensions_mut()
            .insert(AuthContext::new(claims.sub, claims.roles.clone()));
    }

    Ok(next.run(req).await)
}

/// Guard for the admin console surface: requires an authenticated context
/// carrying the `admin` role.
pub async fn require_admin(
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    match req.extensions().get::<AuthContext>() {
        Some(auth) if auth.is_admin() => Ok(next.run(req).await),
        Some(_) => Err(StatusCode::FORBIDDEN),
        None => Err(StatusCode::UNAUTHORIZED),
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(token)
}
