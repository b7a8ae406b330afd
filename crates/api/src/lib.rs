//! `shopforge-api` — HTTP surface for the storefront.
//!
//! Owner resolution: a valid bearer token identifies a user; otherwise a
//! client-supplied `session_id` identifies a guest cart. Admin routes
//! additionally require the `admin` role in the token claims.

pub mod app;
pub mod context;
pub mod middleware;
