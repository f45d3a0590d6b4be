//! CORS middleware.
//!
//! Mirrors the caller's `Origin` and requested headers/method back, allows
//! credentials, and answers preflight `OPTIONS` requests directly.

use std::sync::Arc;

use axum::http::Method;

use crate::dispatch::middleware::{middleware_fn, Middleware};

const REQUEST_HEADERS: &str = "access-control-request-headers";
const REQUEST_METHOD: &str = "access-control-request-method";

/// Permissive CORS middleware.
///
/// Requests without an `Origin` header pass through untouched.
pub fn cors() -> Arc<dyn Middleware> {
    middleware_fn(|request, response, _data, next| async move {
        let Some(origin) = request.header("origin") else {
            next.resolve();
            return Ok(());
        };

        response.set_header("Access-Control-Allow-Origin", origin);
        response.set_header("Access-Control-Allow-Credentials", "true");
        if let Some(headers) = request.header(REQUEST_HEADERS) {
            response.set_header("Access-Control-Allow-Headers", headers);
        }
        if let Some(method) = request.header(REQUEST_METHOD) {
            response.set_header("Access-Control-Allow-Methods", method);
        }

        if request.method == Method::OPTIONS {
            tracing::debug!(origin = %origin, "Answering CORS preflight");
            response.ok();
        } else {
            next.resolve();
        }
        Ok(())
    })
}
