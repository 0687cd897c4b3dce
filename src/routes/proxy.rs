// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generic reverse proxy to the upstream REST backend.
//!
//! Everything under `/api/` is forwarded verbatim: method, headers
//! (minus `host` and `content-length`) and body go up; status, headers
//! and body come back untouched, including redirects, which are
//! surfaced to the caller rather than followed.
//!
//! For a few designated paths — navigations like file downloads that
//! cannot carry an `Authorization` header — the bearer is read from the
//! HTTP-only access-token cookie and attached server-side.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, Method},
    response::Response,
    routing::any,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::{API_PREFIX, ACCESS_TOKEN_COOKIE};
use crate::services::guard::path_grants;
use crate::AppState;

/// Largest request body the proxy will buffer.
const MAX_PROXY_BODY: usize = 10 * 1024 * 1024;

/// Paths that authenticate from the access-token cookie. These are the
/// routes browsers hit via plain navigation (downloads, image tags),
/// where no header can be attached client-side.
const COOKIE_CREDENTIAL_PATHS: &[&str] = &["/archivos", "/firmas/imagen"];

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/{*path}", any(forward))
}

/// True for paths whose credential is derived from the cookie.
fn uses_cookie_credential(upstream_path: &str) -> bool {
    COOKIE_CREDENTIAL_PATHS
        .iter()
        .any(|prefix| path_grants(prefix, upstream_path))
}

/// Headers never forwarded in either direction.
fn is_skipped_header(name: &HeaderName) -> bool {
    name == header::HOST
        || name == header::CONTENT_LENGTH
        || name == header::CONNECTION
        || name == header::TRANSFER_ENCODING
        || name == header::UPGRADE
}

/// Forward one request to the upstream backend.
async fn forward(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    request: Request,
) -> Result<Response> {
    let upstream_path = request
        .uri()
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or_else(|| request.uri().path())
        .to_string();
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{upstream_path}?{query}"),
        None => upstream_path.clone(),
    };

    let method = request.method().clone();

    let mut headers = HeaderMap::new();
    for (name, value) in request.headers() {
        if !is_skipped_header(name) {
            headers.append(name, value.clone());
        }
    }

    // Cookie-derived credential for designated paths, attached
    // server-side; a caller-supplied Authorization header wins.
    if uses_cookie_credential(&upstream_path) && !headers.contains_key(header::AUTHORIZATION) {
        if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
            let bearer = format!("Bearer {}", cookie.value());
            if let Ok(value) = bearer.parse() {
                headers.insert(header::AUTHORIZATION, value);
            }
        }
    }

    let body = if method == Method::GET || method == Method::HEAD {
        None
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_PROXY_BODY)
            .await
            .map_err(|e| AppError::BadRequest(format!("Unreadable request body: {e}")))?;
        Some(bytes)
    };

    let upstream_response = state
        .upstream
        .forward(method, &path_and_query, headers, body)
        .await?;

    let status = upstream_response.status();
    let mut builder = Response::builder().status(status);
    for (name, value) in upstream_response.headers() {
        if !is_skipped_header(name) {
            builder = builder.header(name, value.clone());
        }
    }

    let bytes = upstream_response
        .bytes()
        .await
        .map_err(|e| AppError::UpstreamApi(format!("Failed reading upstream body: {e}")))?;

    builder
        .body(Body::from(bytes))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Response build failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_credential_paths_are_boundary_matched() {
        assert!(uses_cookie_credential("/archivos"));
        assert!(uses_cookie_credential("/archivos/123/descarga"));
        assert!(uses_cookie_credential("/firmas/imagen/7"));
        assert!(!uses_cookie_credential("/archivos-viejos"));
        assert!(!uses_cookie_credential("/documentos/1"));
    }

    #[test]
    fn test_skipped_headers() {
        assert!(is_skipped_header(&header::HOST));
        assert!(is_skipped_header(&header::CONTENT_LENGTH));
        assert!(is_skipped_header(&header::TRANSFER_ENCODING));
        assert!(!is_skipped_header(&header::AUTHORIZATION));
        assert!(!is_skipped_header(&header::CONTENT_TYPE));
    }
}
