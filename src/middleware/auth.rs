// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication and entitlement middleware.
//!
//! `require_session` binds a request to its session engine (cookie
//! first, then bearer header). `require_page_access` additionally gates
//! the request path against the resolved page entitlements; it waits
//! for resolution to settle, so a request racing the profile fetch is
//! neither rejected nor let through early.

use crate::error::AppError;
use crate::services::engine::SessionEngine;
use crate::services::guard::{AccessRequirement, GuardOutcome};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

/// HTTP-only cookie carrying the bearer credential.
pub const ACCESS_TOKEN_COOKIE: &str = "pf_access_token";

/// HTTP-only cookie identifying the session engine.
pub const SESSION_ID_COOKIE: &str = "pf_sid";

/// Prefix under which the generic reverse proxy is mounted.
pub const API_PREFIX: &str = "/api";

/// The request's session, injected as an extension by `require_session`.
#[derive(Clone)]
pub struct SessionContext {
    pub key: String,
    pub engine: Arc<SessionEngine>,
}

/// Extract the bearer credential: cookie first, then header.
pub fn bearer_credential(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(ACCESS_TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Middleware that requires a live session engine.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let sid = jar.get(SESSION_ID_COOKIE).map(|c| c.value().to_string());
    let bearer = bearer_credential(&jar, &request);

    let Some((key, engine)) = state.sessions.resolve(sid.as_deref(), bearer.as_deref()) else {
        return Err(AppError::Unauthorized);
    };

    request.extensions_mut().insert(SessionContext { key, engine });
    Ok(next.run(request).await)
}

/// Middleware that gates proxied paths against the session's granted
/// pages. Runs inside `require_session`.
///
/// A denied request is redirected to the forbidden destination exactly
/// once per session instance; repeated denials answer 403 so the
/// redirect can never loop.
pub async fn require_page_access(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(context) = request.extensions().get::<SessionContext>().cloned() else {
        // require_session did not run; fail closed.
        return Err(AppError::Unauthorized);
    };

    let requested = request
        .uri()
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or_else(|| request.uri().path())
        .to_string();

    let snapshot = context.engine.settled().await;
    let requirement = AccessRequirement::PagePath(requested.clone());

    match context
        .engine
        .guard()
        .decide(&snapshot, &requirement, &state.config.empty_pages_policy)
    {
        GuardOutcome::Allow => Ok(next.run(request).await),
        GuardOutcome::Redirect(destination) => {
            tracing::debug!(path = %requested, "Access denied, redirecting");
            Ok(Redirect::temporary(&destination).into_response())
        }
        // Pending cannot surface after settling; deny if it somehow does.
        GuardOutcome::Forbidden | GuardOutcome::Pending => Err(AppError::Forbidden),
    }
}
