// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication routes: login, token refresh, logout.
//!
//! The gateway holds the bearer in an HTTP-only cookie and keys the
//! session engine with a separate session-id cookie. Refresh rotates
//! the credential in place: the engine's store is updated, which makes
//! the resolver re-fetch and the realtime channel re-authenticate.

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use crate::error::{AppError, Result};
use crate::middleware::auth::{SessionContext, ACCESS_TOKEN_COOKIE, SESSION_ID_COOKIE};
use crate::routes::session::SessionResponse;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// Routes that need an existing session (registered behind
/// `require_session` in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/refresh", post(refresh))
}

/// Login request body.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "usuario is required"))]
    usuario: String,
    #[validate(length(min = 1, message = "password is required"))]
    password: String,
}

/// Login response: the settled session snapshot plus the bearer for
/// API clients that send their own `Authorization` header.
#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(flatten)]
    pub session: SessionResponse,
}

fn auth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie
}

/// Removal cookie with the same attributes the cookie was created with.
fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = auth_cookie(name, String::new(), secure);
    cookie.make_removal();
    cookie
}

/// Exchange portal credentials for a gateway session.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let tokens = state.upstream.login(&body.usuario, &body.password).await?;

    // Re-login without logout: tear down the previous engine first.
    if let Some(old_sid) = jar.get(SESSION_ID_COOKIE) {
        state.sessions.remove(old_sid.value());
    }

    let (sid, engine) = state.sessions.create(tokens.access_token.clone());
    let snapshot = engine.settled().await;

    tracing::info!(
        user_id = snapshot.session.as_ref().map(|s| s.user_id),
        "Login succeeded, session engine started"
    );

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(auth_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            secure,
        ))
        .add(auth_cookie(SESSION_ID_COOKIE, sid, secure));

    Ok((
        jar,
        Json(LoginResponse {
            access_token: tokens.access_token,
            session: SessionResponse::from_snapshot(snapshot),
        }),
    ))
}

/// Rotate the bearer credential in place.
///
/// The old token keeps its open realtime connection only until the
/// engine observes the new value; from that instant the connection is
/// stale and is replaced without waiting for its teardown.
async fn refresh(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<SessionContext>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    let Some(current) = context.engine.credential() else {
        return Err(AppError::Unauthorized);
    };

    let tokens = state.upstream.refresh(&current).await?;
    context.engine.rotate(tokens.access_token.clone());

    let snapshot = context.engine.settled().await;
    tracing::info!("Credential rotated");

    let jar = jar.add(auth_cookie(
        ACCESS_TOKEN_COOKIE,
        tokens.access_token,
        state.config.secure_cookies(),
    ));

    Ok((jar, Json(SessionResponse::from_snapshot(snapshot))))
}

/// Tear down the session and clear both cookies.
///
/// Idempotent: logging out without a live engine still clears cookies.
async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    if let Some(sid) = jar.get(SESSION_ID_COOKIE) {
        state.sessions.remove(sid.value());
    }

    let secure = state.config.secure_cookies();
    let jar = jar
        .add(removal_cookie(ACCESS_TOKEN_COOKIE, secure))
        .add(removal_cookie(SESSION_ID_COOKIE, secure));

    Ok((jar, StatusCode::NO_CONTENT))
}
