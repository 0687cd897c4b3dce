// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for the upstream REST backend.
//!
//! Handles:
//! - Profile fetch (`GET /users/me`) for session resolution
//! - Credential exchange (login) and rotation (refresh)
//! - Generic request forwarding for the reverse proxy

use axum::body::Bytes;
use axum::http::{HeaderMap, Method};
use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::models::Session;
use crate::services::session::ProfileFetcher;

/// Errors talking to the upstream backend.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP {0}: {1}")]
    Status(u16, String),

    #[error("Upstream response could not be decoded: {0}")]
    Decode(String),
}

/// Upstream API client.
#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Create a client for the given base URL.
    ///
    /// Redirects are never followed: the reverse proxy surfaces them to
    /// the caller verbatim.
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build upstream HTTP client");
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the authenticated user's profile.
    pub async fn profile(&self, credential: &str) -> Result<Session, UpstreamError> {
        let url = format!("{}/users/me", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Exchange portal credentials for a bearer token.
    pub async fn login(&self, usuario: &str, password: &str) -> Result<LoginTokens, UpstreamError> {
        let url = format!("{}/auth/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({
                "usuario": usuario,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Rotate the bearer token. The backend invalidates the old one.
    pub async fn refresh(&self, credential: &str) -> Result<LoginTokens, UpstreamError> {
        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Forward an arbitrary request to the upstream backend.
    ///
    /// The caller has already filtered the headers; status, headers and
    /// body of the response come back untouched for the proxy layer to
    /// pass through.
    pub async fn forward(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HeaderMap,
        body: Option<Bytes>,
    ) -> Result<reqwest::Response, UpstreamError> {
        let url = format!(
            "{}/{}",
            self.base_url,
            path_and_query.trim_start_matches('/')
        );

        let mut request = self.http.request(method, &url).headers(headers);
        if let Some(bytes) = body {
            request = request.body(bytes);
        }

        request
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))
    }

    /// Fetch an arbitrary backend resource as JSON with a bearer token.
    pub async fn get_json(
        &self,
        credential: &str,
        path: &str,
    ) -> Result<serde_json::Value, UpstreamError> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let response = self
            .http
            .get(&url)
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        Self::check_response_json(response).await
    }

    /// Check response status and parse the JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        response: reqwest::Response,
    ) -> Result<T, UpstreamError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }
}

impl ProfileFetcher for UpstreamClient {
    fn fetch_profile(
        &self,
        credential: String,
    ) -> BoxFuture<'static, Result<Session, UpstreamError>> {
        let client = self.clone();
        Box::pin(async move { client.profile(&credential).await })
    }
}

/// Token material returned by login and refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginTokens {
    #[serde(alias = "token")]
    pub access_token: String,
}
