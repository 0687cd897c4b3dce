// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session introspection routes.

use axum::{
    extract::{Extension, Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::SessionContext;
use crate::models::{signing::signature_entries, Session, SessionStatus};
use crate::services::realtime::ChannelStatus;
use crate::services::session::SessionSnapshot;
use crate::services::signing::{resolve_signature_status, SignatureStatus};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session/me", get(get_me))
        .route("/session/channel", get(get_channel))
        .route(
            "/session/documents/{id}/signature-status",
            get(get_signature_status),
        )
}

/// Session snapshot exposed to the browser.
#[derive(Serialize)]
pub struct SessionResponse {
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionResponse {
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            status: snapshot.status,
            session: snapshot.session,
            error: snapshot.error,
        }
    }
}

/// Current session state, settled.
async fn get_me(Extension(context): Extension<SessionContext>) -> Json<SessionResponse> {
    let snapshot = context.engine.settled().await;
    Json(SessionResponse::from_snapshot(snapshot))
}

/// Realtime channel state, for diagnostics.
#[derive(Serialize)]
struct ChannelResponse {
    state: &'static str,
}

async fn get_channel(Extension(context): Extension<SessionContext>) -> Json<ChannelResponse> {
    let state = match context.engine.channel_status() {
        ChannelStatus::Disconnected => "disconnected",
        ChannelStatus::Connecting { .. } => "connecting",
        ChannelStatus::Connected { .. } => "connected",
        ChannelStatus::Reconnecting { .. } => "reconnecting",
    };
    Json(ChannelResponse { state })
}

/// The current user's signature state on one document.
///
/// Fetches the document from the backend with the session's bearer and
/// derives assignment/completion across all of the user's role entries.
async fn get_signature_status(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<SessionContext>,
    Path(document_id): Path<i64>,
) -> Result<Json<SignatureStatus>> {
    let snapshot = context.engine.settled().await;
    let Some(session) = snapshot.session.as_ref() else {
        // Unresolved or errored sessions never read documents.
        return Err(AppError::Forbidden);
    };
    let Some(credential) = context.engine.credential() else {
        return Err(AppError::Unauthorized);
    };

    let document = state
        .upstream
        .get_json(&credential, &format!("documentos/{document_id}"))
        .await?;

    let entries = signature_entries(&document);
    let status = resolve_signature_status(&entries, &json!(session.user_id));

    Ok(Json(status))
}
