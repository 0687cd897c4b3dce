//! Session and entitlement models.
//!
//! The upstream backend speaks Spanish camelCase; the serde aliases keep
//! us compatible with its `GET /users/me` body without leaking that
//! convention into the rest of the crate.

use serde::{Deserialize, Serialize};

/// A routable entitlement unit granted to a user.
///
/// `path` is a slash-delimited route prefix: holding a page grants the
/// route equal to `path` and every route nested under it. `code` is an
/// alternate, path-independent capability identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    #[serde(alias = "codigo")]
    pub code: String,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "ruta")]
    pub path: String,
    #[serde(default, alias = "icono")]
    pub icon: Option<String>,
    #[serde(default, alias = "orden")]
    pub order: Option<i32>,
}

/// Resolved identity snapshot for the current credential.
///
/// Read-only to every consumer; only the session resolver produces one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    #[serde(alias = "usuarioId", alias = "id")]
    pub user_id: i64,
    #[serde(alias = "nombre")]
    pub display_name: String,
    #[serde(default, alias = "paginas")]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, alias = "firmaUrl")]
    pub signature_url: Option<String>,
    #[serde(default, alias = "tieneFirma")]
    pub has_signature: bool,
}

/// Lifecycle of the resolved session.
///
/// Absent (no credential) → loading (fetch in flight) → resolved or
/// error; back to absent when the credential is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Idle,
    Loading,
    Resolved,
    Error,
}
