// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signature state resolution.
//!
//! Pure functions that derive one user's assignment and completion state
//! from a document's signature fact records. This feeds read-only UI
//! state, so malformed input degrades to "not assigned, not signed"
//! instead of surfacing an error into a render path.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::SignatureEntry;

/// One user's derived signature state across all of their role entries
/// on a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignatureStatus {
    pub assigned: bool,
    pub signed: bool,
    pub last_signed_at: Option<DateTime<Utc>>,
}

impl SignatureStatus {
    fn none() -> Self {
        Self {
            assigned: false,
            signed: false,
            last_signed_at: None,
        }
    }
}

/// Resolve a user's signature state from a document's entries.
///
/// A user may own several entries (one per responsibility role); that is
/// expected, not a data error. `assigned` is true if any entry belongs
/// to the user, `signed` if at least one of those is signed, and
/// `last_signed_at` is the most recent parseable timestamp among the
/// signed ones.
pub fn resolve_signature_status(entries: &[SignatureEntry], user_id: &Value) -> SignatureStatus {
    let Some(wanted) = normalize_user_id(user_id) else {
        return SignatureStatus::none();
    };

    let mine: Vec<&SignatureEntry> = entries
        .iter()
        .filter(|entry| normalize_user_id(&entry.user_id) == Some(wanted))
        .collect();

    let assigned = !mine.is_empty();
    let signed = mine.iter().any(|entry| entry.esta_firmado);
    let last_signed_at = mine
        .iter()
        .filter(|entry| entry.esta_firmado)
        .filter_map(|entry| entry.fecha_firma.as_deref())
        .filter_map(parse_fecha)
        .max();

    SignatureStatus {
        assigned,
        signed,
        last_signed_at,
    }
}

/// Normalize a user id to a finite integer.
///
/// The backend emits ids as JSON numbers or numeric strings depending on
/// the endpoint. Anything else (null, booleans, non-numeric strings,
/// non-finite or fractional numbers) normalizes to `None`.
pub fn normalize_user_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Parse a signature timestamp: RFC 3339, or a plain `YYYY-MM-DD` date
/// taken as midnight UTC.
fn parse_fecha(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
