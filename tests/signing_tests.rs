// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signature state resolution tests.

use chrono::{TimeZone, Utc};
use portafirmas_gateway::models::signing::signature_entries;
use portafirmas_gateway::models::SignatureEntry;
use portafirmas_gateway::services::signing::resolve_signature_status;
use serde_json::json;

fn entry(user_id: serde_json::Value, signed: bool, fecha: Option<&str>) -> SignatureEntry {
    SignatureEntry {
        user_id,
        esta_firmado: signed,
        fecha_firma: fecha.map(str::to_string),
    }
}

#[test]
fn test_most_recent_signature_across_multiple_roles() {
    // The same user holds two role entries (e.g. REVISA and APRUEBA);
    // both signed, the later timestamp wins.
    let entries = vec![
        entry(json!(5), true, Some("2024-01-01")),
        entry(json!(5), true, Some("2024-03-01")),
        entry(json!(7), false, None),
    ];

    let status = resolve_signature_status(&entries, &json!(5));
    assert!(status.assigned);
    assert!(status.signed);
    assert_eq!(
        status.last_signed_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
    );
}

#[test]
fn test_non_numeric_user_id_degrades_without_raising() {
    let entries = vec![entry(json!(5), true, Some("2024-01-01"))];

    let status = resolve_signature_status(&entries, &json!("abc"));
    assert!(!status.assigned);
    assert!(!status.signed);
    assert!(status.last_signed_at.is_none());
}

#[test]
fn test_numeric_string_ids_match_numeric_entries() {
    let entries = vec![entry(json!("5"), true, Some("2024-02-01"))];

    let status = resolve_signature_status(&entries, &json!(5));
    assert!(status.assigned);
    assert!(status.signed);
}

#[test]
fn test_assigned_but_unsigned() {
    let entries = vec![
        entry(json!(5), false, None),
        entry(json!(5), false, None),
    ];

    let status = resolve_signature_status(&entries, &json!(5));
    assert!(status.assigned);
    assert!(!status.signed);
    assert!(status.last_signed_at.is_none());
}

#[test]
fn test_signed_without_parseable_date() {
    let entries = vec![
        entry(json!(5), true, None),
        entry(json!(5), true, Some("mañana")),
    ];

    let status = resolve_signature_status(&entries, &json!(5));
    assert!(status.signed);
    assert!(status.last_signed_at.is_none());
}

#[test]
fn test_entries_extracted_from_both_document_shapes() {
    let direct = json!({
        "id": 1,
        "firmas": [
            {"user_id": 5, "esta_firmado": true, "fecha_firma": "2024-01-01"}
        ]
    });
    assert_eq!(signature_entries(&direct).len(), 1);

    let nested = json!({
        "id": 2,
        "cuadro_firmas": {
            "firmas": [
                {"userId": 5, "estaFirmado": false},
                {"userId": 6, "estaFirmado": true, "fechaFirma": "2024-02-02"}
            ]
        }
    });
    let entries = signature_entries(&nested);
    assert_eq!(entries.len(), 2);

    let status = resolve_signature_status(&entries, &json!(6));
    assert!(status.assigned);
    assert!(status.signed);

    let neither = json!({"id": 3, "titulo": "sin firmas"});
    assert!(signature_entries(&neither).is_empty());
}

#[test]
fn test_rfc3339_timestamps_win_over_earlier_dates() {
    let entries = vec![
        entry(json!(5), true, Some("2024-03-01")),
        entry(json!(5), true, Some("2024-03-01T12:30:00Z")),
    ];

    let status = resolve_signature_status(&entries, &json!(5));
    assert_eq!(
        status.last_signed_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap())
    );
}
