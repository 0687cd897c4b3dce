//! Signature workflow models.
//!
//! A document moves through four responsibility roles (ELABORA, REVISA,
//! APRUEBA, ENTERADO). The backend reports who is assigned where and one
//! signature fact record per assignment. These records are read-only on
//! this side: we never mutate them, only re-fetch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One responsibility assignment row.
///
/// `responsabilidad_id` uniquely identifies the assignment on the
/// backend. The same `user_id` may legitimately appear in several role
/// lists; those are independent assignments, never deduplicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Responsable {
    #[serde(alias = "usuarioId", alias = "userId")]
    pub user_id: i64,
    pub nombre: String,
    pub puesto: String,
    pub gerencia: String,
    #[serde(alias = "responsabilidadId")]
    pub responsabilidad_id: i64,
}

/// Per-document workflow assignment: one optional author plus the three
/// ordered reviewer/approver/acknowledger lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsablesPayload {
    #[serde(default)]
    pub elabora: Option<Responsable>,
    #[serde(default)]
    pub revisa: Vec<Responsable>,
    #[serde(default)]
    pub aprueba: Vec<Responsable>,
    #[serde(default)]
    pub enterado: Vec<Responsable>,
}

/// A signature fact record: whether one assignment has signed, and when.
///
/// `user_id` is kept as raw JSON because the backend is not consistent
/// about emitting it as a number or a numeric string; normalization
/// happens in [`crate::services::signing`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    #[serde(alias = "usuarioId", alias = "userId")]
    pub user_id: Value,
    #[serde(default, alias = "estaFirmado")]
    pub esta_firmado: bool,
    #[serde(default, alias = "fechaFirma")]
    pub fecha_firma: Option<String>,
}

/// Extract the signature entries embedded on a document object.
///
/// Documents carry them at one of two known places: a `firmas` array at
/// the top level, or nested under the `cuadro_firmas` sub-object. Either
/// shape is accepted; if neither is present the document has no entries.
/// Entries that do not deserialize are skipped rather than failing the
/// whole document.
pub fn signature_entries(document: &Value) -> Vec<SignatureEntry> {
    let array = document
        .get("firmas")
        .and_then(Value::as_array)
        .or_else(|| {
            document
                .get("cuadro_firmas")
                .or_else(|| document.get("cuadroFirmas"))
                .and_then(|cuadro| cuadro.get("firmas"))
                .and_then(Value::as_array)
        });

    match array {
        Some(entries) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
            .collect(),
        None => Vec::new(),
    }
}
