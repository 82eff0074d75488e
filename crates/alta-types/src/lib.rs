//! Wire Types for the Onboarding Backend
//!
//! Every JSON body that crosses the HTTP boundary between the onboarding
//! form core and the backend is defined here.
//!
//! ## Endpoints
//!
//! ```text
//! GET  /api/verificar-duplicado?campo=..&valor=..  -> DuplicateCheckResponse
//! GET  /api/verificar-rfc?rfc=..                   -> TaxIdLookupResponse
//! GET  /puestos/<area_id>                          -> Vec<PositionDto>
//! POST /alta-colaborador (multipart)               -> HTML / redirect
//! ```
//!
//! Field names follow the backend (Spanish) and are renamed to Rust names
//! with serde attributes.

use serde::{Deserialize, Serialize};

// ============================================================================
// DUPLICATE CHECK
// ============================================================================

/// Response of the generic duplicate-by-field lookup
///
/// The backend answers either `{ "duplicate": bool }` or `{ "error": ".." }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DuplicateCheckResponse {
    Error { error: String },
    Answer { duplicate: bool },
}

// ============================================================================
// TAX ID (RFC) LOOKUP
// ============================================================================

/// Response of the dedicated tax id lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaxIdLookupResponse {
    Error {
        error: String,
    },
    Answer {
        #[serde(rename = "existe")]
        exists: bool,
        #[serde(rename = "colaborador", default, skip_serializing_if = "Option::is_none")]
        collaborator: Option<ExistingCollaborator>,
    },
}

/// Record of a collaborator already registered with the looked-up tax id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingCollaborator {
    #[serde(rename = "nombre", default)]
    pub name: String,
    #[serde(rename = "rfc", default)]
    pub tax_id: String,
    #[serde(rename = "correo", default)]
    pub email: String,
    #[serde(default)]
    pub area: String,
    #[serde(rename = "estado", default)]
    pub status: String,
    #[serde(rename = "puesto", default)]
    pub position: String,
}

// ============================================================================
// POSITIONS
// ============================================================================

/// One entry of the position catalogue for an area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDto {
    pub id: u32,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_answer_and_error_bodies() {
        let answer: DuplicateCheckResponse =
            serde_json::from_str(r#"{"duplicate": true}"#).unwrap();
        assert_eq!(answer, DuplicateCheckResponse::Answer { duplicate: true });

        let error: DuplicateCheckResponse =
            serde_json::from_str(r#"{"error": "db down"}"#).unwrap();
        assert_eq!(
            error,
            DuplicateCheckResponse::Error {
                error: "db down".to_string()
            }
        );
    }

    #[test]
    fn test_tax_id_lookup_with_collaborator() {
        let body = r#"{
            "existe": true,
            "colaborador": {
                "nombre": "Juan Pérez",
                "rfc": "PEJJ800101AB1",
                "correo": "juan.perez@marnezdesarrollos.com",
                "area": "Comercial",
                "estado": "Activo",
                "puesto": "Asesor"
            }
        }"#;
        let parsed: TaxIdLookupResponse = serde_json::from_str(body).unwrap();
        match parsed {
            TaxIdLookupResponse::Answer {
                exists,
                collaborator: Some(c),
            } => {
                assert!(exists);
                assert_eq!(c.tax_id, "PEJJ800101AB1");
                assert_eq!(c.position, "Asesor");
            }
            other => panic!("unexpected body: {:?}", other),
        }
    }

    #[test]
    fn test_tax_id_lookup_available() {
        let parsed: TaxIdLookupResponse = serde_json::from_str(r#"{"existe": false}"#).unwrap();
        assert_eq!(
            parsed,
            TaxIdLookupResponse::Answer {
                exists: false,
                collaborator: None
            }
        );
    }

    #[test]
    fn test_position_list() {
        let parsed: Vec<PositionDto> =
            serde_json::from_str(r#"[{"id": 1, "nombre": "Gerente"}]"#).unwrap();
        assert_eq!(parsed[0].name, "Gerente");
    }
}
