//! Checked form fields
//!
//! The four identifiers the backend can report as duplicates.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A form field that goes through duplicate verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    /// Institutional email (`correo`)
    Email,
    /// Mexican taxpayer id, RFC (`rfc`)
    TaxId,
    /// Population registry code, CURP (`curp`)
    NationalId,
    /// Social security number, NSS (`nss`)
    SocialSecurityNumber,
}

impl FieldKey {
    pub const ALL: [FieldKey; 4] = [
        FieldKey::Email,
        FieldKey::TaxId,
        FieldKey::NationalId,
        FieldKey::SocialSecurityNumber,
    ];

    /// Column / form name used by the backend
    pub fn wire_name(&self) -> &'static str {
        match self {
            FieldKey::Email => "correo",
            FieldKey::TaxId => "rfc",
            FieldKey::NationalId => "curp",
            FieldKey::SocialSecurityNumber => "nss",
        }
    }

    /// Label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            FieldKey::Email => "Correo Electrónico",
            FieldKey::TaxId => "RFC",
            FieldKey::NationalId => "CURP",
            FieldKey::SocialSecurityNumber => "Número de Seguro Social",
        }
    }
}

impl std::fmt::Display for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Error type for parsing a FieldKey
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFieldKeyError(String);

impl std::fmt::Display for ParseFieldKeyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Unknown field '{}'. Valid values: correo, rfc, curp, nss",
            self.0
        )
    }
}

impl std::error::Error for ParseFieldKeyError {}

impl FromStr for FieldKey {
    type Err = ParseFieldKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "correo" | "email" => Ok(FieldKey::Email),
            "rfc" | "tax_id" => Ok(FieldKey::TaxId),
            "curp" | "national_id" => Ok(FieldKey::NationalId),
            "nss" | "social_security_number" => Ok(FieldKey::SocialSecurityNumber),
            other => Err(ParseFieldKeyError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_and_rust_names() {
        assert_eq!("rfc".parse::<FieldKey>().unwrap(), FieldKey::TaxId);
        assert_eq!("CURP".parse::<FieldKey>().unwrap(), FieldKey::NationalId);
        assert_eq!(
            "social_security_number".parse::<FieldKey>().unwrap(),
            FieldKey::SocialSecurityNumber
        );
        assert!("telefono".parse::<FieldKey>().is_err());
    }

    #[test]
    fn test_wire_names_round_trip() {
        for key in FieldKey::ALL {
            assert_eq!(key.wire_name().parse::<FieldKey>().unwrap(), key);
        }
    }
}
