//! Local format checks for onboarding form fields
//!
//! Everything here is correctable by the user without a backend round trip.
//! Failures are returned as [`ValidationError`] and never become gate
//! transitions.

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};

use crate::error::{ConfigError, ValidationError};
use crate::normalize::{institutional_email, TAX_ID_MAX_LEN};

const TAX_ID_MIN_LEN: usize = 12;
const TAX_ID_PATTERN: &str = r"^[A-Z&Ñ]{3,4}[0-9]{6}[A-Z0-9]{3}$";
const NATIONAL_ID_PATTERN: &str = r"^[A-Z]{4}\d{6}[HM][A-Z]{5}[A-Z\d]{2}$";

/// Fields the backend rejects when empty
pub const REQUIRED_FIELDS: &[&str] = &[
    "nombre",
    "apellido",
    "correo",
    "rfc",
    "curp",
    "nss",
    "fecha_alta",
    "area",
    "puesto",
];

/// Compiled format rules for one email domain
#[derive(Debug, Clone)]
pub struct FormatRules {
    tax_id: Regex,
    national_id: Regex,
    email: Regex,
    domain_suffix: String,
}

impl FormatRules {
    /// Build the rules for an institutional domain suffix such as `@example.com`
    pub fn new(domain_suffix: &str) -> Result<Self, ConfigError> {
        let compile = |key: &str, pattern: &str, case_insensitive: bool| {
            RegexBuilder::new(pattern)
                .case_insensitive(case_insensitive)
                .build()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: pattern.to_string(),
                    reason: e.to_string(),
                })
        };

        let domain = domain_suffix.trim_start_matches('@');
        let email_pattern = format!(r"^[^\s@]+@{}$", regex::escape(domain));

        Ok(Self {
            tax_id: compile("tax_id_pattern", TAX_ID_PATTERN, false)?,
            national_id: compile("national_id_pattern", NATIONAL_ID_PATTERN, false)?,
            email: compile("email_domain", &email_pattern, true)?,
            domain_suffix: format!("@{}", domain),
        })
    }

    pub fn domain_suffix(&self) -> &str {
        &self.domain_suffix
    }

    /// The institutional email proposed for a first name and surname
    pub fn candidate_email(&self, first: &str, last: &str) -> Result<String, ValidationError> {
        institutional_email(first, last, &self.domain_suffix)
            .ok_or(ValidationError::NoCandidateEmail)
    }

    /// RFC: length 12..=13 first, then the pattern
    pub fn validate_tax_id(&self, value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        let length = value.chars().count();
        if !(TAX_ID_MIN_LEN..=TAX_ID_MAX_LEN).contains(&length) {
            return Err(ValidationError::TaxIdLength { length });
        }
        if !self.tax_id.is_match(value) {
            return Err(ValidationError::TaxIdPattern {
                value: value.to_string(),
            });
        }
        Ok(())
    }

    /// CURP, compared upper-cased
    pub fn validate_national_id(&self, value: &str) -> Result<(), ValidationError> {
        let value = value.trim().to_uppercase();
        if self.national_id.is_match(&value) {
            Ok(())
        } else {
            Err(ValidationError::NationalIdPattern { value })
        }
    }

    /// Institutional email: any local part, exactly the configured domain
    pub fn validate_email(&self, value: &str) -> Result<(), ValidationError> {
        let value = value.trim();
        if self.email.is_match(value) {
            Ok(())
        } else {
            Err(ValidationError::EmailDomain {
                value: value.to_string(),
                domain: self.domain_suffix.clone(),
            })
        }
    }
}

/// Parse an ISO date (`YYYY-MM-DD`) the way the backend does
pub fn parse_form_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Check that every name in `required` has a non-blank value
pub fn require_fields<'a, F>(required: &[&str], lookup: F) -> Result<(), ValidationError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    for field in required {
        match lookup(field) {
            Some(value) if !value.trim().is_empty() => {}
            _ => {
                return Err(ValidationError::MissingField {
                    field: field.to_string(),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rules() -> FormatRules {
        FormatRules::new("@marnezdesarrollos.com").unwrap()
    }

    #[test]
    fn test_candidate_email_needs_letters_in_both_names() {
        let rules = rules();
        assert_eq!(
            rules.candidate_email("José", "Pérez López").unwrap(),
            "jose.perez@marnezdesarrollos.com"
        );
        assert_eq!(
            rules.candidate_email("123", "Pérez"),
            Err(ValidationError::NoCandidateEmail)
        );
        assert_eq!(
            rules.candidate_email("José", "  "),
            Err(ValidationError::NoCandidateEmail)
        );
    }

    #[test]
    fn test_tax_id_length_checked_before_pattern() {
        let rules = rules();
        assert_eq!(
            rules.validate_tax_id("ABC1234"),
            Err(ValidationError::TaxIdLength { length: 7 })
        );
        assert!(rules.validate_tax_id("PEJJ800101AB1").is_ok());
        assert!(rules.validate_tax_id("ABC800101AB1").is_ok());
        assert!(rules.validate_tax_id("PEÑA800101AB1").is_ok());
        assert!(matches!(
            rules.validate_tax_id("1234800101AB1"),
            Err(ValidationError::TaxIdPattern { .. })
        ));
    }

    #[test]
    fn test_national_id() {
        let rules = rules();
        assert!(rules.validate_national_id("PEJJ800101HDFRRN09").is_ok());
        assert!(rules.validate_national_id("pejj800101hdfrrn09").is_ok());
        assert!(rules.validate_national_id("PEJJ800101XDFRRN09").is_err());
        assert!(rules.validate_national_id("PEJJ800101HDFRRN0").is_err());
    }

    #[test]
    fn test_email_domain() {
        let rules = rules();
        assert!(rules
            .validate_email("maria.delrio@marnezdesarrollos.com")
            .is_ok());
        assert!(rules
            .validate_email("Maria.DelRio@MarnezDesarrollos.com")
            .is_ok());
        assert!(rules.validate_email("maria@gmail.com").is_err());
        assert!(rules
            .validate_email("maria delrio@marnezdesarrollos.com")
            .is_err());
        assert!(rules
            .validate_email("maria@marnezdesarrollosXcom")
            .is_err());
    }

    #[test]
    fn test_domain_suffix_normalized() {
        let rules = FormatRules::new("example.org").unwrap();
        assert_eq!(rules.domain_suffix(), "@example.org");
        assert!(rules.validate_email("a.b@example.org").is_ok());
    }

    #[test]
    fn test_parse_form_date() {
        assert!(parse_form_date("fecha_alta", "2026-01-15").is_ok());
        assert_eq!(
            parse_form_date("fecha_alta", "15/01/2026"),
            Err(ValidationError::InvalidDate {
                field: "fecha_alta".to_string(),
                value: "15/01/2026".to_string()
            })
        );
    }

    #[test]
    fn test_require_fields() {
        let mut form: HashMap<&str, &str> = HashMap::new();
        form.insert("nombre", "María");
        form.insert("apellido", "  ");

        let result = require_fields(&["nombre", "apellido"], |k| form.get(k).copied());
        assert_eq!(
            result,
            Err(ValidationError::MissingField {
                field: "apellido".to_string()
            })
        );

        form.insert("apellido", "Del Río");
        assert!(require_fields(&["nombre", "apellido"], |k| form.get(k).copied()).is_ok());
    }
}
