//! Submission readiness and the reasons it can be false

use serde::{Deserialize, Serialize};

use crate::field::FieldKey;

/// Why the submit action is disabled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ReadinessBlocker {
    /// The generated institutional email has not been confirmed
    EmailNotConfirmed,
    /// The confirmed email has no clean duplicate check (pending or failed)
    EmailNotVerified,
    /// The RFC has neither a clean verification nor an override
    TaxIdNotVerified,
    /// A field has a detected duplicate and no override for it
    UnresolvedDuplicate { field: FieldKey },
}

impl std::fmt::Display for ReadinessBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessBlocker::EmailNotConfirmed => {
                write!(f, "Debes confirmar el correo antes de continuar")
            }
            ReadinessBlocker::EmailNotVerified => {
                write!(f, "El correo aún no ha sido verificado")
            }
            ReadinessBlocker::TaxIdNotVerified => {
                write!(f, "Debes verificar el RFC antes de continuar")
            }
            ReadinessBlocker::UnresolvedDuplicate { field } => {
                write!(f, "{} duplicado: corrige el campo antes de enviar", field.label())
            }
        }
    }
}

/// Derived readiness of the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub blockers: Vec<ReadinessBlocker>,
}

impl Readiness {
    pub fn from_blockers(blockers: Vec<ReadinessBlocker>) -> Self {
        Self {
            ready: blockers.is_empty(),
            blockers,
        }
    }

    /// Tooltip text for the disabled submit control
    pub fn hint(&self) -> Option<String> {
        if self.ready {
            return None;
        }
        let has = |b: ReadinessBlocker| self.blockers.contains(&b);
        if has(ReadinessBlocker::EmailNotConfirmed) && has(ReadinessBlocker::TaxIdNotVerified) {
            return Some("Debes verificar el RFC y confirmar el correo".to_string());
        }
        self.blockers.first().map(|b| b.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hint_combines_email_and_rfc() {
        let readiness = Readiness::from_blockers(vec![
            ReadinessBlocker::EmailNotConfirmed,
            ReadinessBlocker::TaxIdNotVerified,
        ]);
        assert!(!readiness.ready);
        assert_eq!(
            readiness.hint().as_deref(),
            Some("Debes verificar el RFC y confirmar el correo")
        );
    }

    #[test]
    fn test_ready_has_no_hint() {
        let readiness = Readiness::from_blockers(vec![]);
        assert!(readiness.ready);
        assert_eq!(readiness.hint(), None);
    }
}
