//! Per-field verification states and what the view layer renders for them

use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, TransportError};
use crate::field::FieldKey;

/// Verification state of one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verifying,
    Verified,
    Duplicate,
    Error,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Unverified => write!(f, "unverified"),
            VerificationStatus::Verifying => write!(f, "verifying"),
            VerificationStatus::Verified => write!(f, "verified"),
            VerificationStatus::Duplicate => write!(f, "duplicate"),
            VerificationStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of one backend check, as fed into the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// No record uses the value
    Clear,
    /// A record already uses the value
    Duplicate(ConflictError),
    /// The check could not be completed; counts as unverified
    Failed(TransportError),
}

/// Answer to [`SubmissionGate::verification_started`](super::SubmissionGate::verification_started)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartDecision {
    /// Caller should issue the backend call for `value`
    Started { value: String },
    /// A call for this field is outstanding; nothing to do
    AlreadyInFlight,
    /// The current value already has a verdict; edit the field to re-check
    AlreadySettled,
    /// Empty value, nothing to verify
    Skipped,
}

/// Answer to [`SubmissionGate::verification_resolved`](super::SubmissionGate::verification_resolved)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveDecision {
    /// The outcome was applied; the field is now in `status`
    Applied { status: VerificationStatus },
    /// The response was for a value the field no longer holds
    Discarded {
        /// A verification was requested while this call was outstanding
        rerun: bool,
    },
}

/// What the view layer shows next to a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum FieldIndicator {
    NotVerified,
    Verifying,
    Verified,
    Duplicate,
    /// Duplicate the user chose to continue with; not the same as verified
    DuplicateOverridden,
    Error { message: String },
}

impl FieldIndicator {
    /// Human-readable status text
    pub fn message(&self, field: FieldKey) -> String {
        match self {
            FieldIndicator::NotVerified => format!("{} pendiente de verificación", field.label()),
            FieldIndicator::Verifying => format!("Verificando {}...", field.label()),
            FieldIndicator::Verified => format!("{} verificado y disponible", field.label()),
            FieldIndicator::Duplicate => format!("{} duplicado", field.label()),
            FieldIndicator::DuplicateOverridden => {
                format!("{} duplicado - Continuando", field.label())
            }
            FieldIndicator::Error { message } => {
                format!("Error en verificación de {}: {}", field.label(), message)
            }
        }
    }
}

/// Notification sent to status listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Field whose indicator changed; `None` for form-wide changes
    pub field: Option<FieldKey>,
    pub indicator: Option<FieldIndicator>,
    pub email_confirmed: bool,
    pub ready: bool,
}

/// Handle returned by `on_status_change`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);
