//! Verification Client
//!
//! Uniform async contract over the backend lookups the onboarding form
//! depends on: duplicate-by-field, the dedicated RFC lookup, the position
//! catalogue and the final multipart submission.
//!
//! Every failure (network, non-2xx, `{ "error": .. }` body, undecodable body)
//! is a [`TransportError`]. A failed check never means "not a duplicate".
//!
//! Implementations:
//! - [`HttpVerificationClient`]: talks to the backend over HTTP
//! - [`InMemoryVerificationClient`]: in-process registry for tests and demos

mod http;
mod memory;

pub use http::HttpVerificationClient;
pub use memory::InMemoryVerificationClient;

use alta_types::{ExistingCollaborator, PositionDto};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, TransportError};
use crate::field::FieldKey;
use crate::gate::VerificationOutcome;
use crate::submission::{Submission, SubmissionOutcome};

/// Answer of the duplicate-by-field lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateCheck {
    pub field: FieldKey,
    /// The value that was checked
    pub value: String,
    pub duplicate: bool,
}

impl DuplicateCheck {
    pub fn into_outcome(self) -> VerificationOutcome {
        if self.duplicate {
            VerificationOutcome::Duplicate(ConflictError {
                field: self.field,
                value: self.value,
                existing: None,
            })
        } else {
            VerificationOutcome::Clear
        }
    }
}

/// Answer of the RFC lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxIdLookup {
    /// The RFC that was looked up
    pub value: String,
    pub exists: bool,
    /// Record already registered with the RFC, when the backend sends it
    pub existing: Option<ExistingCollaborator>,
}

impl TaxIdLookup {
    pub fn into_outcome(self) -> VerificationOutcome {
        if self.exists {
            VerificationOutcome::Duplicate(ConflictError {
                field: FieldKey::TaxId,
                value: self.value,
                existing: self.existing,
            })
        } else {
            VerificationOutcome::Clear
        }
    }
}

/// Position of an area's catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: u32,
    pub name: String,
}

impl From<PositionDto> for Position {
    fn from(dto: PositionDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
        }
    }
}

/// Backend operations used by the onboarding form
#[async_trait]
pub trait VerificationClient: Send + Sync {
    /// Is `value` already registered for `field`?
    async fn check_duplicate(
        &self,
        field: FieldKey,
        value: &str,
    ) -> Result<DuplicateCheck, TransportError>;

    /// Look up a collaborator by RFC
    async fn check_tax_id(&self, tax_id: &str) -> Result<TaxIdLookup, TransportError>;

    /// Position catalogue of an area
    async fn list_positions(&self, area_id: u32) -> Result<Vec<Position>, TransportError>;

    /// Post the completed form
    async fn submit(&self, submission: &Submission) -> Result<SubmissionOutcome, TransportError>;
}

/// Run the check appropriate for `field` and turn it into a gate outcome.
///
/// The RFC uses the dedicated lookup so the conflicting record can be shown;
/// every other field uses the generic duplicate check.
pub async fn verify_value<C>(client: &C, field: FieldKey, value: &str) -> VerificationOutcome
where
    C: VerificationClient + ?Sized,
{
    let result = match field {
        FieldKey::TaxId => client.check_tax_id(value).await.map(TaxIdLookup::into_outcome),
        _ => client
            .check_duplicate(field, value)
            .await
            .map(DuplicateCheck::into_outcome),
    };
    result.unwrap_or_else(VerificationOutcome::Failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_id_lookup_outcome_carries_record() {
        let record = ExistingCollaborator {
            name: "Ana Pérez".to_string(),
            tax_id: "ABC123456XYZ".to_string(),
            ..Default::default()
        };
        let lookup = TaxIdLookup {
            value: "ABC123456XYZ".to_string(),
            exists: true,
            existing: Some(record.clone()),
        };
        match lookup.into_outcome() {
            VerificationOutcome::Duplicate(conflict) => {
                assert_eq!(conflict.field, FieldKey::TaxId);
                assert_eq!(conflict.existing, Some(record));
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[test]
    fn test_clear_duplicate_check() {
        let check = DuplicateCheck {
            field: FieldKey::NationalId,
            value: "PEJJ800101HDFRRN09".to_string(),
            duplicate: false,
        };
        assert_eq!(check.into_outcome(), VerificationOutcome::Clear);
    }
}
