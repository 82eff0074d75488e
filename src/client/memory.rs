//! In-process verification client
//!
//! Keeps a registry of already-registered values and answers lookups from
//! it. Failures and latency can be injected per field, and every call is
//! counted, which is what the gate tests need to observe the in-flight guard
//! and stale-response handling.

use alta_types::ExistingCollaborator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::{DuplicateCheck, Position, TaxIdLookup, VerificationClient};
use crate::error::TransportError;
use crate::field::FieldKey;
use crate::submission::{Submission, SubmissionOutcome};

#[derive(Debug)]
struct Registry {
    records: HashMap<FieldKey, HashMap<String, ExistingCollaborator>>,
    positions: HashMap<u32, Vec<Position>>,
    /// Remaining forced failures per field
    failures: HashMap<FieldKey, usize>,
    latency: HashMap<FieldKey, Duration>,
    calls: HashMap<FieldKey, usize>,
    submissions: Vec<Submission>,
    submit_outcome: SubmissionOutcome,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            positions: HashMap::new(),
            failures: HashMap::new(),
            latency: HashMap::new(),
            calls: HashMap::new(),
            submissions: Vec::new(),
            submit_outcome: SubmissionOutcome::Accepted,
        }
    }
}

/// Verification client answering from memory
#[derive(Debug, Default)]
pub struct InMemoryVerificationClient {
    registry: Mutex<Registry>,
}

impl InMemoryVerificationClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `value` as already registered for `field`
    pub fn register(&self, field: FieldKey, value: &str) {
        self.register_with(field, value, ExistingCollaborator::default());
    }

    /// Mark `value` as registered, with the record the RFC lookup returns
    pub fn register_with(&self, field: FieldKey, value: &str, record: ExistingCollaborator) {
        self.registry()
            .records
            .entry(field)
            .or_default()
            .insert(value.to_string(), record);
    }

    pub fn set_positions(&self, area_id: u32, positions: Vec<Position>) {
        self.registry().positions.insert(area_id, positions);
    }

    /// Make the next `times` checks of `field` fail
    pub fn fail_next(&self, field: FieldKey, times: usize) {
        self.registry().failures.insert(field, times);
    }

    /// Delay every check of `field`
    pub fn set_latency(&self, field: FieldKey, latency: Duration) {
        self.registry().latency.insert(field, latency);
    }

    /// Answer the next submissions with `outcome`
    pub fn set_submit_outcome(&self, outcome: SubmissionOutcome) {
        self.registry().submit_outcome = outcome;
    }

    /// Backend checks issued for `field` so far
    pub fn calls(&self, field: FieldKey) -> usize {
        self.registry().calls.get(&field).copied().unwrap_or(0)
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.registry().submissions.clone()
    }

    /// Count the call and return the injected latency or failure.
    /// The guard is dropped before the caller awaits.
    fn begin_call(&self, field: FieldKey, endpoint: &str) -> (Option<Duration>, Option<TransportError>) {
        let mut registry = self.registry();
        *registry.calls.entry(field).or_insert(0) += 1;
        let latency = registry.latency.get(&field).copied();

        let failure = match registry.failures.get_mut(&field) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Some(TransportError::Status {
                    endpoint: endpoint.to_string(),
                    status: 503,
                })
            }
            _ => None,
        };
        (latency, failure)
    }

    async fn simulate(&self, field: FieldKey, endpoint: &str) -> Result<(), TransportError> {
        let (latency, failure) = self.begin_call(field, endpoint);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lookup(&self, field: FieldKey, value: &str) -> Option<ExistingCollaborator> {
        self.registry()
            .records
            .get(&field)
            .and_then(|values| values.get(value))
            .cloned()
    }
}

#[async_trait]
impl VerificationClient for InMemoryVerificationClient {
    async fn check_duplicate(
        &self,
        field: FieldKey,
        value: &str,
    ) -> Result<DuplicateCheck, TransportError> {
        self.simulate(field, "memory://verificar-duplicado").await?;
        let duplicate = self.lookup(field, value).is_some();
        debug!(field = ?field, duplicate, "In-memory duplicate check");
        Ok(DuplicateCheck {
            field,
            value: value.to_string(),
            duplicate,
        })
    }

    async fn check_tax_id(&self, tax_id: &str) -> Result<TaxIdLookup, TransportError> {
        self.simulate(FieldKey::TaxId, "memory://verificar-rfc").await?;
        let existing = self.lookup(FieldKey::TaxId, tax_id);
        Ok(TaxIdLookup {
            value: tax_id.to_string(),
            exists: existing.is_some(),
            existing,
        })
    }

    async fn list_positions(&self, area_id: u32) -> Result<Vec<Position>, TransportError> {
        Ok(self
            .registry()
            .positions
            .get(&area_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Accepted submissions register their identifiers, so a second
    /// onboarding with the same RFC is reported as a duplicate.
    async fn submit(&self, submission: &Submission) -> Result<SubmissionOutcome, TransportError> {
        let mut registry = self.registry();
        registry.submissions.push(submission.clone());
        let outcome = registry.submit_outcome.clone();

        if outcome.is_accepted() {
            let record = ExistingCollaborator {
                name: format!(
                    "{} {}",
                    submission.field("nombre").unwrap_or_default(),
                    submission.field("apellido").unwrap_or_default()
                ),
                tax_id: submission.field("rfc").unwrap_or_default().to_string(),
                email: submission.field("correo").unwrap_or_default().to_string(),
                ..Default::default()
            };
            for field in FieldKey::ALL {
                if let Some(value) = submission.field(field.wire_name()) {
                    registry
                        .records
                        .entry(field)
                        .or_default()
                        .insert(value.to_string(), record.clone());
                }
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registered_values_are_duplicates() {
        let client = InMemoryVerificationClient::new();
        client.register(FieldKey::NationalId, "PEJJ800101HDFRRN09");

        let hit = client
            .check_duplicate(FieldKey::NationalId, "PEJJ800101HDFRRN09")
            .await
            .unwrap();
        assert!(hit.duplicate);

        let miss = client
            .check_duplicate(FieldKey::NationalId, "PEJJ800101HDFRRN08")
            .await
            .unwrap();
        assert!(!miss.duplicate);
        assert_eq!(client.calls(FieldKey::NationalId), 2);
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let client = InMemoryVerificationClient::new();
        client.fail_next(FieldKey::TaxId, 1);

        assert!(client.check_tax_id("ABC123456XYZ").await.is_err());
        let lookup = client.check_tax_id("ABC123456XYZ").await.unwrap();
        assert!(!lookup.exists);
    }
}
