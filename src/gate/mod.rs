//! Submission Gate
//!
//! Decides when the onboarding form may be submitted. The gate tracks, per
//! checked field, the current value and a verification state:
//!
//! ```text
//!   Unverified ──started──► Verifying ──resolved──► Verified | Duplicate | Error
//!        ▲                                                   │
//!        └──────────────────── field_edited ◄────────────────┘
//! ```
//!
//! plus the email confirmation and the duplicate override store, and derives
//!
//! ```text
//! ready = email confirmed AND email verified
//!     AND (RFC verified OR override granted for the current RFC)
//!     AND no field in Duplicate without an override for that field
//! ```
//!
//! ## Invariants
//!
//! - Any edit resets the field to `Unverified` before any network call returns.
//! - At most one backend call per field is outstanding.
//! - A response is applied only if the field still holds the value it echoes.
//! - Only the RFC can be overridden, and the override stays `Duplicate` in
//!   the indicator map (`DuplicateOverridden`), never `Verified`.
//! - `reset()` drops every verdict and clears the override store.

mod readiness;
mod status;

pub use readiness::{Readiness, ReadinessBlocker};
pub use status::{
    FieldIndicator, ListenerId, ResolveDecision, StartDecision, StatusChange,
    VerificationOutcome, VerificationStatus,
};

use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::{
    AltaError, ConflictError, GateError, StoreError, TransportError, ValidationError,
};
use crate::field::FieldKey;
use crate::override_store::{MemoryOverrideStore, OverrideStore};

type Listener = Box<dyn Fn(&StatusChange)>;

#[derive(Debug, Default)]
struct FieldState {
    value: String,
    status: VerificationStatus,
    /// Value of the outstanding backend call, if any
    in_flight: Option<String>,
    /// Someone asked to verify while the call was outstanding
    rerun_requested: bool,
    conflict: Option<ConflictError>,
    last_error: Option<TransportError>,
}

/// Snapshot used to decide whether listeners must be told
#[derive(PartialEq)]
struct Observed {
    indicator: Option<FieldIndicator>,
    email_confirmed: bool,
    ready: bool,
}

/// The submit gate of one onboarding form
pub struct SubmissionGate {
    fields: BTreeMap<FieldKey, FieldState>,
    /// Email value the user confirmed
    confirmed_email: Option<String>,
    overrides: Box<dyn OverrideStore>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl Default for SubmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionGate")
            .field("fields", &self.fields)
            .field("confirmed_email", &self.confirmed_email)
            .field("override", &self.overrides.current())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl SubmissionGate {
    /// Gate with an in-memory override store
    pub fn new() -> Self {
        Self::with_override_store(Box::new(MemoryOverrideStore::new()))
    }

    /// Gate backed by the given override store
    pub fn with_override_store(overrides: Box<dyn OverrideStore>) -> Self {
        let fields = FieldKey::ALL
            .iter()
            .map(|k| (*k, FieldState::default()))
            .collect();
        Self {
            fields,
            confirmed_email: None,
            overrides,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// The user changed a field. The field drops back to `Unverified`
    /// unconditionally; an outstanding call keeps running but its answer
    /// will no longer match.
    pub fn field_edited(&mut self, field: FieldKey, value: &str) {
        let before = self.observe(Some(field));

        let state = self.state_mut(field);
        state.value = value.to_string();
        state.status = VerificationStatus::Unverified;
        state.conflict = None;
        state.last_error = None;

        if field == FieldKey::Email {
            self.confirmed_email = None;
        }

        debug!(field = ?field, "Field edited, verification reset");
        self.notify(Some(field), before);
    }

    /// Ask to verify the field's current value.
    ///
    /// Only `Unverified` and `Error` fields start a call. While a call for the
    /// field is outstanding every further request is a no-op.
    pub fn verification_started(&mut self, field: FieldKey) -> StartDecision {
        let before = self.observe(Some(field));
        let state = self.state_mut(field);

        if state.in_flight.is_some() {
            // Edited since the call went out: its answer will be discarded.
            if state.status != VerificationStatus::Verifying {
                state.rerun_requested = true;
            }
            debug!(field = ?field, "Verification already in flight");
            return StartDecision::AlreadyInFlight;
        }

        if state.value.trim().is_empty() {
            return StartDecision::Skipped;
        }

        match state.status {
            VerificationStatus::Verified | VerificationStatus::Duplicate => {
                StartDecision::AlreadySettled
            }
            VerificationStatus::Verifying => StartDecision::AlreadyInFlight,
            VerificationStatus::Unverified | VerificationStatus::Error => {
                let value = state.value.clone();
                state.in_flight = Some(value.clone());
                state.rerun_requested = false;
                state.status = VerificationStatus::Verifying;
                state.last_error = None;

                debug!(field = ?field, "Verification started");
                self.notify(Some(field), before);
                StartDecision::Started { value }
            }
        }
    }

    /// Feed the answer of a backend call for `echoed_value`.
    ///
    /// The outstanding mark is always cleared. The outcome is applied only if
    /// the field is still `Verifying` and holds `echoed_value`; otherwise it
    /// is discarded.
    pub fn verification_resolved(
        &mut self,
        field: FieldKey,
        echoed_value: &str,
        outcome: VerificationOutcome,
    ) -> ResolveDecision {
        let before = self.observe(Some(field));
        let state = self.state_mut(field);

        let was_in_flight = state.in_flight.as_deref() == Some(echoed_value);
        if was_in_flight {
            state.in_flight = None;
        }

        let current = state.status == VerificationStatus::Verifying && state.value == echoed_value;
        if !was_in_flight || !current {
            let rerun = was_in_flight && std::mem::take(&mut state.rerun_requested);
            warn!(field = ?field, rerun, "Discarding stale verification response");
            self.notify(Some(field), before);
            return ResolveDecision::Discarded { rerun };
        }

        state.rerun_requested = false;
        let status = match outcome {
            VerificationOutcome::Clear => {
                state.conflict = None;
                VerificationStatus::Verified
            }
            VerificationOutcome::Duplicate(conflict) => {
                state.conflict = Some(conflict);
                VerificationStatus::Duplicate
            }
            VerificationOutcome::Failed(error) => {
                warn!(field = ?field, error = %error, "Verification failed, field stays unverified");
                state.last_error = Some(error);
                VerificationStatus::Error
            }
        };
        state.status = status;

        debug!(field = ?field, status = %status, "Verification resolved");
        self.notify(Some(field), before);
        ResolveDecision::Applied { status }
    }

    /// The user chose to continue despite a duplicate.
    ///
    /// Legal only for the RFC, only while it is `Duplicate`, and only for the
    /// value currently in the field. The stored exception replaces any
    /// earlier one.
    pub fn override_granted(&mut self, field: FieldKey, value: &str) -> Result<(), AltaError> {
        if field != FieldKey::TaxId {
            return Err(GateError::OverrideFieldNotAllowed { field }.into());
        }

        let state = self.state(field);
        if state.status != VerificationStatus::Duplicate {
            return Err(GateError::OverrideWithoutDuplicate {
                field,
                status: state.status.to_string(),
            }
            .into());
        }
        if state.value != value {
            return Err(GateError::OverrideValueMismatch {
                value: value.to_string(),
            }
            .into());
        }

        let before = self.observe(Some(field));
        self.overrides.grant(field, value)?;
        warn!(field = ?field, "Continuing with duplicate RFC by user decision");
        self.notify(Some(field), before);
        Ok(())
    }

    /// Record that the user confirmed the current email value
    pub fn confirm_email(&mut self) -> Result<(), ValidationError> {
        let email = self.state(FieldKey::Email).value.clone();
        if email.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: FieldKey::Email.wire_name().to_string(),
            });
        }
        let before = self.observe(None);
        self.confirmed_email = Some(email);
        debug!("Email confirmed");
        self.notify(None, before);
        Ok(())
    }

    /// The user rejected the proposed email
    pub fn reject_email(&mut self) {
        let before = self.observe(None);
        self.confirmed_email = None;
        self.notify(None, before);
    }

    /// Drop every verdict, value, confirmation and the override exception.
    ///
    /// Listeners get one change per field whose indicator moved, then one
    /// form-wide change. The gate is reset even when clearing the override
    /// store fails; that error is returned afterwards.
    pub fn reset(&mut self) -> Result<(), StoreError> {
        let form_before = self.observe(None);
        let indicators_before: Vec<(FieldKey, FieldIndicator)> = FieldKey::ALL
            .iter()
            .map(|k| (*k, self.indicator(*k)))
            .collect();

        for state in self.fields.values_mut() {
            *state = FieldState::default();
        }
        self.confirmed_email = None;
        let cleared = self.overrides.clear();

        debug!("Submission gate reset");
        if !self.listeners.is_empty() {
            let after = self.observe(None);
            for (field, before) in indicators_before {
                let indicator = self.indicator(field);
                if indicator != before {
                    self.emit(&StatusChange {
                        field: Some(field),
                        indicator: Some(indicator),
                        email_confirmed: after.email_confirmed,
                        ready: after.ready,
                    });
                }
            }
        }
        self.notify(None, form_before);
        cleared
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// The readiness predicate
    pub fn can_submit(&self) -> bool {
        self.readiness().ready
    }

    /// Readiness with the reasons it is false
    pub fn readiness(&self) -> Readiness {
        let mut blockers = Vec::new();

        // A duplicate email is reported with the other duplicates below.
        let email_status = self.status(FieldKey::Email);
        if !self.email_confirmed() {
            blockers.push(ReadinessBlocker::EmailNotConfirmed);
        } else if !matches!(
            email_status,
            VerificationStatus::Verified | VerificationStatus::Duplicate
        ) {
            blockers.push(ReadinessBlocker::EmailNotVerified);
        }

        let tax = self.state(FieldKey::TaxId);
        let tax_overridden = self.tax_id_overridden();
        match tax.status {
            VerificationStatus::Verified => {}
            _ if tax_overridden => {}
            VerificationStatus::Duplicate => blockers.push(ReadinessBlocker::UnresolvedDuplicate {
                field: FieldKey::TaxId,
            }),
            _ => blockers.push(ReadinessBlocker::TaxIdNotVerified),
        }

        for (field, state) in &self.fields {
            if *field != FieldKey::TaxId && state.status == VerificationStatus::Duplicate {
                blockers.push(ReadinessBlocker::UnresolvedDuplicate { field: *field });
            }
        }

        Readiness::from_blockers(blockers)
    }

    pub fn email_confirmed(&self) -> bool {
        let email = &self.state(FieldKey::Email).value;
        !email.trim().is_empty() && self.confirmed_email.as_deref() == Some(email.as_str())
    }

    pub fn status(&self, field: FieldKey) -> VerificationStatus {
        self.state(field).status
    }

    pub fn value(&self, field: FieldKey) -> &str {
        &self.state(field).value
    }

    pub fn is_in_flight(&self, field: FieldKey) -> bool {
        self.state(field).in_flight.is_some()
    }

    /// Conflicting record reported by the last duplicate verdict
    pub fn conflict(&self, field: FieldKey) -> Option<&ConflictError> {
        self.state(field).conflict.as_ref()
    }

    pub fn last_error(&self, field: FieldKey) -> Option<&TransportError> {
        self.state(field).last_error.as_ref()
    }

    /// Whether the override store holds an exception for the current RFC
    pub fn tax_id_overridden(&self) -> bool {
        let value = &self.state(FieldKey::TaxId).value;
        !value.is_empty() && self.overrides.is_granted(FieldKey::TaxId, value)
    }

    pub fn overrides(&self) -> &dyn OverrideStore {
        self.overrides.as_ref()
    }

    /// Indicator the view layer should render for `field`
    pub fn indicator(&self, field: FieldKey) -> FieldIndicator {
        let state = self.state(field);
        match state.status {
            VerificationStatus::Unverified => FieldIndicator::NotVerified,
            VerificationStatus::Verifying => FieldIndicator::Verifying,
            VerificationStatus::Verified => FieldIndicator::Verified,
            VerificationStatus::Duplicate
                if field == FieldKey::TaxId && self.tax_id_overridden() =>
            {
                FieldIndicator::DuplicateOverridden
            }
            VerificationStatus::Duplicate => FieldIndicator::Duplicate,
            VerificationStatus::Error => FieldIndicator::Error {
                message: state
                    .last_error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "Error".to_string()),
            },
        }
    }

    /// Declarative status-per-field map
    pub fn status_map(&self) -> BTreeMap<FieldKey, FieldIndicator> {
        FieldKey::ALL
            .iter()
            .map(|k| (*k, self.indicator(*k)))
            .collect()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Register a listener called after every change of a field indicator,
    /// the email confirmation or readiness
    pub fn on_status_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: Fn(&StatusChange) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    fn observe(&self, field: Option<FieldKey>) -> Observed {
        Observed {
            indicator: field.map(|f| self.indicator(f)),
            email_confirmed: self.email_confirmed(),
            ready: self.can_submit(),
        }
    }

    fn notify(&self, field: Option<FieldKey>, before: Observed) {
        if self.listeners.is_empty() {
            return;
        }
        let after = self.observe(field);
        if after == before {
            return;
        }
        self.emit(&StatusChange {
            field,
            indicator: after.indicator,
            email_confirmed: after.email_confirmed,
            ready: after.ready,
        });
    }

    fn emit(&self, change: &StatusChange) {
        for (_, listener) in &self.listeners {
            listener(change);
        }
    }

    fn state(&self, field: FieldKey) -> &FieldState {
        // Every key is inserted at construction and never removed.
        &self.fields[&field]
    }

    fn state_mut(&mut self, field: FieldKey) -> &mut FieldState {
        self.fields.entry(field).or_default()
    }
}
