//! Form Session
//!
//! One onboarding form being filled in. The session owns the submission
//! gate, the verification client and the debounce timers, and is the
//! surface a UI layer drives: it reports edits, asks for verifications and
//! finally submits.
//!
//! The session is single-threaded. The gate lives in a `RefCell` and no
//! borrow is held across an await, so concurrent futures of the same session
//! (one per field) can be joined on a current-thread runtime.
//!
//! ```ignore
//! let session = FormSession::new(client, &config)?;
//! session.names_changed("María", "Del Río").await;   // proposes the email
//! session.confirm_email()?;
//! session.field_changed(FieldKey::TaxId, "abc123456xyz").await?;
//! if session.can_submit() {
//!     session.submit(&form, &role, &mut documents).await?;
//! }
//! ```

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::area::{AreaRules, AreaSelection, PositionRole};
use crate::client::{verify_value, VerificationClient};
use crate::config::AltaConfig;
use crate::debounce::Debouncer;
use crate::documents::DocumentStager;
use crate::error::{AltaError, ConflictError, GateError, StoreError, TransportError, ValidationError};
use crate::field::FieldKey;
use crate::gate::{
    FieldIndicator, ListenerId, Readiness, ResolveDecision, StartDecision, StatusChange,
    SubmissionGate,
};
use crate::normalize::sanitize_tax_id;
use crate::override_store::{FileOverrideStore, MemoryOverrideStore, OverrideStore};
use crate::submission::{FormData, Submission, SubmissionOutcome};
use crate::validation::FormatRules;

pub struct FormSession<C> {
    client: C,
    gate: RefCell<SubmissionGate>,
    rules: FormatRules,
    area_rules: AreaRules,
    field_timers: Debouncer<FieldKey>,
    name_timer: Debouncer<()>,
    session_id: Uuid,
}

impl<C: VerificationClient> FormSession<C> {
    /// Start a new onboarding session
    pub fn new(client: C, config: &AltaConfig) -> Result<Self, AltaError> {
        Self::resume(client, config, Uuid::new_v4())
    }

    /// Continue `session_id` after a reload. A persisted duplicate override
    /// is kept only if it was granted in this same session.
    pub fn resume(client: C, config: &AltaConfig, session_id: Uuid) -> Result<Self, AltaError> {
        let overrides: Box<dyn OverrideStore> = match &config.override_file {
            Some(path) => Box::new(FileOverrideStore::open_session(path, session_id)?),
            None => Box::new(MemoryOverrideStore::new()),
        };
        let session = Self::with_gate(
            client,
            config,
            SubmissionGate::with_override_store(overrides),
            session_id,
        )?;
        info!(session_id = %session_id, "Onboarding session started");
        Ok(session)
    }

    pub fn with_gate(
        client: C,
        config: &AltaConfig,
        gate: SubmissionGate,
        session_id: Uuid,
    ) -> Result<Self, AltaError> {
        Ok(Self {
            client,
            gate: RefCell::new(gate),
            rules: FormatRules::new(&config.email_domain)?,
            area_rules: AreaRules::from_config(config),
            field_timers: Debouncer::new(config.field_debounce()),
            name_timer: Debouncer::new(config.name_debounce()),
            session_id,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn rules(&self) -> &FormatRules {
        &self.rules
    }

    /// Read access to the gate. Do not hold the guard across an await.
    pub fn gate(&self) -> Ref<'_, SubmissionGate> {
        self.gate.borrow()
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// First name or surname changed.
    ///
    /// After the name debounce, proposes `nombre.apellido@domain` as the
    /// email and checks it for duplicates. Returns the proposal, or `None`
    /// when superseded by a newer edit, when the email is already confirmed,
    /// or when either name has no usable letters.
    pub async fn names_changed(&self, first: &str, last: &str) -> Option<String> {
        let ticket = self.name_timer.arm(());
        if !self.name_timer.settle(ticket).await {
            return None;
        }

        if self.gate.borrow().email_confirmed() {
            debug!("Email already confirmed, not proposing a new one");
            return None;
        }

        let email = match self.rules.candidate_email(first, last) {
            Ok(email) => email,
            Err(e) => {
                debug!(error = %e, "No email proposed");
                return None;
            }
        };
        if self.gate.borrow().value(FieldKey::Email) != email {
            self.gate.borrow_mut().field_edited(FieldKey::Email, &email);
        }
        self.verify(FieldKey::Email).await;
        Some(email)
    }

    /// A checked field changed.
    ///
    /// The value is sanitized and the field drops to unverified at once.
    /// After the field debounce, a value that passes the local format check
    /// is verified against the backend. `Ok(None)` means a newer edit
    /// superseded this one.
    pub async fn field_changed(
        &self,
        field: FieldKey,
        raw: &str,
    ) -> Result<Option<FieldIndicator>, ValidationError> {
        let value = sanitize(field, raw);
        self.gate.borrow_mut().field_edited(field, &value);

        let ticket = self.field_timers.arm(field);
        if !self.field_timers.settle(ticket).await {
            return Ok(None);
        }

        self.check_format(field, &value)?;
        Ok(Some(self.verify(field).await))
    }

    fn check_format(&self, field: FieldKey, value: &str) -> Result<(), ValidationError> {
        match field {
            FieldKey::TaxId => self.rules.validate_tax_id(value),
            FieldKey::NationalId => self.rules.validate_national_id(value),
            FieldKey::Email => self.rules.validate_email(value),
            FieldKey::SocialSecurityNumber => Ok(()),
        }
    }

    /// Verify the field's current value, at most one call at a time.
    ///
    /// When the answer comes back for a value the field no longer holds and a
    /// verification was asked for meanwhile, the check runs again for the
    /// new value.
    pub async fn verify(&self, field: FieldKey) -> FieldIndicator {
        loop {
            let decision = self.gate.borrow_mut().verification_started(field);
            let value = match decision {
                StartDecision::Started { value } => value,
                _ => break,
            };

            let outcome = verify_value(&self.client, field, &value).await;

            let resolved = self
                .gate
                .borrow_mut()
                .verification_resolved(field, &value, outcome);
            match resolved {
                ResolveDecision::Discarded { rerun: true } => {
                    debug!(field = ?field, "Re-running verification for the new value");
                }
                _ => break,
            }
        }
        self.indicator(field)
    }

    // ------------------------------------------------------------------
    // Decisions
    // ------------------------------------------------------------------

    /// Confirm the email currently in the field
    pub fn confirm_email(&self) -> Result<(), ValidationError> {
        let email = self.gate.borrow().value(FieldKey::Email).to_string();
        self.rules.validate_email(&email)?;
        self.gate.borrow_mut().confirm_email()
    }

    pub fn reject_email(&self) {
        self.gate.borrow_mut().reject_email();
    }

    /// Continue with the duplicate RFC currently in the field
    pub fn grant_tax_id_override(&self) -> Result<(), AltaError> {
        let value = self.gate.borrow().value(FieldKey::TaxId).to_string();
        self.gate
            .borrow_mut()
            .override_granted(FieldKey::TaxId, &value)
    }

    /// Record reported by the last duplicate verdict, for display
    pub fn last_conflict(&self, field: FieldKey) -> Option<ConflictError> {
        self.gate.borrow().conflict(field).cloned()
    }

    pub async fn select_area(&self, area_id: u32) -> Result<AreaSelection, TransportError> {
        AreaSelection::resolve(area_id, self.area_rules, &self.client).await
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Post the form.
    ///
    /// Refused unless the gate is ready. The checked fields are taken from
    /// the gate, so what was verified is what is sent. An accepted
    /// submission resets the gate and clears the staged documents; it is
    /// reported as accepted even if the override store cannot be cleared.
    pub async fn submit(
        &self,
        form: &FormData,
        role: &PositionRole,
        documents: &mut DocumentStager,
    ) -> Result<SubmissionOutcome, AltaError> {
        let readiness = self.readiness();
        if !readiness.ready {
            return Err(GateError::NotReady {
                blockers: readiness.blockers,
            }
            .into());
        }

        let mut form = form.clone();
        {
            let gate = self.gate.borrow();
            for field in FieldKey::ALL {
                let value = gate.value(field);
                if !value.is_empty() {
                    form.set(field.wire_name(), value.to_string());
                }
            }
        }

        let submission = Submission::build(&form, role, documents, &self.rules)?;
        let outcome = self.client.submit(&submission).await?;

        match &outcome {
            SubmissionOutcome::Accepted => {
                info!(session_id = %self.session_id, "Collaborator registered");
                documents.clear();
                // The collaborator is already stored at this point.
                if let Err(e) = self.reset() {
                    warn!(
                        session_id = %self.session_id,
                        error = %e,
                        "Could not clear the duplicate override after submission"
                    );
                }
            }
            SubmissionOutcome::Rejected { message } => {
                warn!(
                    session_id = %self.session_id,
                    message = message.as_deref().unwrap_or(""),
                    "Submission rejected by server-side validation"
                );
            }
        }
        Ok(outcome)
    }

    /// Drop every verdict, the email confirmation and the override
    pub fn reset(&self) -> Result<(), StoreError> {
        for field in FieldKey::ALL {
            self.field_timers.cancel(field);
        }
        self.name_timer.cancel(());
        self.gate.borrow_mut().reset()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn can_submit(&self) -> bool {
        self.gate.borrow().can_submit()
    }

    pub fn readiness(&self) -> Readiness {
        self.gate.borrow().readiness()
    }

    pub fn indicator(&self, field: FieldKey) -> FieldIndicator {
        self.gate.borrow().indicator(field)
    }

    pub fn status_map(&self) -> BTreeMap<FieldKey, FieldIndicator> {
        self.gate.borrow().status_map()
    }

    /// Register a status listener.
    ///
    /// Listeners run while the gate is being updated and must not call back
    /// into the session.
    pub fn on_status_change<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&StatusChange) + 'static,
    {
        self.gate.borrow_mut().on_status_change(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.gate.borrow_mut().remove_listener(id)
    }
}

/// Input clean-up applied before a value reaches the gate
fn sanitize(field: FieldKey, raw: &str) -> String {
    match field {
        FieldKey::TaxId => sanitize_tax_id(raw),
        FieldKey::NationalId => raw.trim().to_uppercase(),
        FieldKey::Email => raw.trim().to_lowercase(),
        FieldKey::SocialSecurityNumber => raw.trim().to_string(),
    }
}
