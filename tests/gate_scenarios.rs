//! Submission gate scenarios
//!
//! Drives the gate directly through its transitions, the way a UI layer
//! with its own scheduling would.

use alta_colaborador::gate::{
    ResolveDecision, StartDecision, SubmissionGate, VerificationOutcome, VerificationStatus,
};
use alta_colaborador::normalize::{institutional_email, normalize_local_part};
use alta_colaborador::override_store::{FileOverrideStore, OverrideStore};
use alta_colaborador::{
    ConflictError, FieldIndicator, FieldKey, ReadinessBlocker, TransportError,
};
use uuid::Uuid;

const DOMAIN: &str = "@marnezdesarrollos.com";

fn duplicate(field: FieldKey, value: &str) -> VerificationOutcome {
    VerificationOutcome::Duplicate(ConflictError {
        field,
        value: value.to_string(),
        existing: None,
    })
}

fn start(gate: &mut SubmissionGate, field: FieldKey) -> String {
    match gate.verification_started(field) {
        StartDecision::Started { value } => value,
        other => panic!("expected the check to start, got {:?}", other),
    }
}

fn confirmed_email_gate(gate: &mut SubmissionGate) {
    let email = institutional_email("María", "Del Río", DOMAIN).unwrap();
    gate.field_edited(FieldKey::Email, &email);
    let value = start(gate, FieldKey::Email);
    gate.verification_resolved(FieldKey::Email, &value, VerificationOutcome::Clear);
    gate.confirm_email().unwrap();
}

#[test]
fn test_names_build_institutional_email() {
    assert_eq!(normalize_local_part("María"), "maria");
    assert_eq!(normalize_local_part("Del Río"), "del");
    assert_eq!(
        institutional_email("María", "Del Río", DOMAIN).as_deref(),
        Some("maria.del@marnezdesarrollos.com")
    );
    assert_eq!(normalize_local_part("José"), "jose");
    assert_eq!(normalize_local_part("Ñoño"), "nono");
    assert_eq!(normalize_local_part("   "), "");
    assert_eq!(institutional_email("   ", "López", DOMAIN), None);
}

#[test]
fn test_editing_verified_rfc_drops_readiness_immediately() {
    let mut gate = SubmissionGate::new();
    confirmed_email_gate(&mut gate);
    gate.field_edited(FieldKey::TaxId, "ABC123456XYZ");
    let value = start(&mut gate, FieldKey::TaxId);
    gate.verification_resolved(FieldKey::TaxId, &value, VerificationOutcome::Clear);
    assert!(gate.can_submit());

    gate.field_edited(FieldKey::TaxId, "ABC123456XY");
    assert!(!gate.can_submit());
    assert_eq!(gate.indicator(FieldKey::TaxId), FieldIndicator::NotVerified);
}

#[test]
fn test_rapid_triggers_start_one_check() {
    let mut gate = SubmissionGate::new();
    gate.field_edited(FieldKey::SocialSecurityNumber, "12345678901");

    let mut started = 0;
    for _ in 0..5 {
        if matches!(
            gate.verification_started(FieldKey::SocialSecurityNumber),
            StartDecision::Started { .. }
        ) {
            started += 1;
        }
    }
    assert_eq!(started, 1);
}

#[test]
fn test_override_follows_exact_rfc_value() {
    let mut gate = SubmissionGate::new();
    confirmed_email_gate(&mut gate);

    gate.field_edited(FieldKey::TaxId, "ABC123456XYZ");
    let value = start(&mut gate, FieldKey::TaxId);
    gate.verification_resolved(
        FieldKey::TaxId,
        &value,
        duplicate(FieldKey::TaxId, "ABC123456XYZ"),
    );
    gate.override_granted(FieldKey::TaxId, "ABC123456XYZ").unwrap();

    // Readiness now depends only on the email while the RFC matches
    assert!(gate.can_submit());
    gate.reject_email();
    assert!(!gate.can_submit());
    gate.confirm_email().unwrap();
    assert!(gate.can_submit());

    // A different RFC makes the stored exception inert
    gate.field_edited(FieldKey::TaxId, "ABC123456XYA");
    assert!(!gate.can_submit());
    assert!(!gate.tax_id_overridden());
}

#[test]
fn test_late_answer_for_old_rfc_is_ignored() {
    let mut gate = SubmissionGate::new();
    confirmed_email_gate(&mut gate);

    gate.field_edited(FieldKey::TaxId, "ABC123456XYZ");
    let old = start(&mut gate, FieldKey::TaxId);
    gate.field_edited(FieldKey::TaxId, "ABC123456XYA");

    let decision = gate.verification_resolved(FieldKey::TaxId, &old, VerificationOutcome::Clear);
    assert!(matches!(decision, ResolveDecision::Discarded { .. }));
    assert_ne!(gate.status(FieldKey::TaxId), VerificationStatus::Verified);
    assert!(!gate.can_submit());
}

#[test]
fn test_reset_after_submission_forgets_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("override.json");
    let store = FileOverrideStore::open_session(&path, Uuid::new_v4()).unwrap();
    let mut gate = SubmissionGate::with_override_store(Box::new(store));
    confirmed_email_gate(&mut gate);

    gate.field_edited(FieldKey::TaxId, "ABC123456XYZ");
    let value = start(&mut gate, FieldKey::TaxId);
    gate.verification_resolved(
        FieldKey::TaxId,
        &value,
        duplicate(FieldKey::TaxId, "ABC123456XYZ"),
    );
    gate.override_granted(FieldKey::TaxId, "ABC123456XYZ").unwrap();
    assert!(path.exists());

    gate.reset().unwrap();

    assert!(!gate.overrides().is_granted(FieldKey::TaxId, "ABC123456XYZ"));
    assert!(!path.exists());
    for field in FieldKey::ALL {
        assert_eq!(gate.status(field), VerificationStatus::Unverified);
        assert_eq!(gate.value(field), "");
    }
}

#[test]
fn test_status_map_covers_every_field() {
    let mut gate = SubmissionGate::new();
    gate.field_edited(FieldKey::NationalId, "PEJJ800101HDFRRN09");
    start(&mut gate, FieldKey::NationalId);

    let map = gate.status_map();
    assert_eq!(map.len(), FieldKey::ALL.len());
    assert_eq!(map[&FieldKey::NationalId], FieldIndicator::Verifying);
    assert_eq!(map[&FieldKey::TaxId], FieldIndicator::NotVerified);
    assert_eq!(
        map[&FieldKey::NationalId].message(FieldKey::NationalId),
        "Verificando CURP..."
    );
}

#[test]
fn test_email_check_failure_keeps_form_locked() {
    let mut gate = SubmissionGate::new();
    let email = institutional_email("María", "Del Río", DOMAIN).unwrap();
    gate.field_edited(FieldKey::Email, &email);
    let value = start(&mut gate, FieldKey::Email);
    gate.confirm_email().unwrap();

    gate.field_edited(FieldKey::TaxId, "ABC123456XYZ");
    let rfc = start(&mut gate, FieldKey::TaxId);
    gate.verification_resolved(FieldKey::TaxId, &rfc, VerificationOutcome::Clear);

    // Confirmed, but the duplicate check is still outstanding
    assert!(!gate.can_submit());

    gate.verification_resolved(
        FieldKey::Email,
        &value,
        VerificationOutcome::Failed(TransportError::Status {
            endpoint: "/api/verificar-duplicado".to_string(),
            status: 503,
        }),
    );
    assert_eq!(gate.status(FieldKey::Email), VerificationStatus::Error);
    assert!(gate.email_confirmed());
    assert!(!gate.can_submit());
    assert_eq!(
        gate.readiness().blockers,
        vec![ReadinessBlocker::EmailNotVerified]
    );
}
