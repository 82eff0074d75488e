//! alta-colaborador - Employee Onboarding Form Core
//!
//! Client-side core of the "alta de colaborador" form: field normalization,
//! format checks, duplicate checks against the backend, the duplicate
//! override, document staging, area/position selection and the final
//! submission.
//!
//! ## Architecture
//! Every edit flows through one submission gate:
//! Edit -> Normalize -> Gate (Unverified) -> Debounce -> Verification Client
//!      -> Gate (Verified | Duplicate | Error) -> Readiness -> Submit
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use alta_colaborador::client::InMemoryVerificationClient;
//! use alta_colaborador::{AltaConfig, FieldKey, FormSession};
//!
//! # async fn run() -> alta_colaborador::Result<()> {
//! let session = FormSession::new(InMemoryVerificationClient::new(), &AltaConfig::default())?;
//! session.names_changed("María", "Del Río").await;
//! session.confirm_email()?;
//! session.field_changed(FieldKey::TaxId, "ABC123456XYZ").await?;
//! assert!(session.can_submit());
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Configuration
pub mod config;

// Checked fields and their wire names
pub mod field;

// Pure input handling
pub mod normalize;
pub mod validation;

// Backend contract
pub mod client;

// Duplicate override persistence
pub mod override_store;

// The submission gate state machine
pub mod gate;

// Session wiring
pub mod debounce;
pub mod session;

// Supporting form features
pub mod area;
pub mod documents;
pub mod submission;

pub use config::AltaConfig;
pub use error::{
    AltaError, ConfigError, ConflictError, GateError, Result, StoreError, TransportError,
    ValidationError,
};
pub use field::FieldKey;
pub use gate::{FieldIndicator, Readiness, ReadinessBlocker, SubmissionGate, VerificationStatus};
pub use session::FormSession;
