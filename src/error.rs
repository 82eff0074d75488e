//! Error handling for the onboarding form core
//!
//! The taxonomy separates what the user can fix locally
//! ([`ValidationError`]), what needs an explicit decision ([`ConflictError`]),
//! and what is a failure of the backend or the network ([`TransportError`]).
//! Conflict and transport outcomes reach the submission gate as state
//! transitions; validation errors stay with the caller.

use thiserror::Error;

use crate::field::FieldKey;
use crate::gate::ReadinessBlocker;

/// Main error type for the onboarding form core
#[derive(Error, Debug)]
pub enum AltaError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Override store error: {0}")]
    Store(#[from] StoreError),
}

/// Locally correctable input errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("RFC must be 12 or 13 characters, got {length}")]
    TaxIdLength { length: usize },

    #[error("RFC '{value}' does not match the expected pattern")]
    TaxIdPattern { value: String },

    #[error("CURP '{value}' does not match the expected pattern")]
    NationalIdPattern { value: String },

    #[error("Email '{value}' is not an institutional address ({domain})")]
    EmailDomain { value: String, domain: String },

    #[error("No candidate email: first and last name must contain at least one letter")]
    NoCandidateEmail,

    #[error("Required field '{field}' is missing")]
    MissingField { field: String },

    #[error("Invalid date '{value}' for '{field}': expected YYYY-MM-DD")]
    InvalidDate { field: String, value: String },

    #[error("Position {position_id} is not in the catalogue of area {area_id}")]
    UnknownPosition { area_id: u32, position_id: u32 },

    #[error("File '{file_name}' exceeds the maximum size of {max_bytes} bytes")]
    FileTooLarge { file_name: String, max_bytes: u64 },

    #[error("File '{file_name}' could not be read: {message}")]
    UnreadableFile { file_name: String, message: String },

    #[error("File '{file_name}' has unsupported type '{content_type}' (PDF, JPG or PNG only)")]
    UnsupportedFileType {
        file_name: String,
        content_type: String,
    },
}

/// A duplicate record was found for a field value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field} '{value}' is already registered")]
pub struct ConflictError {
    pub field: FieldKey,
    pub value: String,
    pub existing: Option<alta_types::ExistingCollaborator>,
}

/// Network or backend failure; always treated as "unverified"
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("Backend returned HTTP {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Backend reported an error for {endpoint}: {message}")]
    Backend { endpoint: String, message: String },

    #[error("Could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("Invalid backend URL: {0}")]
    Url(String),
}

/// Illegal gate transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GateError {
    #[error("Overrides are only allowed for the RFC field, not {field}")]
    OverrideFieldNotAllowed { field: FieldKey },

    #[error("Override requires a detected duplicate, but {field} is {status}")]
    OverrideWithoutDuplicate { field: FieldKey, status: String },

    #[error("Override value '{value}' does not match the current field value")]
    OverrideValueMismatch { value: String },

    #[error("Form is not ready to submit: {}", format_blockers(.blockers))]
    NotReady { blockers: Vec<ReadinessBlocker> },
}

fn format_blockers(blockers: &[ReadinessBlocker]) -> String {
    blockers
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Persistence errors of the duplicate override store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias for the crate
pub type Result<T> = std::result::Result<T, AltaError>;
