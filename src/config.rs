//! Runtime configuration
//!
//! Loaded once at startup from environment variables or a YAML file.
//! Every field has a default matching the production onboarding form.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_EMAIL_DOMAIN: &str = "@marnezdesarrollos.com";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Onboarding form configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AltaConfig {
    /// Backend base URL (scheme, host, port, optional path prefix)
    pub base_url: String,
    /// Institutional email domain suffix, including the `@`
    pub email_domain: String,
    /// HTTP request timeout
    pub http_timeout_secs: u64,
    /// Delay after the last name/surname edit before proposing an email
    pub name_debounce_ms: u64,
    /// Delay after the last identifier edit before verifying it
    pub field_debounce_ms: u64,
    /// Largest accepted attachment
    pub max_file_size: u64,
    /// Number of documents the form expects
    pub expected_documents: usize,
    /// Where the duplicate override survives reloads; memory only when unset
    pub override_file: Option<PathBuf>,
    /// Area whose positions follow the commercial flow
    pub commercial_area_id: u32,
    /// Commercial position paid by commission only
    pub advisor_position_id: u32,
}

impl Default for AltaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            email_domain: DEFAULT_EMAIL_DOMAIN.to_string(),
            http_timeout_secs: 30,
            name_debounce_ms: 500,
            field_debounce_ms: 800,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            expected_documents: 9,
            override_file: None,
            commercial_area_id: 2,
            advisor_position_id: 8,
        }
    }
}

impl AltaConfig {
    /// Defaults overridden by `ALTA_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env_string("ALTA_BASE_URL") {
            config.base_url = v;
        }
        if let Some(v) = env_string("ALTA_EMAIL_DOMAIN") {
            config.email_domain = v;
        }
        if let Some(v) = env_parsed("ALTA_HTTP_TIMEOUT_SECS")? {
            config.http_timeout_secs = v;
        }
        if let Some(v) = env_parsed("ALTA_NAME_DEBOUNCE_MS")? {
            config.name_debounce_ms = v;
        }
        if let Some(v) = env_parsed("ALTA_FIELD_DEBOUNCE_MS")? {
            config.field_debounce_ms = v;
        }
        if let Some(v) = env_parsed("ALTA_MAX_FILE_SIZE")? {
            config.max_file_size = v;
        }
        if let Some(v) = env_parsed("ALTA_EXPECTED_DOCUMENTS")? {
            config.expected_documents = v;
        }
        if let Some(v) = env_string("ALTA_OVERRIDE_FILE") {
            config.override_file = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parsed("ALTA_COMMERCIAL_AREA_ID")? {
            config.commercial_area_id = v;
        }
        if let Some(v) = env_parsed("ALTA_ADVISOR_POSITION_ID")? {
            config.advisor_position_id = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file; missing keys take their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.email_domain.starts_with('@') || self.email_domain.len() < 4 {
            return Err(ConfigError::InvalidValue {
                key: "email_domain".to_string(),
                value: self.email_domain.clone(),
                reason: "expected a suffix such as @example.com".to_string(),
            });
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: "base_url".to_string(),
                value: self.base_url.clone(),
                reason: "not an absolute URL".to_string(),
            });
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn name_debounce(&self) -> Duration {
        Duration::from_millis(self.name_debounce_ms)
    }

    pub fn field_debounce(&self) -> Duration {
        Duration::from_millis(self.field_debounce_ms)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}
