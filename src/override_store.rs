//! Duplicate Override Store
//!
//! Remembers the single duplicate the user chose to continue with.
//! Implementations can keep it in memory (tests, CLI) or in a small JSON
//! document that survives a reload of the form.
//!
//! The store holds at most one exception. Granting a new one replaces the
//! old one; there is no accumulation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;
use crate::field::FieldKey;

/// The remembered exception
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateOverride {
    pub field: FieldKey,
    pub value: String,
}

/// Abstract store for the duplicate override
pub trait OverrideStore {
    /// Record the exception, replacing any previous one
    fn grant(&mut self, field: FieldKey, value: &str) -> Result<(), StoreError>;

    /// True only if the stored exception is for `field` and its value equals
    /// `current` exactly (case and whitespace sensitive)
    fn is_granted(&self, field: FieldKey, current: &str) -> bool {
        self.current()
            .map(|o| o.field == field && o.value == current)
            .unwrap_or(false)
    }

    /// Forget the exception
    fn clear(&mut self) -> Result<(), StoreError>;

    /// The stored exception, if any
    fn current(&self) -> Option<&DuplicateOverride>;
}

/// In-memory store, lives as long as the form session
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    entry: Option<DuplicateOverride>,
}

impl MemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn grant(&mut self, field: FieldKey, value: &str) -> Result<(), StoreError> {
        self.entry = Some(DuplicateOverride {
            field,
            value: value.to_string(),
        });
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.entry = None;
        Ok(())
    }

    fn current(&self) -> Option<&DuplicateOverride> {
        self.entry.as_ref()
    }
}

/// On-disk record: the allowed flag and the allowed literal value, plus the
/// field and the onboarding session that granted it
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OverrideRecord {
    allowed: bool,
    allowed_value: String,
    field: FieldKey,
    session_id: Uuid,
}

/// File-backed store (one JSON document)
#[derive(Debug)]
pub struct FileOverrideStore {
    path: PathBuf,
    session_id: Uuid,
    entry: Option<DuplicateOverride>,
}

impl FileOverrideStore {
    /// Open the store for an onboarding session.
    ///
    /// A record written by a different session is deleted: an exception is
    /// never carried over to another candidate. A record from the same
    /// session (a reload) is kept. A record that cannot be read or decoded
    /// is deleted as well.
    pub fn open_session(path: impl Into<PathBuf>, session_id: Uuid) -> Result<Self, StoreError> {
        let path = path.into();
        let mut store = Self {
            path,
            session_id,
            entry: None,
        };

        let record = match store.read_record() {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    path = %store.path.display(),
                    error = %e,
                    "Discarding unreadable duplicate override record"
                );
                store.clear()?;
                None
            }
        };

        match record {
            Some(record) if record.session_id == session_id && record.allowed => {
                debug!(field = ?record.field, "Restored duplicate override for session");
                store.entry = Some(DuplicateOverride {
                    field: record.field,
                    value: record.allowed_value,
                });
            }
            Some(record) => {
                info!(
                    previous_session = %record.session_id,
                    "Discarding duplicate override left by another session"
                );
                store.clear()?;
            }
            None => {}
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn read_record(&self) -> Result<Option<OverrideRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Write through a sibling temp file and rename
    fn write_record(&self, record: &OverrideRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(record)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl OverrideStore for FileOverrideStore {
    fn grant(&mut self, field: FieldKey, value: &str) -> Result<(), StoreError> {
        self.write_record(&OverrideRecord {
            allowed: true,
            allowed_value: value.to_string(),
            field,
            session_id: self.session_id,
        })?;
        self.entry = Some(DuplicateOverride {
            field,
            value: value.to_string(),
        });
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        self.entry = None;
        Ok(())
    }

    fn current(&self) -> Option<&DuplicateOverride> {
        self.entry.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        let mut store = MemoryOverrideStore::new();
        store.grant(FieldKey::TaxId, "ABC123456XYZ").unwrap();

        assert!(store.is_granted(FieldKey::TaxId, "ABC123456XYZ"));
        assert!(!store.is_granted(FieldKey::TaxId, "abc123456xyz"));
        assert!(!store.is_granted(FieldKey::TaxId, "ABC123456XYZ "));
        assert!(!store.is_granted(FieldKey::NationalId, "ABC123456XYZ"));
    }

    #[test]
    fn test_new_grant_replaces_old() {
        let mut store = MemoryOverrideStore::new();
        store.grant(FieldKey::TaxId, "FIRST0000001").unwrap();
        store.grant(FieldKey::TaxId, "SECOND000002").unwrap();

        assert!(!store.is_granted(FieldKey::TaxId, "FIRST0000001"));
        assert!(store.is_granted(FieldKey::TaxId, "SECOND000002"));

        store.clear().unwrap();
        assert!(store.current().is_none());
        assert!(!store.is_granted(FieldKey::TaxId, "SECOND000002"));
    }

    #[test]
    fn test_file_store_survives_reload_in_same_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.json");
        let session = Uuid::new_v4();

        let mut store = FileOverrideStore::open_session(&path, session).unwrap();
        store.grant(FieldKey::TaxId, "ABC123456XYZ").unwrap();
        drop(store);

        let reopened = FileOverrideStore::open_session(&path, session).unwrap();
        assert!(reopened.is_granted(FieldKey::TaxId, "ABC123456XYZ"));
    }

    #[test]
    fn test_file_store_cleared_for_new_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.json");

        let mut store = FileOverrideStore::open_session(&path, Uuid::new_v4()).unwrap();
        store.grant(FieldKey::TaxId, "ABC123456XYZ").unwrap();
        drop(store);

        let other = FileOverrideStore::open_session(&path, Uuid::new_v4()).unwrap();
        assert!(!other.is_granted(FieldKey::TaxId, "ABC123456XYZ"));
        assert!(!path.exists());
    }

    #[test]
    fn test_file_store_record_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("override.json");
        let mut store = FileOverrideStore::open_session(&path, Uuid::new_v4()).unwrap();
        store.grant(FieldKey::TaxId, "ABC123456XYZ").unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["allowed"], serde_json::json!(true));
        assert_eq!(raw["allowed_value"], serde_json::json!("ABC123456XYZ"));
        assert_eq!(raw["field"], serde_json::json!("tax_id"));

        store.clear().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_file_store_discards_truncated_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.json");
        std::fs::write(&path, r#"{"allowed": tru"#).unwrap();

        let store = FileOverrideStore::open_session(&path, Uuid::new_v4()).unwrap();
        assert!(store.current().is_none());
        assert!(!path.exists());
    }
}
