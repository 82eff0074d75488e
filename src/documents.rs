//! Document staging
//!
//! Holds the attachments chosen for the onboarding documents until the form
//! is submitted. Documents are keyed by their display name (e.g.
//! "Comprobante de domicilio"); staging a document under a name that already
//! has one replaces it.

use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::config::AltaConfig;
use crate::error::ValidationError;

/// Content types the backend accepts
pub const ALLOWED_CONTENT_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/jpg", "image/png"];

/// Content type for a file name, by extension
pub fn content_type_for(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some("application/pdf"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// One staged attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDocument {
    /// Document slot, sent as `documentos_nombres[]`
    pub name: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl StagedDocument {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone)]
pub struct DocumentStager {
    max_file_size: u64,
    expected: usize,
    documents: BTreeMap<String, StagedDocument>,
}

impl DocumentStager {
    pub fn new(max_file_size: u64, expected: usize) -> Self {
        Self {
            max_file_size,
            expected,
            documents: BTreeMap::new(),
        }
    }

    pub fn from_config(config: &AltaConfig) -> Self {
        Self::new(config.max_file_size, config.expected_documents)
    }

    /// Stage `bytes` under `name`, replacing any earlier upload for it
    pub fn stage(
        &mut self,
        name: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<&StagedDocument, ValidationError> {
        let content_type = content_type.trim().to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
            return Err(ValidationError::UnsupportedFileType {
                file_name: file_name.to_string(),
                content_type,
            });
        }
        if bytes.len() as u64 > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                file_name: file_name.to_string(),
                max_bytes: self.max_file_size,
            });
        }

        let replaced = self
            .documents
            .insert(
                name.to_string(),
                StagedDocument {
                    name: name.to_string(),
                    file_name: file_name.to_string(),
                    content_type,
                    bytes,
                },
            )
            .is_some();
        debug!(document = name, file_name, replaced, "Document staged");

        let (loaded, total) = self.progress();
        debug!(loaded, total, "Document progress");

        Ok(&self.documents[name])
    }

    /// Stage a file from disk, inferring the type from its extension.
    ///
    /// The size is checked before the file is read.
    pub fn stage_file(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> Result<&StagedDocument, ValidationError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let content_type =
            content_type_for(&file_name).ok_or_else(|| ValidationError::UnsupportedFileType {
                file_name: file_name.clone(),
                content_type: "unknown".to_string(),
            })?;

        let unreadable = |e: std::io::Error| ValidationError::UnreadableFile {
            file_name: file_name.clone(),
            message: e.to_string(),
        };
        let size = std::fs::metadata(path).map_err(unreadable)?.len();
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                file_name: file_name.clone(),
                max_bytes: self.max_file_size,
            });
        }
        let bytes = std::fs::read(path).map_err(unreadable)?;

        self.stage(name, &file_name, content_type, bytes)
    }

    pub fn remove(&mut self, name: &str) -> Option<StagedDocument> {
        let removed = self.documents.remove(name);
        if removed.is_some() {
            debug!(document = name, "Document removed");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<&StagedDocument> {
        self.documents.get(name)
    }

    /// `(loaded, expected)`
    pub fn progress(&self) -> (usize, usize) {
        (self.documents.len(), self.expected)
    }

    pub fn is_complete(&self) -> bool {
        self.documents.len() >= self.expected
    }

    pub fn documents(&self) -> impl Iterator<Item = &StagedDocument> {
        self.documents.values()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stager() -> DocumentStager {
        DocumentStager::new(1024, 3)
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("ine.PDF"), Some("application/pdf"));
        assert_eq!(content_type_for("foto.jpeg"), Some("image/jpeg"));
        assert_eq!(content_type_for("acta.png"), Some("image/png"));
        assert_eq!(content_type_for("cv.docx"), None);
        assert_eq!(content_type_for("sin_extension"), None);
    }

    #[test]
    fn test_stage_replace_and_remove() {
        let mut docs = stager();
        docs.stage("INE", "ine.pdf", "application/pdf", vec![1, 2, 3])
            .unwrap();
        docs.stage("INE", "ine_v2.png", "image/png", vec![4]).unwrap();
        assert_eq!(docs.progress(), (1, 3));
        assert_eq!(docs.get("INE").unwrap().file_name, "ine_v2.png");

        assert!(docs.remove("INE").is_some());
        assert!(docs.remove("INE").is_none());
        assert_eq!(docs.progress(), (0, 3));
    }

    #[test]
    fn test_rejects_large_and_foreign_files() {
        let mut docs = stager();
        let err = docs
            .stage("CV", "cv.pdf", "application/pdf", vec![0; 1025])
            .unwrap_err();
        assert!(matches!(err, ValidationError::FileTooLarge { max_bytes: 1024, .. }));

        let err = docs
            .stage("CV", "cv.docx", "application/msword", vec![0; 10])
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedFileType { .. }));
        assert_eq!(docs.progress(), (0, 3));
    }

    #[test]
    fn test_stage_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curp.png");
        std::fs::write(&path, b"png-bytes").unwrap();

        let mut docs = stager();
        let staged = docs.stage_file("CURP", &path).unwrap();
        assert_eq!(staged.content_type, "image/png");
        assert_eq!(staged.size(), 9);
        assert!(!docs.is_complete());
    }
}
