//! src/services/object_store.rs
//!
//! The object-store contract used by the upload workflow, plus the pieces
//! every backend shares: file-type policy and storage-key derivation.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// The only accepted upload extension (compared lower-cased).
pub const ACCEPTED_EXTENSION: &str = ".pdf";

/// Content type written for every stored object.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Metadata key holding the uploader-supplied filename.
pub const META_ORIGINAL_FILENAME: &str = "original-filename";

/// Metadata key holding the owning user's id.
pub const META_USER_ID: &str = "user-id";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("invalid file type `{filename}`. Only PDF files are allowed")]
    InvalidFileType { filename: String },
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error("failed to write object `{key}`: {source}")]
    Write {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to delete object `{key}`: {source}")]
    Delete {
        key: String,
        #[source]
        source: BoxError,
    },
    #[error("failed to generate URL for object `{key}`: {reason}")]
    Url { key: String, reason: String },
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

impl ObjectStoreError {
    pub fn write(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Write {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn delete(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Delete {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn url(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Url {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// Binary content storage keyed by opaque paths.
///
/// Implementations must make a write either fully visible under its key or
/// not visible at all.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name used in logs and readiness output.
    fn backend(&self) -> &'static str;

    /// Store a PDF for `owner_id` and return the freshly derived key.
    ///
    /// Rejects anything but `.pdf` with `InvalidFileType` before writing.
    async fn store(
        &self,
        content: Bytes,
        original_filename: &str,
        owner_id: Uuid,
    ) -> ObjectStoreResult<String>;

    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, storage_key: &str) -> ObjectStoreResult<()>;

    /// Produce a URL granting read access to `storage_key` for `ttl`.
    async fn presign(&self, storage_key: &str, ttl: Duration) -> ObjectStoreResult<String>;

    /// Readiness probe for the backing store.
    async fn check(&self) -> ObjectStoreResult<()>;
}

/// Extension of the final path segment, including the dot, as written.
///
/// `"notes.PDF"` yields `".PDF"`, `"archive.tar.pdf"` yields `".pdf"`,
/// `"README"` yields `""`.
pub fn file_extension(filename: &str) -> &str {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(idx) => &base[idx..],
        None => "",
    }
}

/// Validate the upload's file type and derive its storage key.
///
/// Key layout: `<owner_id>/<uuid v4><extension>`.
pub fn derive_storage_key(original_filename: &str, owner_id: Uuid) -> ObjectStoreResult<String> {
    let ext = file_extension(original_filename);
    if !ext.eq_ignore_ascii_case(ACCEPTED_EXTENSION) {
        return Err(ObjectStoreError::InvalidFileType {
            filename: original_filename.to_string(),
        });
    }
    Ok(format!("{}/{}{}", owner_id, Uuid::new_v4(), ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_last_dot_of_last_segment() {
        assert_eq!(file_extension("notes.pdf"), ".pdf");
        assert_eq!(file_extension("notes.PDF"), ".PDF");
        assert_eq!(file_extension("archive.tar.pdf"), ".pdf");
        assert_eq!(file_extension("dir.v2/README"), "");
        assert_eq!(file_extension("C:\\docs\\calc.pdf"), ".pdf");
        assert_eq!(file_extension(""), "");
    }

    #[test]
    fn derives_owner_scoped_key() {
        let owner = Uuid::new_v4();
        let key = derive_storage_key("notes.pdf", owner).unwrap();
        let (prefix, name) = key.split_once('/').unwrap();
        assert_eq!(prefix, owner.to_string());
        let stem = name.strip_suffix(".pdf").unwrap();
        assert!(Uuid::parse_str(stem).is_ok());
    }

    #[test]
    fn keeps_original_extension_case() {
        let key = derive_storage_key("Scan.PDF", Uuid::new_v4()).unwrap();
        assert!(key.ends_with(".PDF"));
    }

    #[test]
    fn keys_are_fresh_per_call() {
        let owner = Uuid::new_v4();
        let a = derive_storage_key("a.pdf", owner).unwrap();
        let b = derive_storage_key("a.pdf", owner).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_non_pdf_extensions() {
        for name in ["notes.txt", "notes", "notes.pdf.exe", "pdf", ""] {
            let err = derive_storage_key(name, Uuid::new_v4()).unwrap_err();
            assert!(matches!(err, ObjectStoreError::InvalidFileType { .. }), "{name}");
        }
    }
}
