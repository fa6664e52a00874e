//! src/services/upload_service.rs
//!
//! UploadService — stores a PDF, then the textbook row that references it.
//!
//! There is no transaction spanning the object store and SQLite, so the
//! workflow relies on ordering: the object write always completes before the
//! row insert. If the insert fails, the object is deleted again
//! (compensation). A failed compensation leaves an orphaned object; it is
//! logged at `error` level with the storage key and flagged on the error.
//!
//! ```text
//! Validating -> Uploading -> Persisting -> Done
//!                   |             |
//!                   v             v
//!                 Failed <- Compensating
//! ```

use crate::{
    models::textbook::{NewTextbook, Textbook},
    services::{
        object_store::{ObjectStore, ObjectStoreError},
        record_store::{RecordError, RecordStore},
    },
};
use bytes::Bytes;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Raw upload input as parsed from the multipart form; nothing validated yet.
#[derive(Debug, Default, Clone)]
pub struct UploadRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub user_id: Option<String>,
    pub file: Option<UploadedFile>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Validating,
    Uploading,
    Persisting,
    Compensating,
    Done,
    Failed,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validating => "validating",
            Self::Uploading => "uploading",
            Self::Persisting => "persisting",
            Self::Compensating => "compensating",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Input rejected before any side effect.
    #[error("{0}")]
    Validation(String),

    /// The object store refused or failed the write; no row was created.
    #[error(transparent)]
    Storage(ObjectStoreError),

    /// The row insert failed after the object was written.
    #[error("failed to persist textbook for `{storage_key}`: {source}")]
    Persist {
        storage_key: String,
        #[source]
        source: RecordError,
        /// True when the compensating delete also failed.
        orphaned: bool,
    },
}

/// A validated upload, ready for the side-effecting stages.
struct ValidUpload {
    title: String,
    description: Option<String>,
    user_id: Uuid,
    file: UploadedFile,
}

#[derive(Clone)]
pub struct UploadService {
    objects: Arc<dyn ObjectStore>,
    records: RecordStore,
}

impl UploadService {
    pub fn new(objects: Arc<dyn ObjectStore>, records: RecordStore) -> Self {
        Self { objects, records }
    }

    /// Run the full upload workflow and return the created textbook.
    pub async fn upload(&self, request: UploadRequest) -> Result<Textbook, UploadError> {
        let upload = validate(request)?;
        debug!(stage = %UploadStage::Validating, user_id = %upload.user_id, "upload accepted");

        let storage_key = self
            .objects
            .store(upload.file.content, &upload.file.filename, upload.user_id)
            .await
            .map_err(|err| {
                match &err {
                    ObjectStoreError::InvalidFileType { .. } => {
                        debug!(stage = %UploadStage::Failed, error = %err, "upload rejected")
                    }
                    _ => error!(
                        stage = %UploadStage::Uploading,
                        backend = self.objects.backend(),
                        error = %err,
                        "object write failed"
                    ),
                }
                UploadError::Storage(err)
            })?;
        debug!(stage = %UploadStage::Uploading, storage_key = %storage_key, "object stored");

        let new = NewTextbook {
            id: None,
            title: upload.title,
            description: upload.description,
            file_path: storage_key.clone(),
            user_id: upload.user_id,
        };

        match self.records.create(new).await {
            Ok(textbook) => {
                info!(
                    stage = %UploadStage::Done,
                    textbook_id = %textbook.id,
                    storage_key = %storage_key,
                    "textbook uploaded"
                );
                Ok(textbook)
            }
            Err(source) => {
                warn!(
                    stage = %UploadStage::Compensating,
                    storage_key = %storage_key,
                    error = %source,
                    "persisting textbook failed; removing uploaded object"
                );
                let orphaned = self.compensate(&storage_key).await;
                Err(UploadError::Persist {
                    storage_key,
                    source,
                    orphaned,
                })
            }
        }
    }

    /// Delete the just-written object. Returns true when it could not be removed.
    async fn compensate(&self, storage_key: &str) -> bool {
        match self.objects.delete(storage_key).await {
            Ok(()) => {
                info!(stage = %UploadStage::Failed, storage_key, "compensating delete succeeded");
                false
            }
            Err(err) => {
                error!(
                    stage = %UploadStage::Failed,
                    storage_key,
                    backend = self.objects.backend(),
                    error = %err,
                    "compensating delete failed; object is orphaned"
                );
                true
            }
        }
    }
}

fn validate(request: UploadRequest) -> Result<ValidUpload, UploadError> {
    // Title and description are stored as submitted; trimming only decides emptiness.
    let title = request.title.unwrap_or_default();
    let user_id = request.user_id.unwrap_or_default();
    if title.trim().is_empty() || user_id.trim().is_empty() {
        return Err(UploadError::Validation(
            "Title and user_id are required".into(),
        ));
    }

    let user_id = Uuid::parse_str(user_id.trim())
        .map_err(|_| UploadError::Validation("Invalid user_id format".into()))?;

    let file = request
        .file
        .ok_or_else(|| UploadError::Validation("No file uploaded".into()))?;

    let description = request.description.filter(|d| !d.trim().is_empty());

    Ok(ValidUpload {
        title,
        description,
        user_id,
        file,
    })
}
