//! Shared application state, created once at startup and cloned into handlers.

use crate::{
    config::AppConfig,
    services::{
        local_store::LocalObjectStore, object_store::ObjectStore, record_store::RecordStore,
        upload_service::UploadService, user_store::UserStore,
    },
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub records: RecordStore,
    pub users: UserStore,
    pub objects: Arc<dyn ObjectStore>,
    pub uploads: UploadService,
    pub config: Arc<AppConfig>,
    /// Set when the local backend is active; serves presigned `/files` requests.
    pub local_files: Option<Arc<LocalObjectStore>>,
}

impl AppState {
    /// Wire the stores together around one pool and one object store.
    pub fn new(
        db: Arc<SqlitePool>,
        objects: Arc<dyn ObjectStore>,
        local_files: Option<Arc<LocalObjectStore>>,
        config: Arc<AppConfig>,
    ) -> Self {
        let records = RecordStore::new(db.clone());
        Self {
            uploads: UploadService::new(objects.clone(), records.clone()),
            users: UserStore::new(db),
            records,
            objects,
            config,
            local_files,
        }
    }

    /// State backed by a [`LocalObjectStore`], which also serves `/files`.
    pub fn with_local_store(
        db: Arc<SqlitePool>,
        store: LocalObjectStore,
        config: Arc<AppConfig>,
    ) -> Self {
        let store = Arc::new(store);
        Self::new(db, store.clone(), Some(store), config)
    }
}
