//! src/services/local_store.rs
//!
//! LocalObjectStore — the default `ObjectStore` backend. Payloads live on
//! disk beneath `base_path/{key}` with a JSON sidecar `{key}.meta.json`
//! carrying content type, original filename, owner and checksum.
//! Presigned URLs point at this service's `/files/{*key}` route and are
//! verified by [`LocalObjectStore::verify_signature`].

use crate::{
    config::Secret,
    services::object_store::{
        ObjectStore, ObjectStoreError, ObjectStoreResult, PDF_CONTENT_TYPE, derive_storage_key,
    },
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac, digest::InvalidLength};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Characters left as-is in presigned URL paths; `/` keeps key segments intact.
const KEY_PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

const MAX_OBJECT_KEY_LEN: usize = 1024;
const SIDECAR_SUFFIX: &str = ".meta.json";

/// Sidecar metadata stored next to each payload.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ObjectMeta {
    pub content_type: String,
    pub original_filename: String,
    pub owner_id: Uuid,
    pub size_bytes: u64,
    pub etag: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,

    /// Prefix for presigned URLs, e.g. `http://localhost:8080`.
    public_url: String,

    /// Key used to sign presigned URLs.
    secret: Secret,
}

impl LocalObjectStore {
    /// Create a store rooted at `base_path`, creating the directory if needed.
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_url: impl Into<String>,
        secret: Secret,
    ) -> io::Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path).await?;
        Ok(Self {
            base_path,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            secret,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects keys that begin with `/`, contain `..`, backslashes or control
    /// characters, or exceed 1024 bytes.
    fn ensure_key_safe(key: &str) -> ObjectStoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    fn sidecar_path(object_path: &Path) -> PathBuf {
        let mut name = object_path.as_os_str().to_owned();
        name.push(SIDECAR_SUFFIX);
        PathBuf::from(name)
    }

    /// HMAC-SHA256 keyed by the presign secret over `key` and its expiry (unix seconds).
    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256, InvalidLength> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose().as_bytes())?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn sign(&self, key: &str, expires: i64) -> Result<String, InvalidLength> {
        let tag = self.mac(key, expires)?.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(tag))
    }

    /// Check a presigned request: signature must match and `expires` must be
    /// in the future relative to `now`.
    pub fn verify_signature(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> bool {
        if expires <= now.timestamp() {
            return false;
        }
        let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        match self.mac(key, expires) {
            Ok(mac) => mac.verify_slice(&provided).is_ok(),
            Err(_) => false,
        }
    }

    /// Open an object for streaming along with its sidecar metadata.
    pub async fn open(&self, key: &str) -> ObjectStoreResult<(ObjectMeta, File)> {
        Self::ensure_key_safe(key)?;
        let path = self.object_path(key);
        let file = File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ObjectStoreError::NotFound(key.to_string())
            } else {
                ObjectStoreError::Unavailable(err.to_string())
            }
        })?;

        let meta = match fs::read(Self::sidecar_path(&path)).await {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|err| ObjectStoreError::Unavailable(err.to_string()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let size_bytes = file
                    .metadata()
                    .await
                    .map_err(|err| ObjectStoreError::Unavailable(err.to_string()))?
                    .len();
                ObjectMeta {
                    content_type: PDF_CONTENT_TYPE.to_string(),
                    original_filename: key.rsplit('/').next().unwrap_or(key).to_string(),
                    owner_id: Uuid::nil(),
                    size_bytes,
                    etag: String::new(),
                    uploaded_at: Utc::now(),
                }
            }
            Err(err) => return Err(ObjectStoreError::Unavailable(err.to_string())),
        };

        Ok((meta, file))
    }

    /// Write `content` to a temp file, fsync, then rename over `path`.
    async fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::new(ErrorKind::Other, "object path missing parent directory"))?;
        fs::create_dir_all(parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let result = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, path).await
        }
        .await;

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path).await;
        }
        result
    }

    /// Recursively remove empty directories up to the base path.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn store(
        &self,
        content: Bytes,
        original_filename: &str,
        owner_id: Uuid,
    ) -> ObjectStoreResult<String> {
        let key = derive_storage_key(original_filename, owner_id)?;
        let path = self.object_path(&key);
        let sidecar = Self::sidecar_path(&path);

        let meta = ObjectMeta {
            content_type: PDF_CONTENT_TYPE.to_string(),
            original_filename: original_filename.to_string(),
            owner_id,
            size_bytes: content.len() as u64,
            etag: format!("{:x}", md5::compute(&content)),
            uploaded_at: Utc::now(),
        };
        let meta_json =
            serde_json::to_vec_pretty(&meta).map_err(|err| ObjectStoreError::write(&key, err))?;

        // The payload rename is the commit point; the sidecar goes first.
        Self::write_atomic(&sidecar, &meta_json)
            .await
            .map_err(|err| ObjectStoreError::write(&key, err))?;
        if let Err(err) = Self::write_atomic(&path, &content).await {
            let _ = fs::remove_file(&sidecar).await;
            return Err(ObjectStoreError::write(&key, err));
        }

        debug!(storage_key = %key, bytes = content.len(), "stored object");
        Ok(key)
    }

    async fn delete(&self, storage_key: &str) -> ObjectStoreResult<()> {
        Self::ensure_key_safe(storage_key)?;
        let path = self.object_path(storage_key);

        for target in [path.clone(), Self::sidecar_path(&path)] {
            match fs::remove_file(&target).await {
                Ok(_) => debug!("removed {}", target.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("{} already missing", target.display());
                }
                Err(err) => return Err(ObjectStoreError::delete(storage_key, err)),
            }
        }

        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    async fn presign(&self, storage_key: &str, ttl: Duration) -> ObjectStoreResult<String> {
        Self::ensure_key_safe(storage_key)
            .map_err(|err| ObjectStoreError::url(storage_key, err.to_string()))?;
        if ttl.is_zero() || ttl > crate::config::max_presign_ttl() {
            return Err(ObjectStoreError::url(
                storage_key,
                format!("ttl of {}s is out of range", ttl.as_secs()),
            ));
        }
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|err| ObjectStoreError::url(storage_key, err.to_string()))?;
        let expires = (Utc::now() + ttl).timestamp();
        let signature = self
            .sign(storage_key, expires)
            .map_err(|err| ObjectStoreError::url(storage_key, err.to_string()))?;

        Ok(format!(
            "{}/files/{}?expires={}&signature={}",
            self.public_url,
            encode_key(storage_key),
            expires,
            signature
        ))
    }

    /// Best-effort write/read/delete of a probe file under the base path.
    async fn check(&self) -> ObjectStoreResult<()> {
        let probe = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&probe, b"readyz")
            .await
            .map_err(|e| ObjectStoreError::Unavailable(format!("could not write probe: {}", e)))?;
        let read = fs::read(&probe).await;
        let _ = fs::remove_file(&probe).await;
        match read {
            Ok(bytes) if bytes == b"readyz" => Ok(()),
            Ok(_) => Err(ObjectStoreError::Unavailable("probe content mismatch".into())),
            Err(e) => Err(ObjectStoreError::Unavailable(format!(
                "could not read probe: {}",
                e
            ))),
        }
    }
}

/// Percent-encode everything outside the URL unreserved set, keeping `/`.
fn encode_key(key: &str) -> String {
    utf8_percent_encode(key, KEY_PATH).to_string()
}
