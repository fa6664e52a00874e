use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, fmt, str::FromStr, time::Duration};

const ENV_PREFIX: &str = "TEXTBOOK_";
const MAX_PRESIGN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; resolved once in `main`
/// and handed to each component's constructor.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub storage: StorageConfig,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
    pub read_timeout: Duration,
}

/// Object-store settings shared by every backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub storage_dir: String,
    pub public_url: String,
    pub presign_secret: Secret,
    pub presign_ttl: Duration,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    S3,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "disk" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => bail!("unknown storage backend `{}` (expected `local` or `s3`)", other),
        }
    }
}

/// A string that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Textbook upload and metadata service")]
pub struct Args {
    /// Host to bind to (overrides TEXTBOOK_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TEXTBOOK_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides TEXTBOOK_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store backend, `local` or `s3` (overrides TEXTBOOK_STORAGE_BACKEND)
    #[arg(long)]
    pub storage_backend: Option<String>,

    /// Directory for the local object store (overrides TEXTBOOK_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse `.env`, environment variables and CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        dotenvy::dotenv().ok();
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values produced by `lookup` (keyed by the full
    /// `TEXTBOOK_*` variable name), falling back to defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(format!("{ENV_PREFIX}{key}").as_str())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = args
            .host
            .or_else(|| var("HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_or(var("PORT"), "TEXTBOOK_PORT", 8080u16)?,
        };
        let database_url = args
            .database_url
            .or_else(|| var("DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://./data/textbooks.db".into());
        let db_max_connections = parse_or(var("DB_MAX_CONNECTIONS"), "TEXTBOOK_DB_MAX_CONNECTIONS", 5u32)?;
        if db_max_connections == 0 {
            bail!("TEXTBOOK_DB_MAX_CONNECTIONS must be at least 1");
        }

        let backend = args
            .storage_backend
            .or_else(|| var("STORAGE_BACKEND"))
            .map(|raw| raw.parse::<StorageBackend>())
            .transpose()?
            .unwrap_or(StorageBackend::Local);
        let storage_dir = args
            .storage_dir
            .or_else(|| var("STORAGE_DIR"))
            .unwrap_or_else(|| "./data/objects".into());
        let public_url = var("PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let presign_secret = match var("PRESIGN_SECRET") {
            Some(secret) => Secret::new(secret),
            None => {
                tracing::warn!(
                    "TEXTBOOK_PRESIGN_SECRET not set; presigned URLs will not survive a restart"
                );
                Secret::new(uuid::Uuid::new_v4().simple().to_string())
            }
        };
        let presign_ttl_secs = parse_or(var("PRESIGN_TTL_SECS"), "TEXTBOOK_PRESIGN_TTL_SECS", 900u64)?;
        if presign_ttl_secs == 0 || presign_ttl_secs > MAX_PRESIGN_TTL_SECS {
            bail!(
                "TEXTBOOK_PRESIGN_TTL_SECS must be between 1 and {}",
                MAX_PRESIGN_TTL_SECS
            );
        }
        let s3_bucket = var("S3_BUCKET");
        let s3_region = var("S3_REGION").unwrap_or_else(|| "us-east-1".into());
        if backend == StorageBackend::S3 && s3_bucket.is_none() {
            bail!("TEXTBOOK_S3_BUCKET is required when the storage backend is `s3`");
        }

        let cors_origins = var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://localhost:5173".to_string(),
                ]
            });

        let max_upload_bytes = parse_or(
            var("MAX_UPLOAD_BYTES"),
            "TEXTBOOK_MAX_UPLOAD_BYTES",
            50 * 1024 * 1024usize,
        )?;
        let request_timeout = Duration::from_secs(parse_or(
            var("REQUEST_TIMEOUT_SECS"),
            "TEXTBOOK_REQUEST_TIMEOUT_SECS",
            30u64,
        )?);
        let read_timeout = Duration::from_secs(parse_or(
            var("READ_TIMEOUT_SECS"),
            "TEXTBOOK_READ_TIMEOUT_SECS",
            10u64,
        )?);

        Ok(Self {
            host,
            port,
            database_url,
            db_max_connections,
            storage: StorageConfig {
                backend,
                storage_dir,
                public_url,
                presign_secret,
                presign_ttl: Duration::from_secs(presign_ttl_secs),
                s3_bucket,
                s3_region,
            },
            cors_origins,
            max_upload_bytes,
            request_timeout,
            read_timeout,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upper bound accepted for presigned URL lifetimes (matches S3's limit).
pub fn max_presign_ttl() -> Duration {
    Duration::from_secs(MAX_PRESIGN_TTL_SECS)
}

fn parse_or<T>(raw: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}
