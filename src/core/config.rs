use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub swagger: SwaggerConfig,
    pub minio: MinIOConfig,
    pub ocr: OcrConfig,
    pub sync: SyncConfig,
    pub log_sink: LogSinkConfig,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub jwks_url: String,
    pub jwks_cache_ttl: Duration,
    pub jwt_leeway: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

/// MinIO/S3 storage configuration for document blobs
#[derive(Debug, Clone)]
pub struct MinIOConfig {
    /// MinIO/S3 endpoint URL
    pub endpoint: String,
    /// Endpoint used when building the URLs handed back to clients (defaults to endpoint)
    pub public_endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    /// AWS region (for S3 compatibility)
    pub region: String,
    /// Key prefix under which every document blob is stored (e.g., "documents")
    pub document_prefix: String,
}

/// External OCR worker settings
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Base URL of the functions host; the trigger is POSTed to `{base}/functions/process-ocr`
    pub functions_base_url: String,
    /// Bearer credential sent with every worker trigger
    pub trigger_token: String,
    /// Bearer credential the worker presents when reporting job progress back
    pub worker_token: String,
    pub trigger_timeout: Duration,
    pub sweep_interval: Duration,
    /// Queued jobs untouched for longer than this get their trigger re-sent
    pub stuck_after: Duration,
    pub sweep_batch_size: i64,
}

/// Status synchronizer timing
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    pub dedup_window: Duration,
}

/// Batched operational log sink
#[derive(Debug, Clone)]
pub struct LogSinkConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        Ok(Config {
            app: AppConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            minio: MinIOConfig::from_env()?,
            ocr: OcrConfig::from_env()?,
            sync: SyncConfig::from_env()?,
            log_sink: LogSinkConfig::from_env()?,
        })
    }
}

/// Read an environment variable, falling back to `default`, and parse it
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, String>
where
    T: ToString,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<T>()
        .map_err(|_| format!("{} must be a valid number", name))
}

impl AppConfig {
    // Upload cap (15 MiB) plus room for multipart framing and form fields
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 16 * 1024 * 1024;

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;

        // Parse CORS allowed origins from comma-separated string
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = parse_env(
            "MAX_REQUEST_BODY_SIZE",
            Self::DEFAULT_MAX_REQUEST_BODY_SIZE,
        )?;

        Ok(Self {
            host,
            port,
            cors_allowed_origins,
            max_request_body_size,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl DatabaseConfig {
    const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    const DEFAULT_MIN_CONNECTIONS: u32 = 1;
    const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;
    const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600; // 10 minutes
    const DEFAULT_MAX_LIFETIME_SECS: u64 = 1800; // 30 minutes

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set".to_string())?;

        Ok(Self {
            url,
            max_connections: parse_env("DB_MAX_CONNECTIONS", Self::DEFAULT_MAX_CONNECTIONS)?,
            min_connections: parse_env("DB_MIN_CONNECTIONS", Self::DEFAULT_MIN_CONNECTIONS)?,
            acquire_timeout_secs: parse_env(
                "DB_ACQUIRE_TIMEOUT_SECS",
                Self::DEFAULT_ACQUIRE_TIMEOUT_SECS,
            )?,
            idle_timeout_secs: parse_env("DB_IDLE_TIMEOUT_SECS", Self::DEFAULT_IDLE_TIMEOUT_SECS)?,
            max_lifetime_secs: parse_env("DB_MAX_LIFETIME_SECS", Self::DEFAULT_MAX_LIFETIME_SECS)?,
        })
    }
}

impl AuthConfig {
    const DEFAULT_JWKS_CACHE_TTL_SECS: u64 = 3600; // 1 hour
    const DEFAULT_JWT_LEEWAY_SECS: u64 = 60;

    pub fn from_env() -> Result<Self, String> {
        let issuer = env::var("AUTH_ISSUER")
            .map_err(|_| "AUTH_ISSUER environment variable is required".to_string())?;

        let audience = env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());

        let jwks_url = env::var("AUTH_JWKS_URL")
            .unwrap_or_else(|_| format!("{}/.well-known/jwks.json", issuer.trim_end_matches('/')));

        let jwks_cache_ttl_secs = parse_env("JWKS_CACHE_TTL", Self::DEFAULT_JWKS_CACHE_TTL_SECS)?;
        let jwt_leeway_secs = parse_env("JWT_LEEWAY", Self::DEFAULT_JWT_LEEWAY_SECS)?;

        Ok(Self {
            issuer,
            audience,
            jwks_url,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_secs),
            jwt_leeway: Duration::from_secs(jwt_leeway_secs),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title =
            env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Dossier Archive API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION").unwrap_or_else(|_| {
            "Document ingestion, OCR job lifecycle and dossier linking".to_string()
        });

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

impl MinIOConfig {
    pub fn from_env() -> Result<Self, String> {
        let endpoint =
            env::var("MINIO_ENDPOINT").unwrap_or_else(|_| "http://localhost:9000".to_string());

        let public_endpoint =
            env::var("MINIO_PUBLIC_ENDPOINT").unwrap_or_else(|_| endpoint.clone());

        let access_key = env::var("MINIO_ACCESS_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let secret_key = env::var("MINIO_SECRET_KEY").unwrap_or_else(|_| "minioadmin".to_string());
        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| "dossier-archive".to_string());
        let region = env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let document_prefix =
            env::var("MINIO_DOCUMENT_PREFIX").unwrap_or_else(|_| "documents".to_string());

        Ok(Self {
            endpoint,
            public_endpoint,
            access_key,
            secret_key,
            bucket,
            region,
            document_prefix,
        })
    }
}

impl OcrConfig {
    const DEFAULT_TRIGGER_TIMEOUT_SECS: u64 = 10;
    const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
    const DEFAULT_STUCK_AFTER_SECS: u64 = 300; // 5 minutes
    const DEFAULT_SWEEP_BATCH_SIZE: i64 = 50;

    pub fn from_env() -> Result<Self, String> {
        let functions_base_url = env::var("OCR_FUNCTIONS_URL")
            .map_err(|_| "OCR_FUNCTIONS_URL environment variable is required".to_string())?;

        let trigger_token = env::var("OCR_TRIGGER_TOKEN")
            .map_err(|_| "OCR_TRIGGER_TOKEN environment variable is required".to_string())?;

        let worker_token = env::var("OCR_WORKER_TOKEN")
            .map_err(|_| "OCR_WORKER_TOKEN environment variable is required".to_string())?;

        Ok(Self {
            functions_base_url: functions_base_url.trim_end_matches('/').to_string(),
            trigger_token,
            worker_token,
            trigger_timeout: Duration::from_secs(parse_env(
                "OCR_TRIGGER_TIMEOUT_SECS",
                Self::DEFAULT_TRIGGER_TIMEOUT_SECS,
            )?),
            sweep_interval: Duration::from_secs(parse_env(
                "OCR_SWEEP_INTERVAL_SECS",
                Self::DEFAULT_SWEEP_INTERVAL_SECS,
            )?),
            stuck_after: Duration::from_secs(parse_env(
                "OCR_STUCK_AFTER_SECS",
                Self::DEFAULT_STUCK_AFTER_SECS,
            )?),
            sweep_batch_size: parse_env("OCR_SWEEP_BATCH_SIZE", Self::DEFAULT_SWEEP_BATCH_SIZE)?,
        })
    }
}

impl SyncConfig {
    const DEFAULT_POLL_INTERVAL_MS: u64 = 3000;
    const DEFAULT_DEDUP_WINDOW_MS: u64 = 2000;

    pub fn from_env() -> Result<Self, String> {
        let poll_interval_ms = parse_env("SYNC_POLL_INTERVAL_MS", Self::DEFAULT_POLL_INTERVAL_MS)?;
        let dedup_window_ms = parse_env("SYNC_DEDUP_WINDOW_MS", Self::DEFAULT_DEDUP_WINDOW_MS)?;

        if poll_interval_ms == 0 {
            return Err("SYNC_POLL_INTERVAL_MS must be greater than zero".to_string());
        }

        Ok(Self {
            poll_interval: Duration::from_millis(poll_interval_ms),
            dedup_window: Duration::from_millis(dedup_window_ms),
        })
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(Self::DEFAULT_POLL_INTERVAL_MS),
            dedup_window: Duration::from_millis(Self::DEFAULT_DEDUP_WINDOW_MS),
        }
    }
}

impl LogSinkConfig {
    const DEFAULT_CAPACITY: usize = 1024;
    const DEFAULT_BATCH_SIZE: usize = 50;
    const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

    pub fn from_env() -> Result<Self, String> {
        let capacity = parse_env("LOG_SINK_CAPACITY", Self::DEFAULT_CAPACITY)?;
        let batch_size = parse_env("LOG_SINK_BATCH_SIZE", Self::DEFAULT_BATCH_SIZE)?;
        let flush_interval_ms =
            parse_env("LOG_SINK_FLUSH_INTERVAL_MS", Self::DEFAULT_FLUSH_INTERVAL_MS)?;

        if capacity == 0 || batch_size == 0 {
            return Err("LOG_SINK_CAPACITY and LOG_SINK_BATCH_SIZE must be non-zero".to_string());
        }

        Ok(Self {
            capacity,
            batch_size,
            flush_interval: Duration::from_millis(flush_interval_ms),
        })
    }
}

impl Default for LogSinkConfig {
    fn default() -> Self {
        Self {
            capacity: Self::DEFAULT_CAPACITY,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(Self::DEFAULT_FLUSH_INTERVAL_MS),
        }
    }
}
