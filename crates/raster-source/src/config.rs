//! Process-wide configuration for raster sources.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Default number of bytes fetched per header chunk.
pub const DEFAULT_HEADER_CHUNK_SIZE: usize = 64 * 1024;

/// Default WebHDFS REST port of the namenode.
pub const DEFAULT_WEBHDFS_PORT: u16 = 9870;

static GLOBAL_CONFIG: Lazy<RasterSourceConfig> = Lazy::new(|| {
    let config = RasterSourceConfig::from_env();
    if let Err(e) = config.validate() {
        tracing::warn!(error = %e, "Invalid raster source configuration, using defaults");
        return RasterSourceConfig::default();
    }
    config
});

/// Configuration for raster source resolution and transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterSourceConfig {
    /// Route locators to the native driver whenever it is available.
    pub prefer_native_driver: bool,

    /// Bytes fetched per range read while parsing headers.
    pub header_chunk_size: usize,

    /// Request timeout for HTTP and WebHDFS transports, in seconds.
    pub http_timeout_secs: u64,

    /// Port of the WebHDFS REST endpoint used for `hdfs://` locators.
    pub webhdfs_port: u16,

    /// Object store connection settings for `s3://` locators.
    pub object_store: ObjectStoreConfig,
}

impl Default for RasterSourceConfig {
    fn default() -> Self {
        Self {
            prefer_native_driver: false,
            header_chunk_size: DEFAULT_HEADER_CHUNK_SIZE,
            http_timeout_secs: 30,
            webhdfs_port: DEFAULT_WEBHDFS_PORT,
            object_store: ObjectStoreConfig::default(),
        }
    }
}

impl RasterSourceConfig {
    /// The configuration shared by every source in this process.
    ///
    /// Read from the environment on first access.
    pub fn global() -> &'static RasterSourceConfig {
        &GLOBAL_CONFIG
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RASTER_PREFER_NATIVE_DRIVER") {
            config.prefer_native_driver = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("RASTER_HEADER_CHUNK_SIZE") {
            if let Ok(size) = val.parse() {
                config.header_chunk_size = size;
            }
        }

        if let Ok(val) = std::env::var("RASTER_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.http_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("RASTER_WEBHDFS_PORT") {
            if let Ok(port) = val.parse() {
                config.webhdfs_port = port;
            }
        }

        config.object_store = ObjectStoreConfig::from_env();
        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.header_chunk_size < 16 {
            return Err("header_chunk_size must be >= 16".to_string());
        }

        if self.http_timeout_secs == 0 {
            return Err("http_timeout_secs must be > 0".to_string());
        }

        if self.webhdfs_port == 0 {
            return Err("webhdfs_port must be > 0".to_string());
        }

        Ok(())
    }
}

/// Connection settings for S3-compatible object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Custom endpoint URL (e.g. "http://minio:9000"); AWS when unset.
    pub endpoint: Option<String>,
    /// AWS region
    pub region: String,
    /// Access key ID; falls back to the ambient AWS credential chain when unset.
    pub access_key_id: Option<String>,
    /// Secret access key
    pub secret_access_key: Option<String>,
    /// Allow plain HTTP endpoints (local MinIO)
    pub allow_http: bool,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            allow_http: false,
        }
    }
}

impl ObjectStoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: std::env::var("S3_ACCESS_KEY").ok(),
            secret_access_key: std::env::var("S3_SECRET_KEY").ok(),
            allow_http: std::env::var("S3_ALLOW_HTTP")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
        }
    }
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}
