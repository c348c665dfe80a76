//! Byte-range readers.
//!
//! Every backend exposes the same stateless interface: read `length` bytes at
//! `start`. There is no cursor, so readers can be shared between threads and
//! windows freely.

mod hdfs;
mod http;
mod local;
mod object_store;

pub use self::hdfs::HdfsRangeReader;
pub use self::http::{HttpClientFactory, HttpRangeReader};
pub use self::local::LocalRangeReader;
pub use self::object_store::{register_object_store, ObjectStoreFactory, ObjectStoreRangeReader};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::callback::ReadCallback;
use crate::config::RasterSourceConfig;
use crate::error::Result;

/// Random access to the bytes of one resource.
pub trait RangeReader: Send + Sync {
    /// Human-readable identifier for logging and callbacks.
    fn identifier(&self) -> &str;

    /// Total size of the resource in bytes.
    fn total_length(&self) -> Result<u64>;

    /// Read exactly `length` bytes at `start`.
    ///
    /// Callers keep the range inside `[0, total_length)`; use
    /// [`read_clipped_range`](Self::read_clipped_range) otherwise.
    fn read_range(&self, start: u64, length: u64) -> Result<Bytes>;

    /// Read up to `length` bytes at `start`, clipped to the resource.
    fn read_clipped_range(&self, start: u64, length: u64) -> Result<Bytes> {
        let total = self.total_length()?;
        if start >= total || length == 0 {
            return Ok(Bytes::new());
        }
        self.read_range(start, length.min(total - start))
    }

    /// Modification time reported by the transport, if any.
    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(None)
    }
}

/// Reader decorator that reports every range fetch to a callback.
pub struct InstrumentedReader {
    inner: Arc<dyn RangeReader>,
    callback: Arc<dyn ReadCallback>,
}

impl InstrumentedReader {
    pub fn new(inner: Arc<dyn RangeReader>, callback: Arc<dyn ReadCallback>) -> Self {
        Self { inner, callback }
    }
}

impl RangeReader for InstrumentedReader {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn total_length(&self) -> Result<u64> {
        self.inner.total_length()
    }

    fn read_range(&self, start: u64, length: u64) -> Result<Bytes> {
        self.callback.on_read(self.inner.identifier(), start, length);
        self.inner.read_range(start, length)
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_modified()
    }
}

/// Where the bytes of a storage-backed source live.
///
/// This is the serializable half of a reader: it names the resource, and
/// [`Backend::open`] builds the live reader from it in whatever process
/// holds the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backend {
    Local { path: PathBuf },
    Http { url: String },
    /// `hdfs://` or `webhdfs://` locator, read through the WebHDFS REST API.
    Hdfs { url: String },
    ObjectStore { bucket: String, key: String },
}

impl Backend {
    /// Short name used in display names and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Local { .. } => "Local",
            Backend::Http { .. } => "Http",
            Backend::Hdfs { .. } => "Hdfs",
            Backend::ObjectStore { .. } => "ObjectStore",
        }
    }

    /// Build a reader for this backend.
    ///
    /// No I/O happens here; readers stat the resource on first use.
    pub fn open(&self, config: &RasterSourceConfig) -> Result<Arc<dyn RangeReader>> {
        let reader: Arc<dyn RangeReader> = match self {
            Backend::Local { path } => Arc::new(LocalRangeReader::new(path.clone())),
            Backend::Http { url } => Arc::new(HttpRangeReader::new(
                url.clone(),
                HttpClientFactory::client(config)?,
            )),
            Backend::Hdfs { url } => Arc::new(HdfsRangeReader::new(url, config)?),
            Backend::ObjectStore { bucket, key } => Arc::new(ObjectStoreRangeReader::new(
                format!("s3://{}/{}", bucket, key),
                ObjectStoreFactory::store(bucket, &config.object_store)?,
                key.as_str().into(),
            )),
        };

        Ok(Arc::new(MeteredReader {
            inner: reader,
            kind: self.kind(),
        }))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local { path } => write!(f, "{}", path.display()),
            Backend::Http { url } | Backend::Hdfs { url } => write!(f, "{}", url),
            Backend::ObjectStore { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
        }
    }
}

/// Records read counts and byte totals per backend kind.
struct MeteredReader {
    inner: Arc<dyn RangeReader>,
    kind: &'static str,
}

impl RangeReader for MeteredReader {
    fn identifier(&self) -> &str {
        self.inner.identifier()
    }

    fn total_length(&self) -> Result<u64> {
        self.inner.total_length()
    }

    fn read_range(&self, start: u64, length: u64) -> Result<Bytes> {
        tracing::debug!(source = self.inner.identifier(), start, length, "Range read");
        let bytes = self.inner.read_range(start, length)?;
        counter!("raster_range_reads_total", "backend" => self.kind).increment(1);
        counter!("raster_range_bytes_total", "backend" => self.kind).increment(bytes.len() as u64);
        Ok(bytes)
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        self.inner.last_modified()
    }
}
