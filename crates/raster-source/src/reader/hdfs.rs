//! Distributed filesystem reader over the WebHDFS REST API.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use super::{HttpClientFactory, RangeReader};
use crate::config::RasterSourceConfig;
use crate::error::{RasterSourceError, Result};
use crate::runtime::block_on;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatusResponse {
    file_status: FileStatus,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    length: u64,
    /// Milliseconds since the epoch.
    modification_time: i64,
}

/// Reads byte ranges with WebHDFS `op=OPEN&offset=&length=` requests.
pub struct HdfsRangeReader {
    locator: String,
    /// `http://namenode:port/webhdfs/v1/path`
    endpoint: Url,
    client: Client,
    status: OnceCell<FileStatus>,
}

impl HdfsRangeReader {
    pub fn new(locator: &str, config: &RasterSourceConfig) -> Result<Self> {
        Ok(Self {
            locator: locator.to_string(),
            endpoint: webhdfs_endpoint(locator, config.webhdfs_port)?,
            client: HttpClientFactory::client(config)?,
            status: OnceCell::new(),
        })
    }

    fn op_url(&self, op: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("op", op);
        url
    }

    fn status(&self) -> Result<FileStatus> {
        self.status
            .get_or_try_init(|| block_on(self.fetch_status())?)
            .copied()
    }

    #[instrument(skip(self), fields(locator = %self.locator))]
    async fn fetch_status(&self) -> Result<FileStatus> {
        let response = self
            .client
            .get(self.op_url("GETFILESTATUS"))
            .send()
            .await
            .map_err(|e| RasterSourceError::transport(&self.locator, e))?;

        if !response.status().is_success() {
            return Err(RasterSourceError::transport(
                &self.locator,
                format!("GETFILESTATUS failed: {}", response.status()),
            ));
        }

        let body: FileStatusResponse = response
            .json()
            .await
            .map_err(|e| RasterSourceError::transport(&self.locator, e))?;
        debug!(length = body.file_status.length, "Resolved WebHDFS file status");
        Ok(body.file_status)
    }

    async fn fetch_range(&self, start: u64, length: u64) -> Result<Bytes> {
        let mut url = self.op_url("OPEN");
        url.query_pairs_mut()
            .append_pair("offset", &start.to_string())
            .append_pair("length", &length.to_string());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RasterSourceError::transport(&self.locator, e))?;

        if !response.status().is_success() {
            return Err(RasterSourceError::transport(
                &self.locator,
                format!("OPEN {}+{} failed: {}", start, length, response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RasterSourceError::transport(&self.locator, e))?;

        if (bytes.len() as u64) < length {
            return Err(RasterSourceError::transport(
                &self.locator,
                format!("short read: {} of {} bytes", bytes.len(), length),
            ));
        }
        Ok(bytes.slice(..length as usize))
    }
}

impl RangeReader for HdfsRangeReader {
    fn identifier(&self) -> &str {
        &self.locator
    }

    fn total_length(&self) -> Result<u64> {
        Ok(self.status()?.length)
    }

    fn read_range(&self, start: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        block_on(self.fetch_range(start, length))?
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        let millis = self.status()?.modification_time;
        Ok(Utc.timestamp_millis_opt(millis).single())
    }
}

/// Map an `hdfs://` or `webhdfs://` locator to its WebHDFS REST endpoint.
///
/// `hdfs://` names the RPC port, so the configured WebHDFS port replaces it;
/// `webhdfs://` locators already carry the REST port.
pub(crate) fn webhdfs_endpoint(locator: &str, webhdfs_port: u16) -> Result<Url> {
    let parsed = Url::parse(locator)
        .map_err(|e| RasterSourceError::config(format!("invalid HDFS locator {}: {}", locator, e)))?;

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| RasterSourceError::config(format!("missing namenode host in {}", locator)))?;

    let port = match parsed.scheme() {
        "webhdfs" => parsed.port().unwrap_or(webhdfs_port),
        _ => webhdfs_port,
    };

    let endpoint = format!("http://{}:{}/webhdfs/v1{}", host, port, parsed.path());
    Url::parse(&endpoint)
        .map_err(|e| RasterSourceError::config(format!("invalid WebHDFS endpoint {}: {}", endpoint, e)))
}
