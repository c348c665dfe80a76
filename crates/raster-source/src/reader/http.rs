//! HTTP(S) range reader.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use reqwest::header::{self, HeaderMap};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

use super::RangeReader;
use crate::config::RasterSourceConfig;
use crate::error::{RasterSourceError, Result};
use crate::runtime::block_on;

/// Builds HTTP clients from the process configuration.
pub struct HttpClientFactory;

impl HttpClientFactory {
    pub fn client(config: &RasterSourceConfig) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .connect_timeout(Duration::from_secs(config.http_timeout_secs.min(30)))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| RasterSourceError::config(format!("Failed to create HTTP client: {}", e)))
    }
}

#[derive(Debug, Clone, Copy)]
struct HttpStat {
    length: u64,
    last_modified: Option<DateTime<Utc>>,
}

/// Reads byte ranges with `Range: bytes=a-b` requests.
pub struct HttpRangeReader {
    url: String,
    client: Client,
    stat: OnceCell<HttpStat>,
}

impl HttpRangeReader {
    pub fn new(url: String, client: Client) -> Self {
        Self {
            url,
            client,
            stat: OnceCell::new(),
        }
    }

    fn stat(&self) -> Result<HttpStat> {
        self.stat
            .get_or_try_init(|| block_on(self.fetch_stat())?)
            .copied()
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_stat(&self) -> Result<HttpStat> {
        let response = self
            .client
            .head(&self.url)
            .send()
            .await
            .map_err(|e| RasterSourceError::transport(&self.url, e))?;

        let status = response.status();
        if status.is_success() {
            if let Some(length) = content_length(response.headers()) {
                debug!(length, "Resolved length from HEAD");
                return Ok(HttpStat {
                    length,
                    last_modified: last_modified(response.headers()),
                });
            }
        } else if status != StatusCode::METHOD_NOT_ALLOWED {
            return Err(RasterSourceError::transport(
                &self.url,
                format!("HEAD request failed: {}", status),
            ));
        }

        // HEAD gave no length: ask for the first byte and read Content-Range.
        let response = self
            .client
            .get(&self.url)
            .header(header::RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| RasterSourceError::transport(&self.url, e))?;

        let headers = response.headers();
        let length = match response.status() {
            StatusCode::PARTIAL_CONTENT => content_range_total(headers),
            s if s.is_success() => content_length(headers),
            s => {
                return Err(RasterSourceError::transport(
                    &self.url,
                    format!("range probe failed: {}", s),
                ))
            }
        }
        .ok_or_else(|| RasterSourceError::transport(&self.url, "server did not report a length"))?;

        Ok(HttpStat {
            length,
            last_modified: last_modified(headers),
        })
    }

    async fn fetch_range(&self, start: u64, length: u64) -> Result<Bytes> {
        let end = start + length - 1;
        let response = self
            .client
            .get(&self.url)
            .header(header::RANGE, format!("bytes={}-{}", start, end))
            .send()
            .await
            .map_err(|e| RasterSourceError::transport(&self.url, e))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RasterSourceError::transport(&self.url, e))?;

        match status {
            StatusCode::PARTIAL_CONTENT => {
                if (bytes.len() as u64) < length {
                    return Err(RasterSourceError::transport(
                        &self.url,
                        format!("short read: {} of {} bytes", bytes.len(), length),
                    ));
                }
                Ok(bytes.slice(..length as usize))
            }
            // Server ignored the Range header and sent the whole body.
            StatusCode::OK => {
                let end = (start + length) as usize;
                if end > bytes.len() {
                    return Err(RasterSourceError::transport(
                        &self.url,
                        format!("short body: {} bytes, wanted up to {}", bytes.len(), end),
                    ));
                }
                Ok(bytes.slice(start as usize..end))
            }
            s => Err(RasterSourceError::transport(
                &self.url,
                format!("range request {}-{} failed: {}", start, end, s),
            )),
        }
    }
}

impl RangeReader for HttpRangeReader {
    fn identifier(&self) -> &str {
        &self.url
    }

    fn total_length(&self) -> Result<u64> {
        Ok(self.stat()?.length)
    }

    fn read_range(&self, start: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        block_on(self.fetch_range(start, length))?
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.stat()?.last_modified)
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Total length from a `Content-Range: bytes a-b/total` header.
fn content_range_total(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit('/').next())
        .and_then(|v| v.trim().parse().ok())
}

fn last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    headers
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_content_range_total() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_RANGE, HeaderValue::from_static("bytes 0-0/12345"));
        assert_eq!(content_range_total(&headers), Some(12345));

        headers.insert(header::CONTENT_RANGE, HeaderValue::from_static("bytes 0-0/*"));
        assert_eq!(content_range_total(&headers), None);
    }

    #[test]
    fn test_last_modified_http_date() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        let ts = last_modified(&headers).unwrap();
        assert_eq!(ts.to_rfc3339(), "2015-10-21T07:28:00+00:00");
    }
}
