//! Object storage reader (S3 and compatibles).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, instrument};

use super::RangeReader;
use crate::config::ObjectStoreConfig;
use crate::error::{RasterSourceError, Result};
use crate::runtime::block_on;

static REGISTERED_STORES: Lazy<RwLock<HashMap<String, Arc<dyn ObjectStore>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Serve `s3://<bucket>/...` locators from `store` in this process.
///
/// Takes precedence over the configured S3 connection. Useful for
/// in-memory stores in tests and for pre-authenticated clients.
pub fn register_object_store(bucket: impl Into<String>, store: Arc<dyn ObjectStore>) {
    let mut stores = REGISTERED_STORES.write().unwrap_or_else(|e| e.into_inner());
    stores.insert(bucket.into(), store);
}

/// Builds object store clients for a bucket.
pub struct ObjectStoreFactory;

impl ObjectStoreFactory {
    pub fn store(bucket: &str, config: &ObjectStoreConfig) -> Result<Arc<dyn ObjectStore>> {
        {
            let stores = REGISTERED_STORES.read().unwrap_or_else(|e| e.into_inner());
            if let Some(store) = stores.get(bucket) {
                return Ok(store.clone());
            }
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key) = &config.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &config.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| RasterSourceError::config(format!("Failed to create S3 client: {}", e)))?;

        Ok(Arc::new(store))
    }
}

/// Reads byte ranges with `ObjectStore::get_range`.
pub struct ObjectStoreRangeReader {
    identifier: String,
    store: Arc<dyn ObjectStore>,
    location: Path,
    meta: OnceCell<ObjectMeta>,
}

impl ObjectStoreRangeReader {
    pub fn new(identifier: String, store: Arc<dyn ObjectStore>, location: Path) -> Self {
        Self {
            identifier,
            store,
            location,
            meta: OnceCell::new(),
        }
    }

    fn meta(&self) -> Result<&ObjectMeta> {
        self.meta.get_or_try_init(|| block_on(self.fetch_meta())?)
    }

    #[instrument(skip(self), fields(path = %self.location))]
    async fn fetch_meta(&self) -> Result<ObjectMeta> {
        let meta = self
            .store
            .head(&self.location)
            .await
            .map_err(|e| RasterSourceError::transport(&self.identifier, e))?;
        debug!(size = meta.size, "Resolved object metadata");
        Ok(meta)
    }
}

impl RangeReader for ObjectStoreRangeReader {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn total_length(&self) -> Result<u64> {
        Ok(self.meta()?.size as u64)
    }

    fn read_range(&self, start: u64, length: u64) -> Result<Bytes> {
        if length == 0 {
            return Ok(Bytes::new());
        }
        let range = start as usize..(start + length) as usize;
        block_on(self.store.get_range(&self.location, range))?
            .map_err(|e| RasterSourceError::transport(&self.identifier, e))
    }

    fn last_modified(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(Some(self.meta()?.last_modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn reader_over(data: &'static [u8]) -> ObjectStoreRangeReader {
        let store = Arc::new(InMemory::new());
        let location = Path::from("scenes/a.tif");
        block_on(store.put(&location, Bytes::from_static(data)))
            .unwrap()
            .unwrap();
        ObjectStoreRangeReader::new("s3://unit/scenes/a.tif".to_string(), store, location)
    }

    #[test]
    fn test_object_store_reader() {
        let reader = reader_over(b"0123456789");
        assert_eq!(reader.total_length().unwrap(), 10);
        assert_eq!(&reader.read_range(2, 3).unwrap()[..], b"234");
        assert_eq!(&reader.read_clipped_range(8, 5).unwrap()[..], b"89");
        assert!(reader.last_modified().unwrap().is_some());
    }

    #[test]
    fn test_missing_object_is_transport_error() {
        let reader = ObjectStoreRangeReader::new(
            "s3://unit/missing.tif".to_string(),
            Arc::new(InMemory::new()),
            Path::from("missing.tif"),
        );
        assert!(reader.total_length().unwrap_err().is_transport());
    }

    #[test]
    fn test_registered_store_wins() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        register_object_store("registered-unit-bucket", store.clone());
        let resolved =
            ObjectStoreFactory::store("registered-unit-bucket", &ObjectStoreConfig::default())
                .unwrap();
        assert!(Arc::ptr_eq(&resolved, &store));
    }
}
