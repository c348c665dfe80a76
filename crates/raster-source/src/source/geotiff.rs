//! GeoTIFF over a byte-range backend.

use once_cell::sync::OnceCell;
use raster_common::{GridBounds, Tile};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::{memoize, SourceBackend};
use crate::callback::CallbackHandle;
use crate::config::RasterSourceConfig;
use crate::error::Result;
use crate::geotiff::{read_window, GeoTiffInfo};
use crate::locator::Locator;
use crate::metadata::RasterMetadata;
use crate::reader::{Backend, InstrumentedReader, RangeReader};

/// A GeoTIFF read through local, HTTP, WebHDFS or object storage.
///
/// Only the descriptor (locator, backend, callback name) is serialized.
/// The reader and the parsed header are rebuilt on first use wherever the
/// source ends up.
#[derive(Clone, Serialize, Deserialize)]
pub struct GeoTiffSource {
    locator: Locator,
    backend: Backend,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    callback: Option<CallbackHandle>,
    #[serde(skip)]
    reader: OnceCell<Arc<dyn RangeReader>>,
    #[serde(skip)]
    info: OnceCell<Arc<GeoTiffInfo>>,
}

impl GeoTiffSource {
    pub fn new(locator: Locator, backend: Backend, callback: Option<CallbackHandle>) -> Self {
        Self {
            locator,
            backend,
            callback,
            reader: OnceCell::new(),
            info: OnceCell::new(),
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn callback(&self) -> Option<&CallbackHandle> {
        self.callback.as_ref()
    }

    /// The range reader, with the read callback attached if one is
    /// registered under this source's callback name.
    pub fn reader(&self) -> Result<Arc<dyn RangeReader>> {
        memoize(&self.reader, || {
            let reader = self.backend.open(RasterSourceConfig::global())?;
            Ok(match self.callback.as_ref().and_then(CallbackHandle::resolve) {
                Some(callback) => Arc::new(InstrumentedReader::new(reader, callback)),
                None => reader,
            })
        })
        .cloned()
    }

    /// Parsed header, fetched on first call.
    pub fn info(&self) -> Result<&GeoTiffInfo> {
        memoize(&self.info, || {
            let reader = self.reader()?;
            let chunk_size = RasterSourceConfig::global().header_chunk_size;
            Ok(Arc::new(GeoTiffInfo::parse(reader.as_ref(), chunk_size)?))
        })
        .map(|info| info.as_ref())
    }
}

impl SourceBackend for GeoTiffSource {
    fn metadata(&self) -> Result<&RasterMetadata> {
        Ok(&self.info()?.metadata)
    }

    fn read_bands(&self, bounds: &GridBounds, bands: &[usize]) -> Result<Vec<Tile>> {
        let info = self.info()?;
        read_window(self.reader()?.as_ref(), info, bounds, bands)
    }
}

impl fmt::Display for GeoTiffSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}GeoTiffRasterSource({})", self.backend.kind(), self.locator)
    }
}

impl fmt::Debug for GeoTiffSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoTiffSource")
            .field("locator", &self.locator)
            .field("backend", &self.backend)
            .field("callback", &self.callback)
            .field("header_cached", &self.info.get().is_some())
            .finish()
    }
}
