//! Raster sources: the closed set of backend variants behind one API.

mod geotiff;
mod in_memory;
mod native;

pub use self::geotiff::GeoTiffSource;
pub use self::in_memory::{InMemorySource, NOMINAL_TILE_SIZE};
pub use self::native::{native_driver_available, NativeSource};

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use raster_common::{
    CellType, Crs, Extent, GridBounds, MultibandTile, ProjectedRaster, RasterData, RasterExtent,
    Tile, TileLayout,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::callback::CallbackHandle;
use crate::error::{RasterSourceError, Result};
use crate::locator::Locator;
use crate::metadata::{RasterMetadata, Tags};
use crate::raster_ref::{RasterRef, TileHandle};
use crate::resolver::SourceResolver;
use crate::windows::Windows;

/// What every variant provides; the rest of the API is derived from it.
pub(crate) trait SourceBackend {
    /// Metadata, computed on first call and cached for the instance.
    fn metadata(&self) -> Result<&RasterMetadata>;

    /// Pixels of `bands` inside `bounds`, one tile per band.
    fn read_bands(&self, bounds: &GridBounds, bands: &[usize]) -> Result<Vec<Tile>>;
}

/// Return the cached value, computing it first if needed.
///
/// Concurrent first calls may both compute; the first stored value wins and
/// all callers see it.
pub(crate) fn memoize<T>(cell: &OnceCell<T>, compute: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = compute()?;
    Ok(cell.get_or_init(|| value))
}

/// A raster dataset, read lazily by window.
///
/// Construction does no I/O. Metadata is fetched on first access and cached
/// per instance. The value is serializable: a deserialized copy rebuilds its
/// transport handles and metadata on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum RasterSource {
    GeoTiff(GeoTiffSource),
    InMemory(InMemorySource),
    Native(NativeSource),
}

impl RasterSource {
    /// Resolve `locator` with the process-wide resolver.
    pub fn new(locator: impl Into<Locator>) -> Result<Self> {
        SourceResolver::global().resolve(locator, None)
    }

    /// Like [`RasterSource::new`], reporting range reads to the callback
    /// registered under `callback`.
    pub fn with_callback(locator: impl Into<Locator>, callback: CallbackHandle) -> Result<Self> {
        SourceResolver::global().resolve(locator, Some(callback))
    }

    /// Source over a computed single-band tile.
    pub fn in_memory(tile: Tile, extent: Extent, crs: Crs) -> Self {
        RasterSource::InMemory(InMemorySource::new(tile, extent, crs))
    }

    fn backend(&self) -> &dyn SourceBackend {
        match self {
            RasterSource::GeoTiff(source) => source,
            RasterSource::InMemory(source) => source,
            RasterSource::Native(source) => source,
        }
    }

    // ------------------------------------------------------------------------
    // Metadata
    // ------------------------------------------------------------------------

    pub fn metadata(&self) -> Result<&RasterMetadata> {
        self.backend().metadata()
    }

    pub fn crs(&self) -> Result<Crs> {
        Ok(self.metadata()?.crs.clone())
    }

    pub fn extent(&self) -> Result<Extent> {
        Ok(self.metadata()?.extent)
    }

    pub fn cell_type(&self) -> Result<CellType> {
        Ok(self.metadata()?.cell_type)
    }

    pub fn band_count(&self) -> Result<usize> {
        Ok(self.metadata()?.band_count)
    }

    pub fn tags(&self) -> Result<&Tags> {
        Ok(&self.metadata()?.tags)
    }

    pub fn timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.metadata()?.timestamp)
    }

    /// (cols, rows)
    pub fn dimensions(&self) -> Result<(usize, usize)> {
        Ok(self.metadata()?.dimensions())
    }

    pub fn cols(&self) -> Result<usize> {
        Ok(self.metadata()?.cols)
    }

    pub fn rows(&self) -> Result<usize> {
        Ok(self.metadata()?.rows)
    }

    pub fn raster_extent(&self) -> Result<RasterExtent> {
        Ok(self.metadata()?.raster_extent())
    }

    pub fn tile_layout(&self) -> Result<Option<TileLayout>> {
        Ok(self.metadata()?.tile_layout)
    }

    pub fn no_data(&self) -> Result<Option<f64>> {
        Ok(self.metadata()?.no_data)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Read every band of the pixels touched by `extent`.
    ///
    /// The result covers whole pixels, so its extent is `extent` snapped
    /// outward to the pixel grid and clipped to the raster.
    pub fn read(&self, extent: &Extent) -> Result<ProjectedRaster> {
        let bands: Vec<usize> = (0..self.band_count()?).collect();
        self.read_bands(extent, &bands)
    }

    /// Read selected bands (0-based) of the pixels touched by `extent`.
    pub fn read_bands(&self, extent: &Extent, bands: &[usize]) -> Result<ProjectedRaster> {
        let raster_extent = self.raster_extent()?;
        let bounds = raster_extent
            .bounds_for_extent(extent)
            .ok_or_else(|| RasterSourceError::out_of_bounds(extent, raster_extent.extent))?;
        self.read_bounds_bands(&bounds, bands)
    }

    /// Read every band of a pixel range.
    pub fn read_bounds(&self, bounds: &GridBounds) -> Result<ProjectedRaster> {
        let bands: Vec<usize> = (0..self.band_count()?).collect();
        self.read_bounds_bands(bounds, &bands)
    }

    /// Read selected bands (0-based) of a pixel range.
    pub fn read_bounds_bands(&self, bounds: &GridBounds, bands: &[usize]) -> Result<ProjectedRaster> {
        let metadata = self.metadata()?;
        let raster_extent = metadata.raster_extent();
        let bounds = bounds
            .intersection(&raster_extent.grid_bounds())
            .ok_or_else(|| {
                RasterSourceError::out_of_bounds(format!("{:?}", bounds), raster_extent.extent)
            })?;

        if bands.is_empty() {
            return Err(RasterSourceError::out_of_bounds(
                "no bands",
                format!("{} bands", metadata.band_count),
            ));
        }

        let mut tiles = self.backend().read_bands(&bounds, bands)?;
        let data = if tiles.len() == 1 {
            RasterData::Single(tiles.remove(0))
        } else {
            RasterData::Multi(MultibandTile::new(tiles))
        };

        Ok(ProjectedRaster::new(
            data,
            raster_extent.extent_for_bounds(&bounds),
            metadata.crs.clone(),
        ))
    }

    /// Windows aligned to the native tiling.
    pub fn windows(&self) -> Result<Windows> {
        let metadata = self.metadata()?;
        Ok(Windows::new(metadata.raster_extent(), metadata.tile_layout))
    }

    /// Eagerly read every window, in enumeration order.
    pub fn read_all(&self) -> Result<impl Iterator<Item = Result<ProjectedRaster>> + '_> {
        let windows = self.windows()?;
        debug!(source = %self, windows = windows.len(), "Reading all windows");
        Ok(windows.map(move |window| self.read_bounds(&window.bounds)))
    }

    /// One handle per window without reading pixels.
    ///
    /// Multi-band sources cannot be referenced lazily here: each window is
    /// read eagerly instead, and a warning is logged.
    pub fn read_all_lazy(self: &Arc<Self>) -> Result<Vec<TileHandle>> {
        let windows = self.windows()?;

        if self.band_count()? > 1 {
            warn!(
                source = %self,
                bands = self.band_count()?,
                "Lazy windows are single-band only, reading multi-band windows eagerly"
            );
            return windows
                .map(|window| self.read_bounds(&window.bounds).map(TileHandle::Eager))
                .collect();
        }

        Ok(windows
            .map(|window| TileHandle::Lazy(RasterRef::for_window(Arc::clone(self), &window)))
            .collect())
    }
}

impl fmt::Display for RasterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterSource::GeoTiff(source) => fmt::Display::fmt(source, f),
            RasterSource::InMemory(source) => fmt::Display::fmt(source, f),
            RasterSource::Native(source) => fmt::Display::fmt(source, f),
        }
    }
}
