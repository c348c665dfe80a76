//! Descriptive metadata shared by all source variants.

use chrono::{DateTime, Utc};
use raster_common::{CellType, Crs, Extent, RasterExtent, TileLayout};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value tags for the dataset and for each band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    pub head: BTreeMap<String, String>,
    /// One map per band, indexed by band number.
    pub bands: Vec<BTreeMap<String, String>>,
}

impl Tags {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.head.get(key).map(String::as_str)
    }

    pub fn band(&self, index: usize) -> Option<&BTreeMap<String, String>> {
        self.bands.get(index)
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_empty() && self.bands.iter().all(BTreeMap::is_empty)
    }
}

/// Everything known about a raster without reading its pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    pub crs: Crs,
    pub extent: Extent,
    pub cols: usize,
    pub rows: usize,
    pub cell_type: CellType,
    pub band_count: usize,
    pub tags: Tags,
    /// Acquisition time, if the format or the transport reports one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Native tiling, absent for striped or untiled storage.
    pub tile_layout: Option<TileLayout>,
    pub no_data: Option<f64>,
}

impl RasterMetadata {
    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn raster_extent(&self) -> RasterExtent {
        RasterExtent::new(self.extent, self.cols, self.rows)
    }
}
