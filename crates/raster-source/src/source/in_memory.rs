//! Source over an already materialized tile.

use once_cell::sync::OnceCell;
use raster_common::{Crs, Extent, GridBounds, Tile, TileLayout};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{memoize, SourceBackend};
use crate::error::{RasterSourceError, Result};
use crate::metadata::{RasterMetadata, Tags};

/// Edge length of the square tiles synthesized for in-memory sources.
pub const NOMINAL_TILE_SIZE: usize = 256;

/// Wraps a computed single-band tile so it enumerates and reads like any
/// storage-backed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemorySource {
    tile: Tile,
    extent: Extent,
    crs: Crs,
    tile_size: usize,
    #[serde(skip)]
    metadata: OnceCell<RasterMetadata>,
}

impl InMemorySource {
    pub fn new(tile: Tile, extent: Extent, crs: Crs) -> Self {
        Self {
            tile,
            extent,
            crs,
            tile_size: NOMINAL_TILE_SIZE,
            metadata: OnceCell::new(),
        }
    }

    /// Use `size` x `size` tiles for window enumeration.
    pub fn with_tile_size(mut self, size: usize) -> Self {
        self.tile_size = size.max(1);
        self.metadata = OnceCell::new();
        self
    }

    pub fn tile(&self) -> &Tile {
        &self.tile
    }

    /// Square tiles of the nominal size, shrunk to the raster when smaller.
    fn tile_layout(&self) -> TileLayout {
        let (cols, rows) = self.tile.dimensions();
        TileLayout::for_dimensions(
            cols,
            rows,
            self.tile_size.min(cols.max(1)),
            self.tile_size.min(rows.max(1)),
        )
    }
}

impl SourceBackend for InMemorySource {
    fn metadata(&self) -> Result<&RasterMetadata> {
        memoize(&self.metadata, || {
            self.tile
                .validate()
                .map_err(|e| RasterSourceError::config(format!("in-memory source: {}", e)))?;
            Ok(RasterMetadata {
                crs: self.crs.clone(),
                extent: self.extent,
                cols: self.tile.cols,
                rows: self.tile.rows,
                cell_type: self.tile.cell_type,
                band_count: 1,
                tags: Tags {
                    head: Default::default(),
                    bands: vec![Default::default()],
                },
                timestamp: None,
                tile_layout: Some(self.tile_layout()),
                no_data: self.tile.no_data,
            })
        })
    }

    fn read_bands(&self, bounds: &GridBounds, bands: &[usize]) -> Result<Vec<Tile>> {
        self.metadata()?;
        if let Some(&band) = bands.iter().find(|&&b| b != 0) {
            return Err(RasterSourceError::out_of_bounds(format!("band {}", band), "1 band"));
        }
        let cropped = self.tile.crop(bounds);
        if cropped.size() == 0 {
            return Err(RasterSourceError::out_of_bounds(
                format!("{:?}", bounds),
                format!("{}x{} grid", self.tile.cols, self.tile.rows),
            ));
        }
        Ok(bands.iter().map(|_| cropped.clone()).collect())
    }
}

impl fmt::Display for InMemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InMemoryRasterSource({}x{}, {}, {})",
            self.tile.cols, self.tile.rows, self.extent, self.crs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::CellType;

    fn source(cols: usize, rows: usize) -> InMemorySource {
        let values = (0..cols * rows).map(|v| v as f64).collect();
        InMemorySource::new(
            Tile::new(values, cols, rows, CellType::Float64),
            Extent::new(0.0, 0.0, cols as f64, rows as f64),
            Crs::WGS84,
        )
    }

    #[test]
    fn test_layout_uses_nominal_tile_size() {
        let layout = source(600, 300).metadata().unwrap().tile_layout.unwrap();
        assert_eq!(layout, TileLayout::new(3, 2, 256, 256));
    }

    #[test]
    fn test_layout_never_larger_than_raster() {
        let layout = source(10, 4).metadata().unwrap().tile_layout.unwrap();
        assert_eq!(layout, TileLayout::new(1, 1, 10, 4));
    }

    #[test]
    fn test_custom_tile_size() {
        let layout = source(10, 10).with_tile_size(4).metadata().unwrap().tile_layout.unwrap();
        assert_eq!(layout, TileLayout::new(3, 3, 4, 4));
    }

    #[test]
    fn test_read_bands_rejects_second_band() {
        let src = source(4, 4);
        assert!(src.read_bands(&GridBounds::full(4, 4), &[1]).is_err());
        let tiles = src.read_bands(&GridBounds::new(1, 1, 3, 2), &[0]).unwrap();
        assert_eq!(tiles[0].values, vec![5.0, 6.0]);
    }

    #[test]
    fn test_mismatched_tile_is_rejected() {
        let tile = Tile {
            cols: 4,
            rows: 4,
            cell_type: CellType::Float64,
            no_data: None,
            values: vec![0.0; 10],
        };
        let src = InMemorySource::new(tile, Extent::new(0.0, 0.0, 4.0, 4.0), Crs::WGS84);
        assert!(matches!(src.metadata(), Err(RasterSourceError::Config(_))));
        assert!(matches!(
            src.read_bands(&GridBounds::full(4, 4), &[0]),
            Err(RasterSourceError::Config(_))
        ));
    }

    #[test]
    fn test_deserialized_mismatched_tile_is_rejected() {
        let mut value = serde_json::to_value(source(3, 3)).unwrap();
        value["tile"]["values"] = serde_json::json!([1.0, 2.0]);
        let src: InMemorySource = serde_json::from_value(value).unwrap();
        assert!(src.metadata().is_err());
    }
}
