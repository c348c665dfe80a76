//! Decoded pixel data.

use crate::{CellType, Crs, Extent, GridBounds, RasterExtent};
use serde::{Deserialize, Serialize};

/// One band of decoded pixel values.
///
/// Values are stored row-major, top row first, widened to `f64` so every
/// supported cell type is represented exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub cols: usize,
    pub rows: usize,
    pub cell_type: CellType,
    /// Marker for missing values, if the source declares one.
    pub no_data: Option<f64>,
    pub values: Vec<f64>,
}

impl Tile {
    /// Build a tile without checking the value count; see [`Tile::try_new`].
    pub fn new(values: Vec<f64>, cols: usize, rows: usize, cell_type: CellType) -> Self {
        debug_assert_eq!(values.len(), cols * rows);
        Self {
            cols,
            rows,
            cell_type,
            no_data: None,
            values,
        }
    }

    /// Build a tile, rejecting a value count that does not match `cols * rows`.
    pub fn try_new(
        values: Vec<f64>,
        cols: usize,
        rows: usize,
        cell_type: CellType,
    ) -> Result<Self, TileShapeError> {
        let tile = Self {
            cols,
            rows,
            cell_type,
            no_data: None,
            values,
        };
        tile.validate()?;
        Ok(tile)
    }

    /// Check that the value count matches the dimensions.
    ///
    /// Deserialized tiles bypass the constructors, so holders of a tile from
    /// untrusted input call this before indexing into it.
    pub fn validate(&self) -> Result<(), TileShapeError> {
        match self.cols.checked_mul(self.rows) {
            Some(expected) if expected == self.values.len() => Ok(()),
            _ => Err(TileShapeError {
                cols: self.cols,
                rows: self.rows,
                values: self.values.len(),
            }),
        }
    }

    /// A tile where every cell holds `value`.
    pub fn filled(cols: usize, rows: usize, cell_type: CellType, value: f64) -> Self {
        Self::new(vec![value; cols * rows], cols, rows, cell_type)
    }

    pub fn with_no_data(mut self, no_data: Option<f64>) -> Self {
        self.no_data = no_data;
        self
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f64> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.values.get(row * self.cols + col).copied()
    }

    /// Check if `value` is this tile's missing-value marker (NaN counts as
    /// missing for floating point tiles).
    pub fn is_no_data(&self, value: f64) -> bool {
        match self.no_data {
            Some(nd) if nd.is_nan() => value.is_nan(),
            Some(nd) => value == nd,
            None => self.cell_type.is_floating_point() && value.is_nan(),
        }
    }

    /// Number of cells.
    pub fn size(&self) -> usize {
        self.cols * self.rows
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Copy out the cells inside `bounds` (clipped to this tile).
    pub fn crop(&self, bounds: &GridBounds) -> Tile {
        let clipped = bounds
            .intersection(&GridBounds::full(self.cols, self.rows))
            .unwrap_or(GridBounds::new(0, 0, 0, 0));

        let mut values = Vec::with_capacity(clipped.size());
        for row in clipped.row_min..clipped.row_max {
            let start = row * self.cols;
            values.extend_from_slice(&self.values[start + clipped.col_min..start + clipped.col_max]);
        }

        Tile {
            cols: clipped.width(),
            rows: clipped.height(),
            cell_type: self.cell_type,
            no_data: self.no_data,
            values,
        }
    }
}

/// A tile whose value count does not match its dimensions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("tile of {cols}x{rows} cells holds {values} values")]
pub struct TileShapeError {
    pub cols: usize,
    pub rows: usize,
    pub values: usize,
}

/// Several bands sharing dimensions and cell type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultibandTile {
    pub bands: Vec<Tile>,
}

impl MultibandTile {
    pub fn new(bands: Vec<Tile>) -> Self {
        Self { bands }
    }

    pub fn band(&self, index: usize) -> Option<&Tile> {
        self.bands.get(index)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn cols(&self) -> usize {
        self.bands.first().map(|b| b.cols).unwrap_or(0)
    }

    pub fn rows(&self) -> usize {
        self.bands.first().map(|b| b.rows).unwrap_or(0)
    }
}

/// The result of a read: either one band or several, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RasterData {
    Single(Tile),
    Multi(MultibandTile),
}

impl RasterData {
    pub fn cols(&self) -> usize {
        match self {
            RasterData::Single(tile) => tile.cols,
            RasterData::Multi(tile) => tile.cols(),
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            RasterData::Single(tile) => tile.rows,
            RasterData::Multi(tile) => tile.rows(),
        }
    }

    /// Number of cells per band.
    pub fn size(&self) -> usize {
        self.cols() * self.rows()
    }

    pub fn band_count(&self) -> usize {
        match self {
            RasterData::Single(_) => 1,
            RasterData::Multi(tile) => tile.band_count(),
        }
    }

    pub fn band(&self, index: usize) -> Option<&Tile> {
        match self {
            RasterData::Single(tile) if index == 0 => Some(tile),
            RasterData::Single(_) => None,
            RasterData::Multi(tile) => tile.band(index),
        }
    }

    pub fn as_single(&self) -> Option<&Tile> {
        match self {
            RasterData::Single(tile) => Some(tile),
            RasterData::Multi(_) => None,
        }
    }

    pub fn as_multi(&self) -> Option<&MultibandTile> {
        match self {
            RasterData::Single(_) => None,
            RasterData::Multi(tile) => Some(tile),
        }
    }
}

/// Pixel data located in space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedRaster {
    pub data: RasterData,
    pub extent: Extent,
    pub crs: Crs,
}

impl ProjectedRaster {
    pub fn new(data: RasterData, extent: Extent, crs: Crs) -> Self {
        Self { data, extent, crs }
    }

    pub fn cols(&self) -> usize {
        self.data.cols()
    }

    pub fn rows(&self) -> usize {
        self.data.rows()
    }

    /// Number of cells per band.
    pub fn size(&self) -> usize {
        self.data.size()
    }

    pub fn raster_extent(&self) -> RasterExtent {
        RasterExtent::new(self.extent, self.cols(), self.rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_tile() -> Tile {
        let values = (0..12).map(|v| v as f64).collect();
        Tile::new(values, 4, 3, CellType::Int32)
    }

    #[test]
    fn test_tile_get() {
        let tile = test_tile();
        assert_eq!(tile.get(0, 0), Some(0.0));
        assert_eq!(tile.get(3, 2), Some(11.0));
        assert_eq!(tile.get(4, 0), None);
    }

    #[test]
    fn test_tile_crop() {
        let tile = test_tile();
        let cropped = tile.crop(&GridBounds::new(1, 1, 3, 3));
        assert_eq!(cropped.dimensions(), (2, 2));
        assert_eq!(cropped.values, vec![5.0, 6.0, 9.0, 10.0]);

        let clipped = tile.crop(&GridBounds::new(2, 2, 10, 10));
        assert_eq!(clipped.dimensions(), (2, 1));
    }

    #[test]
    fn test_no_data() {
        let tile = test_tile().with_no_data(Some(-9999.0));
        assert!(tile.is_no_data(-9999.0));
        assert!(!tile.is_no_data(0.0));

        let float = Tile::filled(2, 2, CellType::Float32, f64::NAN);
        assert!(float.is_no_data(f64::NAN));
    }

    #[test]
    fn test_raster_data_bands_are_exclusive() {
        let single = RasterData::Single(test_tile());
        assert!(single.as_multi().is_none());
        assert_eq!(single.band_count(), 1);

        let multi = RasterData::Multi(MultibandTile::new(vec![test_tile(), test_tile()]));
        assert!(multi.as_single().is_none());
        assert_eq!(multi.band_count(), 2);
        assert_eq!(multi.size(), 12);
    }

    #[test]
    fn test_try_new_checks_value_count() {
        assert!(Tile::try_new(vec![0.0; 6], 3, 2, CellType::UInt8).is_ok());
        let err = Tile::try_new(vec![0.0; 5], 3, 2, CellType::UInt8).unwrap_err();
        assert_eq!(err, TileShapeError { cols: 3, rows: 2, values: 5 });
    }
}
