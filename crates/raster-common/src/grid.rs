//! Pixel grids: grid bounds, raster extents and tile layouts.

use crate::Extent;
use serde::{Deserialize, Serialize};

/// Tolerance (in cells) applied before flooring/ceiling map-to-grid
/// conversions, so extents computed from grid bounds map back exactly.
const GRID_SNAP_EPSILON: f64 = 1e-6;

/// A rectangular range of pixels. `col_max` and `row_max` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    pub col_min: usize,
    pub row_min: usize,
    pub col_max: usize,
    pub row_max: usize,
}

impl GridBounds {
    pub fn new(col_min: usize, row_min: usize, col_max: usize, row_max: usize) -> Self {
        Self {
            col_min,
            row_min,
            col_max,
            row_max,
        }
    }

    /// Bounds covering a whole `cols` x `rows` grid.
    pub fn full(cols: usize, rows: usize) -> Self {
        Self::new(0, 0, cols, rows)
    }

    pub fn width(&self) -> usize {
        self.col_max.saturating_sub(self.col_min)
    }

    pub fn height(&self) -> usize {
        self.row_max.saturating_sub(self.row_min)
    }

    /// Number of pixels covered.
    pub fn size(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn contains(&self, col: usize, row: usize) -> bool {
        col >= self.col_min && col < self.col_max && row >= self.row_min && row < self.row_max
    }

    pub fn intersection(&self, other: &GridBounds) -> Option<GridBounds> {
        let bounds = GridBounds {
            col_min: self.col_min.max(other.col_min),
            row_min: self.row_min.max(other.row_min),
            col_max: self.col_max.min(other.col_max),
            row_max: self.row_max.min(other.row_max),
        };

        if bounds.col_min >= bounds.col_max || bounds.row_min >= bounds.row_max {
            None
        } else {
            Some(bounds)
        }
    }
}

/// An extent paired with the pixel dimensions that cover it.
///
/// This is the pixel-to-map transform of a north-up raster: row 0 is the
/// top (max_y) edge and column 0 is the left (min_x) edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterExtent {
    pub extent: Extent,
    pub cols: usize,
    pub rows: usize,
}

impl RasterExtent {
    pub fn new(extent: Extent, cols: usize, rows: usize) -> Self {
        Self { extent, cols, rows }
    }

    /// Width of one cell in map units.
    pub fn cell_width(&self) -> f64 {
        self.extent.width() / self.cols as f64
    }

    /// Height of one cell in map units.
    pub fn cell_height(&self) -> f64 {
        self.extent.height() / self.rows as f64
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn size(&self) -> usize {
        self.cols * self.rows
    }

    pub fn grid_bounds(&self) -> GridBounds {
        GridBounds::full(self.cols, self.rows)
    }

    /// Map coordinates to the (col, row) of the containing cell.
    ///
    /// The result may be negative or beyond the grid for points outside
    /// the extent.
    pub fn map_to_grid(&self, x: f64, y: f64) -> (i64, i64) {
        let col = snap((x - self.extent.min_x) / self.cell_width()).floor();
        let row = snap((self.extent.max_y - y) / self.cell_height()).floor();
        (col as i64, row as i64)
    }

    /// Center of the cell at (col, row) in map coordinates.
    pub fn grid_to_map(&self, col: usize, row: usize) -> (f64, f64) {
        let x = self.extent.min_x + (col as f64 + 0.5) * self.cell_width();
        let y = self.extent.max_y - (row as f64 + 0.5) * self.cell_height();
        (x, y)
    }

    /// The pixels touched by `extent`, clipped to the grid.
    ///
    /// Returns `None` when the extent does not cover any cell.
    pub fn bounds_for_extent(&self, extent: &Extent) -> Option<GridBounds> {
        let cw = self.cell_width();
        let ch = self.cell_height();
        let cols = self.cols as f64;
        let rows = self.rows as f64;

        let col_min = snap((extent.min_x - self.extent.min_x) / cw).floor().clamp(0.0, cols);
        let col_max = snap((extent.max_x - self.extent.min_x) / cw).ceil().clamp(0.0, cols);
        let row_min = snap((self.extent.max_y - extent.max_y) / ch).floor().clamp(0.0, rows);
        let row_max = snap((self.extent.max_y - extent.min_y) / ch).ceil().clamp(0.0, rows);

        let bounds = GridBounds::new(
            col_min as usize,
            row_min as usize,
            col_max as usize,
            row_max as usize,
        );

        if bounds.is_empty() {
            None
        } else {
            Some(bounds)
        }
    }

    /// The map extent covered by a range of pixels.
    pub fn extent_for_bounds(&self, bounds: &GridBounds) -> Extent {
        let cw = self.cell_width();
        let ch = self.cell_height();
        Extent::new(
            self.extent.min_x + bounds.col_min as f64 * cw,
            self.extent.max_y - bounds.row_max as f64 * ch,
            self.extent.min_x + bounds.col_max as f64 * cw,
            self.extent.max_y - bounds.row_min as f64 * ch,
        )
    }
}

fn snap(value: f64) -> f64 {
    let rounded = value.round();
    if (value - rounded).abs() < GRID_SNAP_EPSILON {
        rounded
    } else {
        value
    }
}

/// A regular grid of equally sized tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileLayout {
    /// Number of tile columns.
    pub layout_cols: usize,
    /// Number of tile rows.
    pub layout_rows: usize,
    /// Width of one tile in pixels.
    pub tile_cols: usize,
    /// Height of one tile in pixels.
    pub tile_rows: usize,
}

impl TileLayout {
    pub fn new(layout_cols: usize, layout_rows: usize, tile_cols: usize, tile_rows: usize) -> Self {
        Self {
            layout_cols,
            layout_rows,
            tile_cols,
            tile_rows,
        }
    }

    /// The layout of `tile_cols` x `tile_rows` tiles needed to cover a
    /// `cols` x `rows` grid. Edge tiles may extend past the grid.
    pub fn for_dimensions(cols: usize, rows: usize, tile_cols: usize, tile_rows: usize) -> Self {
        let tile_cols = tile_cols.max(1);
        let tile_rows = tile_rows.max(1);
        Self {
            layout_cols: (cols + tile_cols - 1) / tile_cols,
            layout_rows: (rows + tile_rows - 1) / tile_rows,
            tile_cols,
            tile_rows,
        }
    }

    pub fn tile_count(&self) -> usize {
        self.layout_cols * self.layout_rows
    }

    /// Pixel bounds of the tile at (layout_col, layout_row), clipped to a
    /// `cols` x `rows` grid.
    pub fn tile_bounds(
        &self,
        layout_col: usize,
        layout_row: usize,
        cols: usize,
        rows: usize,
    ) -> GridBounds {
        let col_min = (layout_col * self.tile_cols).min(cols);
        let row_min = (layout_row * self.tile_rows).min(rows);
        GridBounds::new(
            col_min,
            row_min,
            (col_min + self.tile_cols).min(cols),
            (row_min + self.tile_rows).min(rows),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raster_extent() -> RasterExtent {
        RasterExtent::new(Extent::new(0.0, 0.0, 100.0, 50.0), 200, 100)
    }

    #[test]
    fn test_cell_size() {
        let re = raster_extent();
        assert!((re.cell_width() - 0.5).abs() < f64::EPSILON);
        assert!((re.cell_height() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bounds_extent_round_trip() {
        let re = raster_extent();
        let bounds = GridBounds::new(10, 20, 110, 70);
        let extent = re.extent_for_bounds(&bounds);
        assert_eq!(re.bounds_for_extent(&extent), Some(bounds));
    }

    #[test]
    fn test_bounds_for_extent_clips() {
        let re = raster_extent();
        let bounds = re
            .bounds_for_extent(&Extent::new(-10.0, -10.0, 10.0, 10.0))
            .unwrap();
        assert_eq!(bounds, GridBounds::new(0, 80, 20, 100));

        assert!(re
            .bounds_for_extent(&Extent::new(200.0, 200.0, 300.0, 300.0))
            .is_none());
    }

    #[test]
    fn test_map_to_grid() {
        let re = raster_extent();
        assert_eq!(re.map_to_grid(0.1, 49.9), (0, 0));
        assert_eq!(re.map_to_grid(99.9, 0.1), (199, 99));
        let (x, y) = re.grid_to_map(0, 0);
        assert!((x - 0.25).abs() < 1e-12 && (y - 49.75).abs() < 1e-12);
    }

    #[test]
    fn test_tile_layout_ceiling_division() {
        let layout = TileLayout::for_dimensions(100, 90, 32, 32);
        assert_eq!(layout.layout_cols, 4);
        assert_eq!(layout.layout_rows, 3);
        assert_eq!(layout.tile_count(), 12);
        assert_eq!(layout.tile_bounds(3, 2, 100, 90), GridBounds::new(96, 64, 100, 90));
    }

    #[test]
    fn test_grid_bounds_intersection() {
        let a = GridBounds::new(0, 0, 10, 10);
        let b = GridBounds::new(5, 5, 20, 20);
        assert_eq!(a.intersection(&b), Some(GridBounds::new(5, 5, 10, 10)));
        assert!(a.intersection(&GridBounds::new(10, 0, 12, 4)).is_none());
    }
}
