//! Enumeration of read windows aligned to a raster's native tiling.

use raster_common::{Extent, GridBounds, RasterExtent, TileLayout};
use serde::{Deserialize, Serialize};

/// One cell of the tile layout, clipped to the raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub bounds: GridBounds,
    pub extent: Extent,
}

/// Iterator over a raster's windows, row-major with the column index
/// varying fastest.
///
/// Rasters without a tile layout yield a single window covering the whole
/// grid. Windows never overlap and together cover every pixel exactly once.
#[derive(Debug, Clone)]
pub struct Windows {
    raster_extent: RasterExtent,
    layout: TileLayout,
    next: usize,
}

impl Windows {
    pub fn new(raster_extent: RasterExtent, layout: Option<TileLayout>) -> Self {
        let (cols, rows) = raster_extent.dimensions();
        let layout = layout
            .filter(|l| l.tile_count() > 0)
            .unwrap_or_else(|| TileLayout::new(1, 1, cols, rows));
        Self {
            raster_extent,
            layout,
            next: 0,
        }
    }

    pub fn layout(&self) -> &TileLayout {
        &self.layout
    }

    fn window_at(&self, index: usize) -> Option<Window> {
        let (cols, rows) = self.raster_extent.dimensions();
        let bounds = self.layout.tile_bounds(
            index % self.layout.layout_cols,
            index / self.layout.layout_cols,
            cols,
            rows,
        );
        if bounds.is_empty() {
            return None;
        }
        Some(Window {
            bounds,
            extent: self.raster_extent.extent_for_bounds(&bounds),
        })
    }
}

impl Iterator for Windows {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        // Layouts padded past the grid can produce empty edge tiles.
        while self.next < self.layout.tile_count() {
            let index = self.next;
            self.next += 1;
            if let Some(window) = self.window_at(index) {
                return Some(window);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.next..self.layout.tile_count())
            .filter(|&i| self.window_at(i).is_some())
            .count();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows {}
