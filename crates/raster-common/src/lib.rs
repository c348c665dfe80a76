//! Common types shared across the raster-source workspace.
//!
//! Everything here is plain data: extents, coordinate reference systems,
//! pixel grids, cell types and decoded tiles. No I/O happens in this crate.

pub mod cell;
pub mod crs;
pub mod extent;
pub mod grid;
pub mod tile;

pub use cell::CellType;
pub use crs::{Crs, CrsParseError};
pub use extent::{Extent, ExtentParseError};
pub use grid::{GridBounds, RasterExtent, TileLayout};
pub use tile::{MultibandTile, ProjectedRaster, RasterData, Tile, TileShapeError};
