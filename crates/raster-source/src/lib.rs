//! Lazy, windowed access to raster datasets.
//!
//! A [`RasterSource`] is resolved from a locator string (plain path,
//! `file://`, `http(s)://`, `hdfs://`, `webhdfs://`, `s3://` or a
//! `gdal+`-prefixed variant for the native driver) without doing any I/O.
//! Metadata is read from the dataset header on first access and cached;
//! pixels are read per window with byte-range requests.
//!
//! Sources are serializable descriptors: runtime handles (HTTP clients,
//! object store connections, parsed headers) are rebuilt on demand after
//! deserialization.

pub mod callback;
pub mod config;
pub mod error;
pub mod geotiff;
pub mod locator;
pub mod metadata;
pub mod raster_ref;
pub mod reader;
pub mod resolver;
pub mod runtime;
pub mod source;
pub mod windows;

pub use callback::{CallbackHandle, CallbackRegistry, ReadCallback, ReadCounter};
pub use config::{ObjectStoreConfig, RasterSourceConfig};
pub use error::{RasterSourceError, Result};
pub use locator::Locator;
pub use metadata::{RasterMetadata, Tags};
pub use raster_ref::{RasterRef, TileHandle};
pub use reader::{register_object_store, Backend, RangeReader};
pub use resolver::{SchemeFamily, SourceResolver};
pub use source::{
    native_driver_available, GeoTiffSource, InMemorySource, NativeSource, RasterSource,
    NOMINAL_TILE_SIZE,
};
pub use windows::{Window, Windows};

pub use raster_common::{
    CellType, Crs, Extent, GridBounds, MultibandTile, ProjectedRaster, RasterData, RasterExtent,
    Tile, TileLayout,
};
