//! Common test fixtures for raster-source tests.
//!
//! Ready-made GeoTIFF scenarios built with [`GeoTiffBuilder`].

use raster_common::{CellType, Extent};

use crate::generators::{
    create_byte_grid, create_constant_grid, create_float_grid, create_grid_with_marker, create_test_grid,
};
use crate::geotiff::{FixtureCompression, GeoTiffBuilder};

/// Common extents for testing.
pub mod extent {
    use raster_common::Extent;

    /// A 100 km square in Web Mercator near the origin.
    pub const WEB_MERCATOR_100KM: Extent = Extent {
        min_x: 0.0,
        min_y: 0.0,
        max_x: 100_000.0,
        max_y: 100_000.0,
    };

    /// One-degree square in WGS84.
    pub const ONE_DEGREE: Extent = Extent {
        min_x: -100.0,
        min_y: 40.0,
        max_x: -99.0,
        max_y: 41.0,
    };
}

/// Acquisition time written to fixtures, and its RFC 3339 form.
pub const FIXTURE_DATETIME: &str = "2019:07:04 12:30:00";
pub const FIXTURE_DATETIME_RFC3339: &str = "2019-07-04T12:30:00+00:00";

/// GDAL_METADATA written to [`standard_geotiff`].
pub const FIXTURE_GDAL_METADATA: &str = r#"<GDALMetadata>
  <Item name="PRODUCT">fixture</Item>
  <Item name="SCALE" sample="0">0.5</Item>
  <Item name="IGNORED" domain="IMAGE_STRUCTURE">x</Item>
</GDALMetadata>"#;

/// 100 x 100 Int32 raster in 50 x 50 tiles, Web Mercator, with tags,
/// timestamp and a nodata marker. Values follow `create_test_grid`.
pub fn standard_geotiff() -> GeoTiffBuilder {
    GeoTiffBuilder::new(100, 100, CellType::Int32, create_test_grid(100, 100))
        .tiled(50, 50)
        .extent(extent::WEB_MERCATOR_100KM)
        .epsg(3857)
        .datetime(FIXTURE_DATETIME)
        .gdal_metadata(FIXTURE_GDAL_METADATA)
        .no_data("-9999")
        .ascii_tag(305, "test-utils")
}

/// Tiled raster whose edge tiles are partial.
pub fn ragged_tiled_geotiff(cols: usize, rows: usize, tile: usize) -> GeoTiffBuilder {
    GeoTiffBuilder::new(cols, rows, CellType::Int32, create_test_grid(cols, rows))
        .tiled(tile, tile)
        .extent(Extent::new(0.0, 0.0, cols as f64, rows as f64))
        .epsg(3857)
}

/// Striped Float32 raster with DEFLATE and the floating point predictor.
pub fn compressed_float_geotiff(cols: usize, rows: usize) -> GeoTiffBuilder {
    GeoTiffBuilder::new(cols, rows, CellType::Float32, create_float_grid(cols, rows))
        .striped(7)
        .compression(FixtureCompression::Deflate)
        .predictor(3)
        .extent(extent::ONE_DEGREE)
        .epsg(4326)
}

/// Three-band UInt8 raster.
pub fn rgb_geotiff(cols: usize, rows: usize) -> GeoTiffBuilder {
    GeoTiffBuilder::new(cols, rows, CellType::UInt8, create_byte_grid(cols, rows, 0))
        .band(create_byte_grid(cols, rows, 85))
        .band(create_byte_grid(cols, rows, 170))
        .extent(Extent::new(0.0, 0.0, cols as f64, rows as f64))
        .epsg(32633)
}

/// Nodata value written by [`nodata_marker_geotiff`].
pub const MARKER_NO_DATA: f64 = -9999.0;

/// Int16 raster of zeros with [`MARKER_NO_DATA`] at `positions`, declared
/// as the nodata value.
pub fn nodata_marker_geotiff(cols: usize, rows: usize, positions: &[(usize, usize)]) -> GeoTiffBuilder {
    GeoTiffBuilder::new(
        cols,
        rows,
        CellType::Int16,
        create_grid_with_marker(cols, rows, MARKER_NO_DATA, positions),
    )
    .tiled(16, 16)
    .extent(Extent::new(0.0, 0.0, cols as f64, rows as f64))
    .epsg(3857)
    .no_data("-9999")
}

/// LZW-compressed Float32 raster holding `value` everywhere.
pub fn constant_geotiff(cols: usize, rows: usize, value: f64) -> GeoTiffBuilder {
    GeoTiffBuilder::new(cols, rows, CellType::Float32, create_constant_grid(cols, rows, value))
        .tiled(16, 16)
        .compression(FixtureCompression::Lzw)
        .extent(extent::ONE_DEGREE)
        .epsg(4326)
}
