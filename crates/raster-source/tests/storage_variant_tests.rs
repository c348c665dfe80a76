//! Decoding of the GeoTIFF storage variants: compression, predictors,
//! byte order, BigTIFF, striping and band interleaving.

mod common;

use common::{assert_tile_matches, pixel_sum, single, Fixture};
use raster_source::{CellType, Crs, Extent, GridBounds};
use test_utils::fixtures;
use test_utils::{
    assert_extent_approx_eq, create_byte_grid, create_float_grid, create_sequential_grid,
    create_test_grid, test_grid_value, FixtureCompression, GeoTiffBuilder,
};

/// Value lookup for a band produced by one of the generators.
fn lookup(values: Vec<f64>, cols: usize) -> impl Fn(usize, usize) -> f64 {
    move |col, row| values[row * cols + col]
}

fn assert_full_read(builder: &GeoTiffBuilder, cols: usize, rows: usize, expected: impl Fn(usize, usize) -> f64) {
    let fixture = Fixture::write(builder);
    let source = fixture.source();
    assert_eq!(source.dimensions().unwrap(), (cols, rows));

    let bounds = GridBounds::full(cols, rows);
    let raster = source.read_bounds(&bounds).unwrap();
    assert_tile_matches(single(&raster), &bounds, &expected);

    // A window that starts and ends inside segments.
    let inner = GridBounds::new(3, 5, cols - 2, rows - 1);
    let raster = source.read_bounds(&inner).unwrap();
    assert_tile_matches(single(&raster), &inner, &expected);
}

// ============================================================================
// Compression and predictors
// ============================================================================

#[test]
fn test_deflate_tiled() {
    let builder = GeoTiffBuilder::new(37, 29, CellType::Int32, create_test_grid(37, 29))
        .tiled(16, 16)
        .compression(FixtureCompression::Deflate);
    assert_full_read(&builder, 37, 29, test_grid_value);
}

#[test]
fn test_lzw_striped() {
    let builder = GeoTiffBuilder::new(40, 33, CellType::UInt8, create_byte_grid(40, 33, 5))
        .striped(8)
        .compression(FixtureCompression::Lzw);
    assert_full_read(&builder, 40, 33, lookup(create_byte_grid(40, 33, 5), 40));
}

#[test]
fn test_packbits() {
    let builder = GeoTiffBuilder::new(20, 20, CellType::UInt16, create_sequential_grid(20, 20))
        .tiled(16, 16)
        .compression(FixtureCompression::PackBits);
    assert_full_read(&builder, 20, 20, lookup(create_sequential_grid(20, 20), 20));
}

#[test]
fn test_horizontal_predictor_uint16() {
    let builder = GeoTiffBuilder::new(50, 20, CellType::UInt16, create_sequential_grid(50, 20))
        .tiled(32, 16)
        .compression(FixtureCompression::Lzw)
        .predictor(2);
    assert_full_read(&builder, 50, 20, lookup(create_sequential_grid(50, 20), 50));
}

#[test]
fn test_horizontal_predictor_signed() {
    let values: Vec<f64> = create_test_grid(30, 12).into_iter().map(|v| 500.0 - v).collect();
    let builder = GeoTiffBuilder::new(30, 12, CellType::Int32, values.clone())
        .striped(5)
        .compression(FixtureCompression::Deflate)
        .predictor(2);
    assert_full_read(&builder, 30, 12, lookup(values, 30));
}

#[test]
fn test_floating_point_predictor() {
    let fixture = Fixture::write(&fixtures::compressed_float_geotiff(41, 23));
    let source = fixture.source();
    assert_eq!(source.cell_type().unwrap(), CellType::Float32);
    assert_eq!(source.crs().unwrap(), Crs::WGS84);

    let bounds = GridBounds::full(41, 23);
    let raster = source.read_bounds(&bounds).unwrap();
    assert_tile_matches(single(&raster), &bounds, lookup(create_float_grid(41, 23), 41));
}

#[test]
fn test_floating_point_predictor_float64_big_endian() {
    let builder = GeoTiffBuilder::new(17, 9, CellType::Float64, create_float_grid(17, 9))
        .tiled(16, 16)
        .big_endian()
        .compression(FixtureCompression::Deflate)
        .predictor(3);
    assert_full_read(&builder, 17, 9, lookup(create_float_grid(17, 9), 17));
}

// ============================================================================
// File structure
// ============================================================================

#[test]
fn test_big_endian() {
    let builder = GeoTiffBuilder::new(25, 25, CellType::Int32, create_test_grid(25, 25))
        .tiled(16, 16)
        .big_endian()
        .extent(Extent::new(10.0, 20.0, 35.0, 45.0))
        .epsg(32633);
    assert_full_read(&builder, 25, 25, test_grid_value);

    let fixture = Fixture::write(&builder);
    let source = fixture.source();
    assert_eq!(source.crs().unwrap(), Crs::Epsg(32633));
    assert_extent_approx_eq!(source.extent().unwrap(), Extent::new(10.0, 20.0, 35.0, 45.0), 1e-9);
}

#[test]
fn test_big_tiff() {
    let builder = GeoTiffBuilder::new(33, 18, CellType::Int32, create_test_grid(33, 18))
        .tiled(16, 16)
        .big_tiff()
        .compression(FixtureCompression::Deflate);
    assert_full_read(&builder, 33, 18, test_grid_value);
}

#[test]
fn test_big_tiff_big_endian_striped() {
    let builder = GeoTiffBuilder::new(21, 14, CellType::Int16, create_sequential_grid(21, 14))
        .striped(3)
        .big_tiff()
        .big_endian();
    assert_full_read(&builder, 21, 14, lookup(create_sequential_grid(21, 14), 21));
}

#[test]
fn test_pixel_is_point_extent() {
    let builder = GeoTiffBuilder::new(10, 10, CellType::UInt8, create_byte_grid(10, 10, 0))
        .extent(Extent::new(0.0, 0.0, 100.0, 100.0))
        .pixel_is_point()
        .epsg(3857);
    let fixture = Fixture::write(&builder);
    assert_extent_approx_eq!(
        fixture.source().extent().unwrap(),
        Extent::new(0.0, 0.0, 100.0, 100.0),
        1e-9
    );
}

#[test]
fn test_ungeoreferenced_is_pixel_space() {
    let builder = GeoTiffBuilder::new(12, 8, CellType::UInt8, create_byte_grid(12, 8, 0));
    let fixture = Fixture::write(&builder);
    let source = fixture.source();
    assert_eq!(source.crs().unwrap(), Crs::Unknown);
    assert_eq!(source.extent().unwrap(), Extent::new(0.0, 0.0, 12.0, 8.0));
}

#[test]
fn test_sparse_segment_reads_no_data() {
    let builder = GeoTiffBuilder::new(32, 16, CellType::Int32, create_test_grid(32, 16))
        .tiled(16, 16)
        .no_data("-1")
        .sparse_segment(1);
    let fixture = Fixture::write(&builder);
    let source = fixture.source();

    let raster = source.read_bounds(&GridBounds::full(32, 16)).unwrap();
    let tile = single(&raster);
    assert_eq!(tile.get(3, 3), Some(test_grid_value(3, 3)));
    assert_eq!(tile.get(20, 3), Some(-1.0));
    assert!(tile.is_no_data(tile.get(31, 15).unwrap()));
}

// ============================================================================
// Bands
// ============================================================================

#[test]
fn test_chunky_and_planar_bands_agree() {
    for planar in [false, true] {
        let mut builder = fixtures::rgb_geotiff(30, 20).tiled(16, 16);
        if planar {
            builder = builder.planar_separate();
        }
        let fixture = Fixture::write(&builder);
        let source = fixture.source();
        assert_eq!(source.band_count().unwrap(), 3);

        let bounds = GridBounds::new(4, 2, 27, 19);
        let raster = source.read_bounds(&bounds).unwrap();
        let multi = raster.data.as_multi().expect("multiband");
        for (band, offset) in [0usize, 85, 170].into_iter().enumerate() {
            assert_tile_matches(
                multi.band(band).unwrap(),
                &bounds,
                lookup(create_byte_grid(30, 20, offset), 30),
            );
        }
    }
}

#[test]
fn test_band_subset_in_request_order() {
    let fixture = Fixture::write(&fixtures::rgb_geotiff(16, 16).striped(4));
    let source = fixture.source();

    let bounds = GridBounds::full(16, 16);
    let raster = source.read_bounds_bands(&bounds, &[2, 0]).unwrap();
    let multi = raster.data.as_multi().unwrap();
    assert_eq!(multi.band_count(), 2);
    assert_tile_matches(multi.band(0).unwrap(), &bounds, lookup(create_byte_grid(16, 16, 170), 16));
    assert_tile_matches(multi.band(1).unwrap(), &bounds, lookup(create_byte_grid(16, 16, 0), 16));

    let one = source.read_bounds_bands(&bounds, &[1]).unwrap();
    assert_tile_matches(single(&one), &bounds, lookup(create_byte_grid(16, 16, 85), 16));
}

// ============================================================================
// Value scenarios
// ============================================================================

#[test]
fn test_nodata_markers_survive_decoding() {
    let markers = [(0, 0), (17, 3), (39, 24)];
    let fixture = Fixture::write(&fixtures::nodata_marker_geotiff(40, 25, &markers));
    let source = fixture.source();
    assert_eq!(source.no_data().unwrap(), Some(fixtures::MARKER_NO_DATA));

    let raster = source.read_bounds(&GridBounds::full(40, 25)).unwrap();
    let tile = single(&raster);
    for &(col, row) in &markers {
        let value = tile.get(col, row).unwrap();
        assert!(tile.is_no_data(value), "({}, {})", col, row);
    }
    assert_eq!(tile.values.iter().filter(|&&v| tile.is_no_data(v)).count(), markers.len());
    assert_eq!(tile.get(1, 0), Some(0.0));
}

#[test]
fn test_constant_raster_windows() {
    let fixture = Fixture::write(&fixtures::constant_geotiff(35, 20, 2.5));
    let source = fixture.source();

    let rasters: Vec<_> = source.read_all().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(rasters.len(), 6);
    let total: f64 = rasters.iter().map(pixel_sum).sum();
    assert_eq!(total, 2.5 * (35 * 20) as f64);
}
