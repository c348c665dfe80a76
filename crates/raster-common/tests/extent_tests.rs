//! Tests for Extent and RasterExtent operations.

use raster_common::extent::{Extent, ExtentParseError};
use raster_common::{GridBounds, RasterExtent, TileLayout};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_extent_integer() {
    let extent = Extent::parse("0,0,100,100").unwrap();
    assert_eq!(extent, Extent::new(0.0, 0.0, 100.0, 100.0));
}

#[test]
fn test_parse_extent_whitespace() {
    let extent: Extent = " -180 , -90 , 180 , 90 ".parse().unwrap();
    assert_eq!(extent, Extent::new(-180.0, -90.0, 180.0, 90.0));
}

#[test]
fn test_parse_extent_invalid_format_too_few() {
    let result = Extent::parse("0,0,100");
    assert!(matches!(result, Err(ExtentParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_extent_invalid_number() {
    let result = Extent::parse("0,zero,100,100");
    assert!(matches!(result, Err(ExtentParseError::InvalidNumber(_))));
}

// ============================================================================
// Dimensions
// ============================================================================

#[test]
fn test_extent_width_height_area() {
    let extent = Extent::new(-20037508.34, -10.0, 20037508.34, 10.0);
    assert!((extent.width() - 40075016.68).abs() < 1e-6);
    assert!((extent.height() - 20.0).abs() < f64::EPSILON);
    assert!((Extent::new(0.0, 0.0, 4.0, 2.5).area() - 10.0).abs() < f64::EPSILON);
}

// ============================================================================
// Intersection and containment
// ============================================================================

#[test]
fn test_extent_adjacent_edges_do_not_intersect() {
    let a = Extent::new(0.0, 0.0, 10.0, 10.0);
    let b = Extent::new(10.0, 0.0, 20.0, 10.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_extent_intersection_with_self() {
    let a = Extent::new(-5.0, -5.0, 5.0, 5.0);
    assert_eq!(a.intersection(&a), Some(a));
}

#[test]
fn test_extent_contains() {
    let outer = Extent::new(0.0, 0.0, 10.0, 10.0);
    assert!(outer.contains(&Extent::new(2.0, 2.0, 8.0, 8.0)));
    assert!(outer.contains(&outer));
    assert!(!outer.contains(&Extent::new(2.0, 2.0, 12.0, 8.0)));
    assert!(outer.contains_point(10.0, 0.0));
}

#[test]
fn test_extent_combine_quadrants() {
    let quadrants = [
        Extent::new(0.0, 5.0, 5.0, 10.0),
        Extent::new(5.0, 5.0, 10.0, 10.0),
        Extent::new(0.0, 0.0, 5.0, 5.0),
        Extent::new(5.0, 0.0, 10.0, 5.0),
    ];
    let combined = quadrants[1..]
        .iter()
        .fold(quadrants[0], |acc, e| acc.combine(e));
    assert!(combined.approx_eq(&Extent::new(0.0, 0.0, 10.0, 10.0), 1e-12));
}

// ============================================================================
// Raster extents
// ============================================================================

#[test]
fn test_raster_extent_sub_extent_bounds() {
    let re = RasterExtent::new(Extent::new(500000.0, 4000000.0, 503000.0, 4003000.0), 100, 100);
    let quadrant = Extent::new(500000.0, 4001500.0, 501500.0, 4003000.0);
    let bounds = re.bounds_for_extent(&quadrant).unwrap();
    assert_eq!(bounds, GridBounds::new(0, 0, 50, 50));
    assert_eq!(bounds.size(), 2500);
}

#[test]
fn test_raster_extent_partial_cells_round_outward() {
    let re = RasterExtent::new(Extent::new(0.0, 0.0, 10.0, 10.0), 10, 10);
    let bounds = re.bounds_for_extent(&Extent::new(0.5, 0.5, 2.5, 2.5)).unwrap();
    assert_eq!(bounds, GridBounds::new(0, 7, 3, 10));
}

#[test]
fn test_layout_tiles_cover_grid_exactly() {
    let (cols, rows) = (130, 70);
    let layout = TileLayout::for_dimensions(cols, rows, 64, 32);
    let mut total = 0;
    for r in 0..layout.layout_rows {
        for c in 0..layout.layout_cols {
            total += layout.tile_bounds(c, r, cols, rows).size();
        }
    }
    assert_eq!(total, cols * rows);
}

#[test]
fn test_extent_serde_round_trip() {
    let extent = Extent::new(1.5, -2.25, 3.0, 4.0);
    let json = serde_json::to_string(&extent).unwrap();
    let back: Extent = serde_json::from_str(&json).unwrap();
    assert_eq!(extent, back);
}
