//! Shared test utilities for the raster-source workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A GeoTIFF fixture encoder covering the supported storage variants
//! - Band data generators with verifiable patterns
//! - Ready-made fixture scenarios
//! - Approximate equality assertions
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, GeoTiffBuilder};
//! ```

pub mod fixtures;
pub mod generators;
pub mod geotiff;

// Re-export commonly used items at the crate root
pub use generators::*;
pub use geotiff::{FixtureCompression, GeoTiffBuilder, SegmentShape};

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Macro for approximate equality of two extents, corner by corner.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_extent_approx_eq;
///
/// assert_extent_approx_eq!(read.extent, expected, 1e-9);
/// ```
#[macro_export]
macro_rules! assert_extent_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (l, r) = (&$left, &$right);
        $crate::assert_approx_eq!(l.min_x, r.min_x, $epsilon);
        $crate::assert_approx_eq!(l.min_y, r.min_y, $epsilon);
        $crate::assert_approx_eq!(l.max_x, r.max_x, $epsilon);
        $crate::assert_approx_eq!(l.max_y, r.max_y, $epsilon);
    }};
}
