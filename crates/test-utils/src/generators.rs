//! Test data generators for synthetic raster bands.
//!
//! These generators create predictable, verifiable patterns so a test can
//! check any decoded pixel against the value it must hold.

/// Creates a band with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read correctly by
/// checking that band[row * width + col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[0], 0.0);    // col=0, row=0
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// The value [`create_test_grid`] puts at (col, row).
pub fn test_grid_value(col: usize, row: usize) -> f64 {
    (col * 1000 + row) as f64
}

/// Row-major cell index as the value: `row * width + col`.
///
/// Fits any 16-bit or wider cell type for rasters up to 65536 cells.
pub fn create_sequential_grid(width: usize, height: usize) -> Vec<f64> {
    (0..width * height).map(|v| v as f64).collect()
}

/// A byte-sized pattern, `(col + row * 7 + offset) % 256`, for 8-bit bands.
pub fn create_byte_grid(width: usize, height: usize, offset: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push(((col + row * 7 + offset) % 256) as f64);
        }
    }
    data
}

/// Smooth floating point surface with negative and fractional values.
pub fn create_float_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            let x = col as f64 / width.max(1) as f64;
            let y = row as f64 / height.max(1) as f64;
            // Multiples of 1/8 survive the f32 round trip exactly.
            data.push(((x * 40.0 - y * 25.0) * 8.0).round() / 8.0 - 3.5);
        }
    }
    data
}

/// Creates a constant band.
pub fn create_constant_grid(width: usize, height: usize, value: f64) -> Vec<f64> {
    vec![value; width * height]
}

/// Creates a band with `value` at the given (col, row) positions, zeros
/// elsewhere. Useful for testing missing-data markers.
pub fn create_grid_with_marker(
    width: usize,
    height: usize,
    value: f64,
    positions: &[(usize, usize)],
) -> Vec<f64> {
    let mut data = vec![0.0; width * height];
    for &(col, row) in positions {
        if col < width && row < height {
            data[row * width + col] = value;
        }
    }
    data
}
