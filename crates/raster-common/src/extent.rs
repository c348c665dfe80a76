//! Extent types and operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// An axis-aligned bounding rectangle in the units of some CRS.
///
/// For geographic CRS (EPSG:4326), coordinates are in degrees.
/// For projected CRS (EPSG:3857, UTM, etc.), coordinates are in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    /// Create a new extent from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Parse an extent string: "minx,miny,maxx,maxy"
    pub fn parse(s: &str) -> Result<Self, ExtentParseError> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(ExtentParseError::InvalidFormat(s.to_string()));
        }

        let number = |p: &str| {
            p.parse::<f64>()
                .map_err(|_| ExtentParseError::InvalidNumber(p.to_string()))
        };

        Ok(Self {
            min_x: number(parts[0])?,
            min_y: number(parts[1])?,
            max_x: number(parts[2])?,
            max_y: number(parts[3])?,
        })
    }

    /// Width of the extent in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the extent in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point (x, y).
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Check if this extent overlaps another with a non-zero area.
    ///
    /// Extents that only share an edge do not intersect.
    pub fn intersects(&self, other: &Extent) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_y < other.max_y
            && self.max_y > other.min_y
    }

    /// Compute the intersection of two extents.
    pub fn intersection(&self, other: &Extent) -> Option<Extent> {
        if !self.intersects(other) {
            return None;
        }

        Some(Extent {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Smallest extent covering both `self` and `other`.
    pub fn combine(&self, other: &Extent) -> Extent {
        Extent {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Check if a point is contained within this extent.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if `other` lies entirely within this extent.
    pub fn contains(&self, other: &Extent) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Compare corner by corner with an absolute tolerance.
    pub fn approx_eq(&self, other: &Extent, epsilon: f64) -> bool {
        (self.min_x - other.min_x).abs() <= epsilon
            && (self.min_y - other.min_y).abs() <= epsilon
            && (self.max_x - other.max_x).abs() <= epsilon
            && (self.max_y - other.max_y).abs() <= epsilon
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Extent({}, {}, {}, {})",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

impl FromStr for Extent {
    type Err = ExtentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Extent::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtentParseError {
    #[error("Invalid extent format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in extent: {0}")]
    InvalidNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extent() {
        let extent = Extent::parse("-125.0,24.0,-66.0,50.0").unwrap();
        assert_eq!(extent.min_x, -125.0);
        assert_eq!(extent.min_y, 24.0);
        assert_eq!(extent.max_x, -66.0);
        assert_eq!(extent.max_y, 50.0);
    }

    #[test]
    fn test_intersection() {
        let a = Extent::new(0.0, 0.0, 10.0, 10.0);
        let b = Extent::new(5.0, 5.0, 15.0, 15.0);
        let c = Extent::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));

        let intersection = a.intersection(&b).unwrap();
        assert_eq!(intersection, Extent::new(5.0, 5.0, 10.0, 10.0));
    }

    #[test]
    fn test_combine() {
        let a = Extent::new(0.0, 0.0, 5.0, 5.0);
        let b = Extent::new(5.0, 0.0, 10.0, 5.0);
        assert_eq!(a.combine(&b), Extent::new(0.0, 0.0, 10.0, 5.0));
    }
}
