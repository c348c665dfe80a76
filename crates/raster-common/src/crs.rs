//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A coordinate reference system as reported by a raster header.
///
/// Most sources carry an EPSG code. Rasters with a user-defined projection
/// keep whatever textual definition the driver produced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// An EPSG registry code.
    Epsg(u32),
    /// A PROJ or WKT definition string.
    Definition(String),
    /// No georeferencing information available.
    Unknown,
}

impl Crs {
    /// WGS84 geographic (lon/lat in degrees).
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// Web Mercator (meters).
    pub const WEB_MERCATOR: Crs = Crs::Epsg(3857);

    /// Parse a CRS string.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:4326"
    /// - "CRS:84" (equivalent to EPSG:4326)
    /// - "+proj=..." or WKT strings, kept verbatim
    pub fn parse(s: &str) -> Result<Self, CrsParseError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(CrsParseError::Empty);
        }

        let normalized = trimmed.to_uppercase();
        if normalized == "CRS:84" {
            return Ok(Crs::WGS84);
        }
        if normalized == "UNKNOWN" {
            return Ok(Crs::Unknown);
        }

        if let Some(code) = normalized.strip_prefix("EPSG:") {
            return code
                .parse::<u32>()
                .map(Crs::Epsg)
                .map_err(|_| CrsParseError::InvalidEpsgCode(trimmed.to_string()));
        }

        Ok(Crs::Definition(trimmed.to_string()))
    }

    /// The EPSG code, if this CRS has one.
    pub fn epsg_code(&self) -> Option<u32> {
        match self {
            Crs::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    /// Check if this is a well-known geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Epsg(4326 | 4269 | 4258 | 4267 | 4283 | 4617))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Crs::Unknown)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Crs::Unknown
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Definition(def) => write!(f, "{}", def),
            Crs::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for Crs {
    type Err = CrsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Crs::parse(s)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrsParseError {
    #[error("Empty CRS string")]
    Empty,

    #[error("Invalid EPSG code: {0}")]
    InvalidEpsgCode(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_crs() {
        assert_eq!(Crs::parse("EPSG:4326").unwrap(), Crs::Epsg(4326));
        assert_eq!(Crs::parse("epsg:3857").unwrap(), Crs::Epsg(3857));
        assert_eq!(Crs::parse("CRS:84").unwrap(), Crs::WGS84);
        assert!(Crs::parse("EPSG:abc").is_err());
        assert!(Crs::parse("  ").is_err());
        assert_eq!(
            Crs::parse("+proj=longlat +datum=WGS84").unwrap(),
            Crs::Definition("+proj=longlat +datum=WGS84".to_string())
        );
    }

    #[test]
    fn test_display_round_trip() {
        for crs in [Crs::Epsg(32633), Crs::Unknown] {
            assert_eq!(Crs::parse(&crs.to_string()).unwrap(), crs);
        }
    }

    #[test]
    fn test_is_geographic() {
        assert!(Crs::WGS84.is_geographic());
        assert!(!Crs::WEB_MERCATOR.is_geographic());
        assert!(!Crs::Unknown.is_geographic());
    }
}
