//! Deferred references to a region of a raster source.

use raster_common::{Extent, GridBounds, ProjectedRaster};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::source::RasterSource;
use crate::windows::Window;

/// A region of a source whose pixels have not been read.
///
/// Serializes as the source descriptor plus the region, so it can be shipped
/// elsewhere and read there. Reading is not cached: every [`RasterRef::tile`]
/// call goes back to the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RasterRef {
    source: Arc<RasterSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subextent: Option<Extent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bounds: Option<GridBounds>,
}

impl RasterRef {
    /// Reference to `subextent` of `source`, or all of it.
    pub fn new(source: Arc<RasterSource>, subextent: Option<Extent>) -> Self {
        Self {
            source,
            subextent,
            bounds: None,
        }
    }

    /// Reference to one enumerated window.
    pub fn for_window(source: Arc<RasterSource>, window: &Window) -> Self {
        Self {
            source,
            subextent: Some(window.extent),
            bounds: Some(window.bounds),
        }
    }

    pub fn source(&self) -> &RasterSource {
        &self.source
    }

    pub fn subextent(&self) -> Option<Extent> {
        self.subextent
    }

    pub fn bounds(&self) -> Option<GridBounds> {
        self.bounds
    }

    /// Extent the tile will cover. Needs source metadata when no subextent
    /// was given.
    pub fn extent(&self) -> Result<Extent> {
        match self.subextent {
            Some(extent) => Ok(extent),
            None => self.source.extent(),
        }
    }

    /// Read the referenced pixels.
    pub fn tile(&self) -> Result<ProjectedRaster> {
        match (self.bounds, self.subextent) {
            (Some(bounds), _) => self.source.read_bounds(&bounds),
            (None, Some(extent)) => self.source.read(&extent),
            (None, None) => self.source.read(&self.source.extent()?),
        }
    }
}

impl fmt::Display for RasterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.subextent {
            Some(extent) => write!(f, "RasterRef({}, {})", self.source, extent),
            None => write!(f, "RasterRef({})", self.source),
        }
    }
}

/// A window result, either deferred or already read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TileHandle {
    Lazy(RasterRef),
    Eager(ProjectedRaster),
}

impl TileHandle {
    pub fn is_lazy(&self) -> bool {
        matches!(self, TileHandle::Lazy(_))
    }

    /// The pixels, reading them now for lazy handles.
    pub fn materialize(&self) -> Result<ProjectedRaster> {
        match self {
            TileHandle::Lazy(raster_ref) => raster_ref.tile(),
            TileHandle::Eager(raster) => Ok(raster.clone()),
        }
    }

    pub fn extent(&self) -> Result<Extent> {
        match self {
            TileHandle::Lazy(raster_ref) => raster_ref.extent(),
            TileHandle::Eager(raster) => Ok(raster.extent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::{CellType, Crs, Tile};

    fn source() -> Arc<RasterSource> {
        let values = (0..16).map(|v| v as f64).collect();
        Arc::new(RasterSource::in_memory(
            Tile::new(values, 4, 4, CellType::UInt8),
            Extent::new(0.0, 0.0, 4.0, 4.0),
            Crs::WGS84,
        ))
    }

    #[test]
    fn test_ref_reads_subextent() {
        let r = RasterRef::new(source(), Some(Extent::new(2.0, 2.0, 4.0, 4.0)));
        let raster = r.tile().unwrap();
        assert_eq!(raster.data.as_single().unwrap().values, vec![2.0, 3.0, 6.0, 7.0]);
        assert_eq!(r.extent().unwrap(), Extent::new(2.0, 2.0, 4.0, 4.0));
    }

    #[test]
    fn test_ref_without_subextent_reads_everything() {
        let r = RasterRef::new(source(), None);
        assert_eq!(r.tile().unwrap().size(), 16);
        assert_eq!(r.extent().unwrap(), Extent::new(0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn test_handle_materialize_matches() {
        let src = source();
        let raster = src.read(&Extent::new(0.0, 0.0, 4.0, 4.0)).unwrap();
        let lazy = TileHandle::Lazy(RasterRef::new(Arc::clone(&src), None));
        let eager = TileHandle::Eager(raster.clone());
        assert!(lazy.is_lazy());
        assert!(!eager.is_lazy());
        assert_eq!(lazy.materialize().unwrap(), raster);
        assert_eq!(eager.materialize().unwrap(), raster);
    }

    #[test]
    fn test_ref_serde_round_trip() {
        let r = RasterRef::new(source(), Some(Extent::new(0.0, 0.0, 2.0, 2.0)));
        let json = serde_json::to_string(&r).unwrap();
        let back: RasterRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back.to_string(), r.to_string());
        assert_eq!(back.tile().unwrap(), r.tile().unwrap());
    }
}
