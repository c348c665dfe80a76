//! Native raster driver (GDAL) source.
//!
//! Compiled in with the `gdal` cargo feature. Without it the driver probe
//! reports unavailable and `gdal` locators resolve to the byte-range
//! backends instead.

use once_cell::sync::{Lazy, OnceCell};
use raster_common::{GridBounds, Tile};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::SourceBackend;
use crate::error::Result;
use crate::locator::Locator;
use crate::metadata::RasterMetadata;

static NATIVE_DRIVER_AVAILABLE: Lazy<bool> = Lazy::new(probe_native_driver);

/// Whether the native driver can be used in this process.
///
/// Probed once; a failed probe is logged once and never raised.
pub fn native_driver_available() -> bool {
    *NATIVE_DRIVER_AVAILABLE
}

#[cfg(feature = "gdal")]
fn probe_native_driver() -> bool {
    match std::panic::catch_unwind(|| gdal::version::version_info("RELEASE_NAME")) {
        Ok(version) => {
            tracing::info!(version = %version, "Native raster driver available");
            true
        }
        Err(_) => {
            tracing::warn!("Native raster driver failed to initialize, falling back to range readers");
            false
        }
    }
}

#[cfg(not(feature = "gdal"))]
fn probe_native_driver() -> bool {
    tracing::warn!("Native raster driver not compiled in (enable the `gdal` feature), falling back to range readers");
    false
}

/// A raster opened through the native driver.
///
/// Datasets are opened per operation; only the metadata is cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeSource {
    locator: Locator,
    #[serde(skip)]
    metadata: OnceCell<RasterMetadata>,
}

impl NativeSource {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            metadata: OnceCell::new(),
        }
    }

    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Path handed to the driver, using its virtual filesystem prefixes for
    /// remote locators.
    pub fn driver_path(&self) -> String {
        driver_path(&self.locator.unwrap_native())
    }
}

fn driver_path(locator: &Locator) -> String {
    let raw = locator.as_str();
    match locator.scheme().as_deref() {
        None => raw.to_string(),
        Some("file") => locator
            .local_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| raw.to_string()),
        Some("http") | Some("https") => format!("/vsicurl/{}", raw),
        Some("s3") | Some("s3a") | Some("s3n") => {
            let rest = raw.split_once("://").map(|(_, r)| r).unwrap_or(raw);
            format!("/vsis3/{}", rest)
        }
        Some("hdfs") => format!("/vsihdfs/{}", raw),
        Some("webhdfs") => {
            let rest = raw.split_once("://").map(|(_, r)| r).unwrap_or(raw);
            match rest.split_once('/') {
                Some((authority, path)) => {
                    format!("/vsiwebhdfs/http://{}/webhdfs/v1/{}", authority, path)
                }
                None => format!("/vsiwebhdfs/http://{}", rest),
            }
        }
        Some(_) => raw.to_string(),
    }
}

impl SourceBackend for NativeSource {
    fn metadata(&self) -> Result<&RasterMetadata> {
        super::memoize(&self.metadata, || driver::read_metadata(&self.driver_path()))
    }

    fn read_bands(&self, bounds: &GridBounds, bands: &[usize]) -> Result<Vec<Tile>> {
        let metadata = self.metadata()?;
        driver::read_bands(&self.driver_path(), metadata, bounds, bands)
    }
}

impl fmt::Display for NativeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeRasterSource({})", self.locator)
    }
}

#[cfg(feature = "gdal")]
mod driver {
    use gdal::raster::GdalDataType;
    use gdal::{Dataset, Metadata};
    use raster_common::{CellType, Crs, Extent, GridBounds, Tile, TileLayout};
    use std::collections::BTreeMap;
    use tracing::{debug, info};

    use crate::error::{RasterSourceError, Result};
    use crate::metadata::{RasterMetadata, Tags};

    fn open(path: &str) -> Result<Dataset> {
        Dataset::open(path).map_err(|e| RasterSourceError::transport(path, e))
    }

    fn to_tags(items: Option<Vec<String>>) -> BTreeMap<String, String> {
        items
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                item.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
            })
            .collect()
    }

    fn cell_type(data_type: GdalDataType) -> Result<CellType> {
        match data_type {
            GdalDataType::UInt8 => Ok(CellType::UInt8),
            GdalDataType::UInt16 => Ok(CellType::UInt16),
            GdalDataType::Int16 => Ok(CellType::Int16),
            GdalDataType::UInt32 => Ok(CellType::UInt32),
            GdalDataType::Int32 => Ok(CellType::Int32),
            GdalDataType::Float32 => Ok(CellType::Float32),
            GdalDataType::Float64 => Ok(CellType::Float64),
            other => Err(RasterSourceError::unsupported_format(format!(
                "native data type {:?}",
                other
            ))),
        }
    }

    pub fn read_metadata(path: &str) -> Result<RasterMetadata> {
        let dataset = open(path)?;
        let (cols, rows) = dataset.raster_size();
        let band_count = dataset.raster_count() as usize;
        if band_count == 0 {
            return Err(RasterSourceError::format_parse(format!("{} has no bands", path)));
        }

        let extent = match dataset.geo_transform() {
            Ok(gt) => {
                let max_y = gt[3];
                let min_y = gt[3] + gt[5] * rows as f64;
                Extent::new(gt[0], min_y.min(max_y), gt[0] + gt[1] * cols as f64, min_y.max(max_y))
            }
            Err(_) => Extent::new(0.0, 0.0, cols as f64, rows as f64),
        };

        let crs = match dataset.spatial_ref() {
            Ok(srs) => match srs.auth_code() {
                Ok(code) if code > 0 => Crs::Epsg(code as u32),
                _ => srs.to_wkt().map(Crs::Definition).unwrap_or(Crs::Unknown),
            },
            Err(_) => Crs::Unknown,
        };

        let first = dataset
            .rasterband(1)
            .map_err(|e| RasterSourceError::transport(path, e))?;
        let (block_cols, block_rows) = first.block_size();
        // Striped datasets report full-width blocks.
        let tile_layout = (block_cols != cols)
            .then(|| TileLayout::for_dimensions(cols, rows, block_cols, block_rows));

        let mut tags = Tags {
            head: to_tags(dataset.metadata_domain("")),
            bands: Vec::with_capacity(band_count),
        };
        for index in 1..=band_count {
            let band = dataset
                .rasterband(index as _)
                .map_err(|e| RasterSourceError::transport(path, e))?;
            tags.bands.push(to_tags(band.metadata_domain("")));
        }

        let timestamp = tags
            .get("TIFFTAG_DATETIME")
            .and_then(crate::geotiff::parse_tiff_datetime);

        info!(path, cols, rows, bands = band_count, "Opened raster with native driver");

        Ok(RasterMetadata {
            crs,
            extent,
            cols,
            rows,
            cell_type: cell_type(first.band_type())?,
            band_count,
            tags,
            timestamp,
            tile_layout,
            no_data: first.no_data_value(),
        })
    }

    pub fn read_bands(
        path: &str,
        metadata: &RasterMetadata,
        bounds: &GridBounds,
        bands: &[usize],
    ) -> Result<Vec<Tile>> {
        let bounds = bounds
            .intersection(&GridBounds::full(metadata.cols, metadata.rows))
            .ok_or_else(|| {
                RasterSourceError::out_of_bounds(
                    format!("{:?}", bounds),
                    format!("{}x{} grid", metadata.cols, metadata.rows),
                )
            })?;

        let dataset = open(path)?;
        let size = (bounds.width(), bounds.height());
        let origin = (bounds.col_min as isize, bounds.row_min as isize);

        let mut tiles = Vec::with_capacity(bands.len());
        for &band_index in bands {
            let band = dataset
                .rasterband((band_index + 1) as _)
                .map_err(|_| {
                    RasterSourceError::out_of_bounds(
                        format!("band {}", band_index),
                        format!("{} bands", metadata.band_count),
                    )
                })?;
            let buffer = band
                .read_as::<f64>(origin, size, size, None)
                .map_err(|e| RasterSourceError::transport(path, e))?;
            tiles.push(
                Tile::new(buffer.data, size.0, size.1, metadata.cell_type)
                    .with_no_data(metadata.no_data),
            );
        }

        debug!(path, cols = size.0, rows = size.1, bands = bands.len(), "Native window read");
        Ok(tiles)
    }
}

#[cfg(not(feature = "gdal"))]
mod driver {
    use raster_common::{GridBounds, Tile};

    use crate::error::{RasterSourceError, Result};
    use crate::metadata::RasterMetadata;

    fn unavailable(path: &str) -> RasterSourceError {
        RasterSourceError::unsupported_format(format!(
            "native driver not compiled in, cannot open {}",
            path
        ))
    }

    pub fn read_metadata(path: &str) -> Result<RasterMetadata> {
        Err(unavailable(path))
    }

    pub fn read_bands(
        path: &str,
        _metadata: &RasterMetadata,
        _bounds: &GridBounds,
        _bands: &[usize],
    ) -> Result<Vec<Tile>> {
        Err(unavailable(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_paths() {
        let cases = [
            ("gdal:///data/a.tif", "/data/a.tif"),
            ("gdal+https://h/a.tif", "/vsicurl/https://h/a.tif"),
            ("gdal+s3://bucket/k/a.tif", "/vsis3/bucket/k/a.tif"),
            ("gdal+hdfs://nn:8020/a.tif", "/vsihdfs/hdfs://nn:8020/a.tif"),
            (
                "gdal+webhdfs://nn:9870/d/a.tif",
                "/vsiwebhdfs/http://nn:9870/webhdfs/v1/d/a.tif",
            ),
            ("/plain/a.tif", "/plain/a.tif"),
        ];
        for (locator, expected) in cases {
            let source = NativeSource::new(Locator::new(locator));
            assert_eq!(source.driver_path(), expected, "{}", locator);
        }
    }

    #[cfg(not(feature = "gdal"))]
    #[test]
    fn test_native_driver_unavailable_without_feature() {
        assert!(!native_driver_available());
        let source = NativeSource::new(Locator::new("gdal:///data/a.tif"));
        assert!(source.metadata().is_err());
    }
}
