//! GeoTIFF metadata extraction.

use chrono::{DateTime, NaiveDateTime, Utc};
use raster_common::{CellType, Crs, Extent, TileLayout};
use tracing::{debug, info};

use super::decode::{Compression, Predictor};
use super::gdal_metadata::merge_gdal_metadata;
use super::header::StreamingByteReader;
use super::ifd::{tags, Ifd, TiffByteOrder, TiffHeader};
use crate::error::{RasterSourceError, Result};
use crate::metadata::{RasterMetadata, Tags};
use crate::reader::RangeReader;

/// GeoKey IDs used for georeferencing.
mod geokeys {
    pub const GT_RASTER_TYPE: u16 = 1025;
    pub const GEOGRAPHIC_TYPE: u16 = 2048;
    pub const PROJECTED_CS_TYPE: u16 = 3072;

    pub const RASTER_PIXEL_IS_POINT: u16 = 2;
    pub const USER_DEFINED: u16 = 32767;
}

/// ASCII baseline tags exposed under their GDAL metadata names.
const ASCII_TAGS: &[(u16, &str)] = &[
    (tags::IMAGE_DESCRIPTION, "TIFFTAG_IMAGEDESCRIPTION"),
    (tags::MAKE, "TIFFTAG_MAKE"),
    (tags::MODEL, "TIFFTAG_MODEL"),
    (tags::SOFTWARE, "TIFFTAG_SOFTWARE"),
    (tags::DATE_TIME, "TIFFTAG_DATETIME"),
    (tags::ARTIST, "TIFFTAG_ARTIST"),
    (tags::HOST_COMPUTER, "TIFFTAG_HOSTCOMPUTER"),
    (tags::COPYRIGHT, "TIFFTAG_COPYRIGHT"),
];

/// Format of `TIFFTAG_DATETIME`.
pub const TIFF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Where the compressed pixel segments (tiles or strips) live and how to
/// decode them.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentLayout {
    pub tiled: bool,
    /// Pixel width of one segment.
    pub segment_cols: usize,
    /// Pixel height of one segment (rows per strip for striped files).
    pub segment_rows: usize,
    /// Segments per segment row.
    pub across: usize,
    /// Segment rows.
    pub down: usize,
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub compression: Compression,
    pub predictor: Predictor,
    /// Each band stored in its own set of segments.
    pub planar_separate: bool,
    pub samples_per_pixel: usize,
    pub byte_order: TiffByteOrder,
}

impl SegmentLayout {
    /// Index into `offsets` of the segment at (across, down) holding `band`.
    pub fn index(&self, seg_col: usize, seg_row: usize, band: usize) -> usize {
        let plane = if self.planar_separate { band } else { 0 };
        plane * self.across * self.down + seg_row * self.across + seg_col
    }

    /// Rows of pixel data actually stored in segment row `seg_row`.
    ///
    /// Tiles are always padded to full size; the last strip is not.
    pub fn stored_rows(&self, seg_row: usize, raster_rows: usize) -> usize {
        if self.tiled {
            self.segment_rows
        } else {
            self.segment_rows
                .min(raster_rows.saturating_sub(seg_row * self.segment_rows))
        }
    }

    /// Samples interleaved in each decoded segment.
    pub fn samples_per_segment(&self) -> usize {
        if self.planar_separate {
            1
        } else {
            self.samples_per_pixel
        }
    }
}

/// Parsed header of one GeoTIFF: public metadata plus decoding layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoTiffInfo {
    pub metadata: RasterMetadata,
    pub segments: SegmentLayout,
}

impl GeoTiffInfo {
    /// Parse the header through `reader`, fetching `chunk_size` bytes at a
    /// time.
    pub fn parse(reader: &dyn RangeReader, chunk_size: usize) -> Result<Self> {
        let mut src = StreamingByteReader::new(reader, chunk_size)?;
        let header = TiffHeader::read(&mut src)?;
        let ifd = Ifd::read(&mut src, &header, header.first_ifd_offset)?;

        let cols = required(&ifd, tags::IMAGE_WIDTH, "ImageWidth")? as usize;
        let rows = required(&ifd, tags::IMAGE_LENGTH, "ImageLength")? as usize;
        if cols == 0 || rows == 0 {
            return Err(RasterSourceError::format_parse("raster has zero width or height"));
        }

        let band_count = ifd.get_u64(tags::SAMPLES_PER_PIXEL).unwrap_or(1).max(1) as usize;
        let cell_type = cell_type(&ifd)?;

        let tiled = ifd.contains(tags::TILE_WIDTH);
        let tile_layout = if tiled {
            let tw = required(&ifd, tags::TILE_WIDTH, "TileWidth")? as usize;
            let th = required(&ifd, tags::TILE_LENGTH, "TileLength")? as usize;
            Some(TileLayout::for_dimensions(cols, rows, tw, th))
        } else {
            None
        };

        let segments = segment_layout(&ifd, header.byte_order, cols, rows, band_count, tile_layout)?;

        let geokeys = GeoKeys::read(&ifd);
        let extent = extent(&ifd, &geokeys, cols, rows)?;
        let crs = geokeys.crs();

        let mut raster_tags = Tags::default();
        raster_tags.bands.resize_with(band_count, Default::default);
        for (tag, name) in ASCII_TAGS {
            if let Some(value) = ifd.get_ascii(*tag) {
                raster_tags.head.insert((*name).to_string(), value);
            }
        }
        if let Some(xml) = ifd.get_ascii(tags::GDAL_METADATA) {
            merge_gdal_metadata(&xml, band_count, &mut raster_tags)?;
        }

        let no_data = ifd
            .get_ascii(tags::GDAL_NODATA)
            .and_then(|v| v.trim().parse::<f64>().ok());

        let timestamp = match raster_tags.get("TIFFTAG_DATETIME").and_then(parse_tiff_datetime) {
            Some(ts) => Some(ts),
            None => reader.last_modified()?,
        };

        info!(
            source = reader.identifier(),
            cols,
            rows,
            bands = band_count,
            cell_type = %cell_type,
            crs = %crs,
            tiled,
            header_reads = src.fetch_count(),
            "Parsed GeoTIFF header"
        );

        Ok(Self {
            metadata: RasterMetadata {
                crs,
                extent,
                cols,
                rows,
                cell_type,
                band_count,
                tags: raster_tags,
                timestamp,
                tile_layout,
                no_data,
            },
            segments,
        })
    }
}

fn required(ifd: &Ifd, tag: u16, name: &str) -> Result<u64> {
    ifd.get_u64(tag)
        .ok_or_else(|| RasterSourceError::format_parse(format!("missing required tag {} ({})", name, tag)))
}

fn cell_type(ifd: &Ifd) -> Result<CellType> {
    let bits = ifd
        .get_u64_vec(tags::BITS_PER_SAMPLE)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![1]);
    let formats = ifd
        .get_u64_vec(tags::SAMPLE_FORMAT)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![1]);

    if bits.windows(2).any(|w| w[0] != w[1]) || formats.windows(2).any(|w| w[0] != w[1]) {
        return Err(RasterSourceError::unsupported_format(
            "bands with differing sample types",
        ));
    }

    let (bits, format) = (bits[0] as u16, formats[0] as u16);
    CellType::from_tiff(bits, format).ok_or_else(|| {
        RasterSourceError::unsupported_format(format!(
            "{}-bit samples with sample format {}",
            bits, format
        ))
    })
}

fn segment_layout(
    ifd: &Ifd,
    byte_order: TiffByteOrder,
    cols: usize,
    rows: usize,
    samples_per_pixel: usize,
    tile_layout: Option<TileLayout>,
) -> Result<SegmentLayout> {
    let (tiled, segment_cols, segment_rows, offsets_tag, counts_tag) = match tile_layout {
        Some(layout) => (
            true,
            layout.tile_cols,
            layout.tile_rows,
            tags::TILE_OFFSETS,
            tags::TILE_BYTE_COUNTS,
        ),
        None => {
            let rows_per_strip = ifd
                .get_u64(tags::ROWS_PER_STRIP)
                .unwrap_or(rows as u64)
                .clamp(1, rows as u64) as usize;
            (
                false,
                cols,
                rows_per_strip,
                tags::STRIP_OFFSETS,
                tags::STRIP_BYTE_COUNTS,
            )
        }
    };

    let offsets = ifd
        .get_u64_vec(offsets_tag)
        .ok_or_else(|| RasterSourceError::format_parse("missing segment offsets"))?;
    let byte_counts = ifd
        .get_u64_vec(counts_tag)
        .ok_or_else(|| RasterSourceError::format_parse("missing segment byte counts"))?;

    let planar_separate = match ifd.get_u16(tags::PLANAR_CONFIG).unwrap_or(1) {
        1 => false,
        2 => true,
        other => {
            return Err(RasterSourceError::format_parse(format!(
                "invalid planar configuration {}",
                other
            )))
        }
    };

    let layout = SegmentLayout {
        tiled,
        segment_cols,
        segment_rows,
        across: (cols + segment_cols - 1) / segment_cols,
        down: (rows + segment_rows - 1) / segment_rows,
        offsets,
        byte_counts,
        compression: Compression::from_code(ifd.get_u16(tags::COMPRESSION).unwrap_or(1))?,
        predictor: Predictor::from_code(ifd.get_u16(tags::PREDICTOR).unwrap_or(1))?,
        planar_separate,
        samples_per_pixel,
        byte_order,
    };

    let planes = if planar_separate { samples_per_pixel } else { 1 };
    let expected = layout.across * layout.down * planes;
    if layout.offsets.len() < expected || layout.byte_counts.len() < expected {
        return Err(RasterSourceError::format_parse(format!(
            "expected {} segments, found {} offsets and {} byte counts",
            expected,
            layout.offsets.len(),
            layout.byte_counts.len()
        )));
    }

    debug!(
        tiled,
        segment_cols,
        segment_rows,
        segments = expected,
        compression = ?layout.compression,
        predictor = ?layout.predictor,
        planar_separate,
        "Resolved segment layout"
    );
    Ok(layout)
}

/// Decoded GeoKeyDirectory entries that carry inline SHORT values.
struct GeoKeys {
    keys: Vec<(u16, u16)>,
}

impl GeoKeys {
    fn read(ifd: &Ifd) -> Self {
        let dir = ifd.get_u64_vec(tags::GEO_KEY_DIRECTORY).unwrap_or_default();
        let mut keys = Vec::new();
        if dir.len() >= 4 {
            let count = dir[3] as usize;
            for entry in dir[4..].chunks_exact(4).take(count) {
                // location 0: value stored inline in the offset field
                if entry[1] == 0 {
                    keys.push((entry[0] as u16, entry[3] as u16));
                }
            }
        }
        Self { keys }
    }

    fn get(&self, id: u16) -> Option<u16> {
        self.keys.iter().find(|(k, _)| *k == id).map(|(_, v)| *v)
    }

    fn crs(&self) -> Crs {
        [geokeys::PROJECTED_CS_TYPE, geokeys::GEOGRAPHIC_TYPE]
            .iter()
            .filter_map(|id| self.get(*id))
            .find(|code| *code != 0 && *code != geokeys::USER_DEFINED)
            .map(|code| Crs::Epsg(code as u32))
            .unwrap_or(Crs::Unknown)
    }

    fn pixel_is_point(&self) -> bool {
        self.get(geokeys::GT_RASTER_TYPE) == Some(geokeys::RASTER_PIXEL_IS_POINT)
    }
}

fn extent(ifd: &Ifd, geokeys: &GeoKeys, cols: usize, rows: usize) -> Result<Extent> {
    let (w, h) = (cols as f64, rows as f64);

    if let (Some(scale), Some(tie)) = (
        ifd.get_f64_vec(tags::MODEL_PIXEL_SCALE),
        ifd.get_f64_vec(tags::MODEL_TIEPOINT),
    ) {
        if scale.len() < 2 || tie.len() < 6 {
            return Err(RasterSourceError::format_parse("truncated georeferencing tags"));
        }
        let (sx, sy) = (scale[0], scale[1]);
        let mut min_x = tie[3] - tie[0] * sx;
        let mut max_y = tie[4] + tie[1] * sy;
        if geokeys.pixel_is_point() {
            min_x -= sx / 2.0;
            max_y += sy / 2.0;
        }
        return Ok(Extent::new(min_x, max_y - h * sy, min_x + w * sx, max_y));
    }

    if let Some(m) = ifd.get_f64_vec(tags::MODEL_TRANSFORMATION) {
        if m.len() < 16 {
            return Err(RasterSourceError::format_parse("truncated ModelTransformation"));
        }
        let corners = [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)].map(|(i, j)| {
            (m[0] * i + m[1] * j + m[3], m[4] * i + m[5] * j + m[7])
        });
        let xs = corners.map(|c| c.0);
        let ys = corners.map(|c| c.1);
        return Ok(Extent::new(
            xs.iter().cloned().fold(f64::INFINITY, f64::min),
            ys.iter().cloned().fold(f64::INFINITY, f64::min),
            xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ));
    }

    // Not georeferenced: pixel space, y up.
    Ok(Extent::new(0.0, 0.0, w, h))
}

/// Parse a `TIFFTAG_DATETIME` value ("YYYY:MM:DD HH:MM:SS"), as UTC.
pub fn parse_tiff_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), TIFF_DATETIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}
