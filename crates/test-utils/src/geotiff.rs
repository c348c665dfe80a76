//! A small GeoTIFF encoder for building test fixtures.
//!
//! Covers the storage variants the reader has to handle: tiled and striped
//! segments, both byte orders, classic TIFF and BigTIFF, chunky and planar
//! band interleaving, DEFLATE/LZW/PackBits compression and the horizontal
//! and floating point predictors.
//!
//! The IFD is written directly after the file header with its out-of-line
//! values next to it, so the whole header sits at the front of the file the
//! way cloud-optimized GeoTIFFs are laid out.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use flate2::write::ZlibEncoder;
use raster_common::{CellType, Extent};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// How pixel data is split into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentShape {
    Tiled { tile_cols: usize, tile_rows: usize },
    Striped { rows_per_strip: usize },
}

/// Segment compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureCompression {
    None,
    Deflate,
    Lzw,
    PackBits,
}

impl FixtureCompression {
    fn code(self) -> u16 {
        match self {
            FixtureCompression::None => 1,
            FixtureCompression::Lzw => 5,
            FixtureCompression::Deflate => 8,
            FixtureCompression::PackBits => 32773,
        }
    }
}

/// Builder for an in-memory GeoTIFF file.
///
/// Band values are given as `f64` and stored as the configured cell type.
#[derive(Debug, Clone)]
pub struct GeoTiffBuilder {
    cols: usize,
    rows: usize,
    cell_type: CellType,
    bands: Vec<Vec<f64>>,
    shape: SegmentShape,
    big_endian: bool,
    big_tiff: bool,
    compression: FixtureCompression,
    predictor: u16,
    planar_separate: bool,
    extent: Option<Extent>,
    epsg: Option<u16>,
    pixel_is_point: bool,
    no_data: Option<String>,
    gdal_metadata: Option<String>,
    ascii_tags: BTreeMap<u16, String>,
    sparse: Vec<usize>,
}

impl GeoTiffBuilder {
    /// A single-band, uncompressed, untiled little-endian raster.
    pub fn new(cols: usize, rows: usize, cell_type: CellType, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), cols * rows, "band size mismatch");
        Self {
            cols,
            rows,
            cell_type,
            bands: vec![values],
            shape: SegmentShape::Striped { rows_per_strip: rows },
            big_endian: false,
            big_tiff: false,
            compression: FixtureCompression::None,
            predictor: 1,
            planar_separate: false,
            extent: None,
            epsg: None,
            pixel_is_point: false,
            no_data: None,
            gdal_metadata: None,
            ascii_tags: BTreeMap::new(),
            sparse: Vec::new(),
        }
    }

    pub fn band(mut self, values: Vec<f64>) -> Self {
        assert_eq!(values.len(), self.cols * self.rows, "band size mismatch");
        self.bands.push(values);
        self
    }

    pub fn tiled(mut self, tile_cols: usize, tile_rows: usize) -> Self {
        self.shape = SegmentShape::Tiled { tile_cols, tile_rows };
        self
    }

    pub fn striped(mut self, rows_per_strip: usize) -> Self {
        self.shape = SegmentShape::Striped { rows_per_strip };
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn big_tiff(mut self) -> Self {
        self.big_tiff = true;
        self
    }

    pub fn compression(mut self, compression: FixtureCompression) -> Self {
        self.compression = compression;
        self
    }

    /// TIFF predictor code: 2 horizontal, 3 floating point.
    pub fn predictor(mut self, predictor: u16) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn planar_separate(mut self) -> Self {
        self.planar_separate = true;
        self
    }

    /// Georeference with ModelPixelScale and ModelTiepoint.
    pub fn extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    /// EPSG code written to the GeoKey directory. Codes 4000..5000 are
    /// written as geographic, everything else as projected.
    pub fn epsg(mut self, code: u16) -> Self {
        self.epsg = Some(code);
        self
    }

    pub fn pixel_is_point(mut self) -> Self {
        self.pixel_is_point = true;
        self
    }

    pub fn no_data(mut self, value: &str) -> Self {
        self.no_data = Some(value.to_string());
        self
    }

    /// Raw GDAL_METADATA XML.
    pub fn gdal_metadata(mut self, xml: &str) -> Self {
        self.gdal_metadata = Some(xml.to_string());
        self
    }

    /// TIFFTAG_DATETIME, formatted "YYYY:MM:DD HH:MM:SS".
    pub fn datetime(self, value: &str) -> Self {
        self.ascii_tag(306, value)
    }

    pub fn ascii_tag(mut self, tag: u16, value: &str) -> Self {
        self.ascii_tags.insert(tag, value.to_string());
        self
    }

    /// Leave segment `index` unwritten (offset and byte count 0).
    pub fn sparse_segment(mut self, index: usize) -> Self {
        self.sparse.push(index);
        self
    }

    fn segment_dims(&self) -> (usize, usize) {
        match self.shape {
            SegmentShape::Tiled { tile_cols, tile_rows } => (tile_cols, tile_rows),
            SegmentShape::Striped { rows_per_strip } => (self.cols, rows_per_strip.clamp(1, self.rows)),
        }
    }

    /// Encode the file.
    pub fn build(&self) -> Vec<u8> {
        let band_count = self.bands.len();
        let spp = if self.planar_separate { 1 } else { band_count };
        let planes = if self.planar_separate { band_count } else { 1 };
        let (seg_cols, seg_rows) = self.segment_dims();
        let across = (self.cols + seg_cols - 1) / seg_cols;
        let down = (self.rows + seg_rows - 1) / seg_rows;
        let tiled = matches!(self.shape, SegmentShape::Tiled { .. });

        let mut segments = Vec::with_capacity(planes * across * down);
        for plane in 0..planes {
            for seg_row in 0..down {
                for seg_col in 0..across {
                    let index = segments.len();
                    if self.sparse.contains(&index) {
                        segments.push(None);
                        continue;
                    }
                    let stored_rows = if tiled {
                        seg_rows
                    } else {
                        seg_rows.min(self.rows - seg_row * seg_rows)
                    };
                    let raw = self.encode_segment(plane, spp, seg_col * seg_cols, seg_row * seg_rows, seg_cols, stored_rows);
                    segments.push(Some(compress(self.compression, &raw)));
                }
            }
        }

        let mut tags = TagSet::default();
        tags.insert(256, TagValue::Long(vec![self.cols as u32]));
        tags.insert(257, TagValue::Long(vec![self.rows as u32]));
        tags.insert(258, TagValue::Short(vec![self.cell_type.bits(); band_count]));
        tags.insert(259, TagValue::Short(vec![self.compression.code()]));
        tags.insert(262, TagValue::Short(vec![1]));
        tags.insert(277, TagValue::Short(vec![band_count as u16]));
        tags.insert(284, TagValue::Short(vec![if self.planar_separate { 2 } else { 1 }]));
        tags.insert(339, TagValue::Short(vec![self.cell_type.tiff_sample_format(); band_count]));
        if self.predictor != 1 {
            tags.insert(317, TagValue::Short(vec![self.predictor]));
        }

        let (offsets_tag, counts_tag) = if tiled {
            tags.insert(322, TagValue::Long(vec![seg_cols as u32]));
            tags.insert(323, TagValue::Long(vec![seg_rows as u32]));
            (324, 325)
        } else {
            tags.insert(278, TagValue::Long(vec![seg_rows as u32]));
            (273, 279)
        };
        let counts: Vec<u64> = segments
            .iter()
            .map(|s| s.as_ref().map_or(0, |d| d.len() as u64))
            .collect();
        // Placeholder offsets; patched once the data position is known.
        tags.insert(offsets_tag, self.offset_value(vec![0; segments.len()]));
        tags.insert(counts_tag, self.offset_value(counts));

        if let Some(extent) = self.extent {
            let sx = extent.width() / self.cols as f64;
            let sy = extent.height() / self.rows as f64;
            let (mut x, mut y) = (extent.min_x, extent.max_y);
            if self.pixel_is_point {
                x += sx / 2.0;
                y -= sy / 2.0;
            }
            tags.insert(33550, TagValue::Double(vec![sx, sy, 0.0]));
            tags.insert(33922, TagValue::Double(vec![0.0, 0.0, 0.0, x, y, 0.0]));
        }
        if self.epsg.is_some() || self.pixel_is_point {
            tags.insert(34735, TagValue::Short(self.geokey_directory()));
        }
        for (tag, value) in &self.ascii_tags {
            tags.insert(*tag, TagValue::Ascii(value.clone()));
        }
        if let Some(xml) = &self.gdal_metadata {
            tags.insert(42112, TagValue::Ascii(xml.clone()));
        }
        if let Some(no_data) = &self.no_data {
            tags.insert(42113, TagValue::Ascii(no_data.clone()));
        }

        let writer = IfdWriter {
            big_endian: self.big_endian,
            big_tiff: self.big_tiff,
        };
        let data_start = writer.header_len() + writer.ifd_len(&tags);
        let mut offsets = Vec::with_capacity(segments.len());
        let mut position = data_start as u64;
        for segment in &segments {
            match segment {
                Some(data) => {
                    offsets.push(position);
                    position += data.len() as u64;
                }
                None => offsets.push(0),
            }
        }
        tags.insert(offsets_tag, self.offset_value(offsets));

        let mut out = writer.write(&tags);
        assert_eq!(out.len(), data_start);
        for data in segments.iter().flatten() {
            out.extend_from_slice(data);
        }
        out
    }

    /// Encode and write to a fresh temporary `.tif` file.
    pub fn write_temp(&self) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".tif")
            .tempfile()
            .expect("create temp file");
        file.write_all(&self.build()).expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }

    /// Encode and write to `path`.
    pub fn write_to(&self, path: &Path) {
        std::fs::write(path, self.build()).expect("write fixture");
    }

    fn offset_value(&self, values: Vec<u64>) -> TagValue {
        if self.big_tiff {
            TagValue::Long8(values)
        } else {
            TagValue::Long(values.into_iter().map(|v| v as u32).collect())
        }
    }

    fn geokey_directory(&self) -> Vec<u16> {
        let mut keys: Vec<[u16; 4]> = Vec::new();
        let geographic = self.epsg.map_or(false, |c| (4000..5000).contains(&c));
        if self.epsg.is_some() {
            keys.push([1024, 0, 1, if geographic { 2 } else { 1 }]);
        }
        keys.push([1025, 0, 1, if self.pixel_is_point { 2 } else { 1 }]);
        if let Some(code) = self.epsg {
            keys.push([if geographic { 2048 } else { 3072 }, 0, 1, code]);
        }

        let mut dir = vec![1, 1, 0, keys.len() as u16];
        for key in keys {
            dir.extend_from_slice(&key);
        }
        dir
    }

    /// Raw bytes of one segment, predictor applied, in file byte order.
    /// Tiles are padded with zeros past the raster edge.
    fn encode_segment(
        &self,
        plane: usize,
        spp: usize,
        col0: usize,
        row0: usize,
        seg_cols: usize,
        seg_rows: usize,
    ) -> Vec<u8> {
        let bytes = self.cell_type.bytes();
        let row_len = seg_cols * spp * bytes;
        let mut out = Vec::with_capacity(row_len * seg_rows);

        for r in 0..seg_rows {
            let mut samples = Vec::with_capacity(seg_cols * spp);
            for c in 0..seg_cols {
                let (col, row) = (col0 + c, row0 + r);
                for s in 0..spp {
                    let band = if self.planar_separate { plane } else { s };
                    let value = if col < self.cols && row < self.rows {
                        self.bands[band][row * self.cols + col]
                    } else {
                        0.0
                    };
                    samples.push(value);
                }
            }

            let mut row_bytes = match self.predictor {
                3 => float_predictor_row(&samples, spp, self.cell_type),
                _ => {
                    let mut buf = vec![0u8; row_len];
                    for (i, v) in samples.iter().enumerate() {
                        write_sample(&mut buf[i * bytes..(i + 1) * bytes], *v, self.cell_type, self.big_endian);
                    }
                    buf
                }
            };
            if self.predictor == 2 {
                horizontal_difference(&mut row_bytes, spp, bytes, self.big_endian);
            }
            out.extend_from_slice(&row_bytes);
        }
        out
    }
}

fn write_sample(buf: &mut [u8], value: f64, cell_type: CellType, big_endian: bool) {
    macro_rules! put {
        ($write:ident, $v:expr) => {
            if big_endian {
                BigEndian::$write(buf, $v)
            } else {
                LittleEndian::$write(buf, $v)
            }
        };
    }
    match cell_type {
        CellType::UInt8 => buf[0] = value as u8,
        CellType::Int8 => buf[0] = value as i8 as u8,
        CellType::UInt16 => put!(write_u16, value as u16),
        CellType::Int16 => put!(write_i16, value as i16),
        CellType::UInt32 => put!(write_u32, value as u32),
        CellType::Int32 => put!(write_i32, value as i32),
        CellType::Float32 => put!(write_f32, value as f32),
        CellType::Float64 => put!(write_f64, value),
    }
}

/// Predictor 2: each sample minus the same sample of the previous pixel.
fn horizontal_difference(row: &mut [u8], spp: usize, bytes: usize, big_endian: bool) {
    let count = row.len() / bytes;
    let read = |buf: &[u8]| -> u64 {
        match (bytes, big_endian) {
            (1, _) => buf[0] as u64,
            (2, true) => BigEndian::read_u16(buf) as u64,
            (2, false) => LittleEndian::read_u16(buf) as u64,
            (4, true) => BigEndian::read_u32(buf) as u64,
            (4, false) => LittleEndian::read_u32(buf) as u64,
            (_, true) => BigEndian::read_u64(buf),
            (_, false) => LittleEndian::read_u64(buf),
        }
    };
    let original: Vec<u64> = (0..count).map(|i| read(&row[i * bytes..])).collect();
    for i in spp..count {
        let diff = original[i].wrapping_sub(original[i - spp]);
        let dest = &mut row[i * bytes..(i + 1) * bytes];
        match (bytes, big_endian) {
            (1, _) => dest[0] = diff as u8,
            (2, true) => BigEndian::write_u16(dest, diff as u16),
            (2, false) => LittleEndian::write_u16(dest, diff as u16),
            (4, true) => BigEndian::write_u32(dest, diff as u32),
            (4, false) => LittleEndian::write_u32(dest, diff as u32),
            (_, true) => BigEndian::write_u64(dest, diff),
            (_, false) => LittleEndian::write_u64(dest, diff),
        }
    }
}

/// Predictor 3: split samples into big-endian byte planes, then difference
/// bytes. Independent of the file byte order.
fn float_predictor_row(samples: &[f64], spp: usize, cell_type: CellType) -> Vec<u8> {
    let bytes = cell_type.bytes();
    let count = samples.len();
    let mut planes = vec![0u8; count * bytes];
    for (k, v) in samples.iter().enumerate() {
        let be: Vec<u8> = match cell_type {
            CellType::Float32 => (*v as f32).to_be_bytes().to_vec(),
            _ => v.to_be_bytes().to_vec(),
        };
        for (b, byte) in be.iter().enumerate() {
            planes[b * count + k] = *byte;
        }
    }
    for i in (spp..planes.len()).rev() {
        planes[i] = planes[i].wrapping_sub(planes[i - spp]);
    }
    planes
}

fn compress(compression: FixtureCompression, raw: &[u8]) -> Vec<u8> {
    match compression {
        FixtureCompression::None => raw.to_vec(),
        FixtureCompression::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(raw).expect("deflate");
            encoder.finish().expect("deflate")
        }
        FixtureCompression::Lzw => weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(raw)
            .expect("lzw"),
        FixtureCompression::PackBits => pack_bits(raw),
    }
}

/// PackBits with literal runs only (valid, if not compact).
fn pack_bits(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len() + raw.len() / 128 + 1);
    for chunk in raw.chunks(128) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
    out
}

#[derive(Debug, Clone)]
enum TagValue {
    Short(Vec<u16>),
    Long(Vec<u32>),
    Long8(Vec<u64>),
    Double(Vec<f64>),
    Ascii(String),
}

impl TagValue {
    fn type_code(&self) -> u16 {
        match self {
            TagValue::Ascii(_) => 2,
            TagValue::Short(_) => 3,
            TagValue::Long(_) => 4,
            TagValue::Double(_) => 12,
            TagValue::Long8(_) => 16,
        }
    }

    fn count(&self) -> usize {
        match self {
            TagValue::Short(v) => v.len(),
            TagValue::Long(v) => v.len(),
            TagValue::Long8(v) => v.len(),
            TagValue::Double(v) => v.len(),
            TagValue::Ascii(s) => s.len() + 1,
        }
    }

    fn encode(&self, big_endian: bool) -> Vec<u8> {
        let mut out = Vec::new();
        macro_rules! put_all {
            ($values:expr, $size:expr, $write:ident) => {
                for v in $values {
                    let mut buf = [0u8; $size];
                    if big_endian {
                        BigEndian::$write(&mut buf, *v);
                    } else {
                        LittleEndian::$write(&mut buf, *v);
                    }
                    out.extend_from_slice(&buf);
                }
            };
        }
        match self {
            TagValue::Short(v) => put_all!(v, 2, write_u16),
            TagValue::Long(v) => put_all!(v, 4, write_u32),
            TagValue::Long8(v) => put_all!(v, 8, write_u64),
            TagValue::Double(v) => put_all!(v, 8, write_f64),
            TagValue::Ascii(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
        }
        out
    }
}

type TagSet = BTreeMap<u16, TagValue>;

struct IfdWriter {
    big_endian: bool,
    big_tiff: bool,
}

impl IfdWriter {
    fn header_len(&self) -> usize {
        if self.big_tiff {
            16
        } else {
            8
        }
    }

    fn inline_len(&self) -> usize {
        if self.big_tiff {
            8
        } else {
            4
        }
    }

    fn entry_len(&self) -> usize {
        if self.big_tiff {
            20
        } else {
            12
        }
    }

    fn table_len(&self, tags: &TagSet) -> usize {
        let (count, pointer) = if self.big_tiff { (8, 8) } else { (2, 4) };
        count + tags.len() * self.entry_len() + pointer
    }

    /// IFD table plus its out-of-line values (each word aligned).
    fn ifd_len(&self, tags: &TagSet) -> usize {
        let mut len = self.table_len(tags);
        for value in tags.values() {
            let size = value.encode(self.big_endian).len();
            if size > self.inline_len() {
                len += size + size % 2;
            }
        }
        len
    }

    fn put_u16(&self, out: &mut Vec<u8>, v: u16) {
        let mut buf = [0u8; 2];
        if self.big_endian {
            BigEndian::write_u16(&mut buf, v);
        } else {
            LittleEndian::write_u16(&mut buf, v);
        }
        out.extend_from_slice(&buf);
    }

    fn put_u32(&self, out: &mut Vec<u8>, v: u32) {
        let mut buf = [0u8; 4];
        if self.big_endian {
            BigEndian::write_u32(&mut buf, v);
        } else {
            LittleEndian::write_u32(&mut buf, v);
        }
        out.extend_from_slice(&buf);
    }

    fn put_u64(&self, out: &mut Vec<u8>, v: u64) {
        let mut buf = [0u8; 8];
        if self.big_endian {
            BigEndian::write_u64(&mut buf, v);
        } else {
            LittleEndian::write_u64(&mut buf, v);
        }
        out.extend_from_slice(&buf);
    }

    fn put_offset(&self, out: &mut Vec<u8>, v: u64) {
        if self.big_tiff {
            self.put_u64(out, v);
        } else {
            self.put_u32(out, v as u32);
        }
    }

    /// File header followed by the IFD at the first byte after it.
    fn write(&self, tags: &TagSet) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(if self.big_endian { b"MM" } else { b"II" });
        if self.big_tiff {
            self.put_u16(&mut out, 43);
            self.put_u16(&mut out, 8);
            self.put_u16(&mut out, 0);
            self.put_u64(&mut out, 16);
        } else {
            self.put_u16(&mut out, 42);
            self.put_u32(&mut out, 8);
        }

        let ifd_start = out.len();
        let mut extra = Vec::new();
        let mut extra_offset = (ifd_start + self.table_len(tags)) as u64;

        if self.big_tiff {
            self.put_u64(&mut out, tags.len() as u64);
        } else {
            self.put_u16(&mut out, tags.len() as u16);
        }
        for (tag, value) in tags {
            self.put_u16(&mut out, *tag);
            self.put_u16(&mut out, value.type_code());
            self.put_offset(&mut out, value.count() as u64);

            let mut data = value.encode(self.big_endian);
            if data.len() <= self.inline_len() {
                data.resize(self.inline_len(), 0);
                out.extend_from_slice(&data);
            } else {
                self.put_offset(&mut out, extra_offset);
                if data.len() % 2 == 1 {
                    data.push(0);
                }
                extra_offset += data.len() as u64;
                extra.extend_from_slice(&data);
            }
        }
        self.put_offset(&mut out, 0);
        out.extend_from_slice(&extra);
        out
    }
}
