//! TIFF header and image file directory parsing.
//!
//! Handles classic TIFF and BigTIFF in either byte order. Entry values are
//! resolved eagerly through the [`StreamingByteReader`], which fetches
//! out-of-line values only when they fall outside the bytes already held.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use std::collections::BTreeMap;

use super::header::StreamingByteReader;
use crate::error::{RasterSourceError, Result};

/// Well-known TIFF and GeoTIFF tag IDs.
pub mod tags {
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const IMAGE_DESCRIPTION: u16 = 270;
    pub const MAKE: u16 = 271;
    pub const MODEL: u16 = 272;
    pub const STRIP_OFFSETS: u16 = 273;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const ROWS_PER_STRIP: u16 = 278;
    pub const STRIP_BYTE_COUNTS: u16 = 279;
    pub const PLANAR_CONFIG: u16 = 284;
    pub const SOFTWARE: u16 = 305;
    pub const DATE_TIME: u16 = 306;
    pub const ARTIST: u16 = 315;
    pub const HOST_COMPUTER: u16 = 316;
    pub const PREDICTOR: u16 = 317;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const SAMPLE_FORMAT: u16 = 339;
    pub const COPYRIGHT: u16 = 33432;
    pub const MODEL_PIXEL_SCALE: u16 = 33550;
    pub const MODEL_TIEPOINT: u16 = 33922;
    pub const MODEL_TRANSFORMATION: u16 = 34264;
    pub const GEO_KEY_DIRECTORY: u16 = 34735;
    pub const GEO_DOUBLE_PARAMS: u16 = 34736;
    pub const GEO_ASCII_PARAMS: u16 = 34737;
    pub const GDAL_METADATA: u16 = 42112;
    pub const GDAL_NODATA: u16 = 42113;
}

/// Byte order of a TIFF file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiffByteOrder {
    LittleEndian,
    BigEndian,
}

impl TiffByteOrder {
    pub fn read_u16(self, buf: &[u8]) -> u16 {
        match self {
            TiffByteOrder::LittleEndian => LittleEndian::read_u16(buf),
            TiffByteOrder::BigEndian => BigEndian::read_u16(buf),
        }
    }

    pub fn read_u32(self, buf: &[u8]) -> u32 {
        match self {
            TiffByteOrder::LittleEndian => LittleEndian::read_u32(buf),
            TiffByteOrder::BigEndian => BigEndian::read_u32(buf),
        }
    }

    pub fn read_u64(self, buf: &[u8]) -> u64 {
        match self {
            TiffByteOrder::LittleEndian => LittleEndian::read_u64(buf),
            TiffByteOrder::BigEndian => BigEndian::read_u64(buf),
        }
    }

    pub fn write_u16(self, buf: &mut [u8], n: u16) {
        match self {
            TiffByteOrder::LittleEndian => LittleEndian::write_u16(buf, n),
            TiffByteOrder::BigEndian => BigEndian::write_u16(buf, n),
        }
    }

    pub fn write_u32(self, buf: &mut [u8], n: u32) {
        match self {
            TiffByteOrder::LittleEndian => LittleEndian::write_u32(buf, n),
            TiffByteOrder::BigEndian => BigEndian::write_u32(buf, n),
        }
    }

    pub fn write_u64(self, buf: &mut [u8], n: u64) {
        match self {
            TiffByteOrder::LittleEndian => LittleEndian::write_u64(buf, n),
            TiffByteOrder::BigEndian => BigEndian::write_u64(buf, n),
        }
    }
}

/// TIFF field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Rational,
    SByte,
    Undefined,
    SShort,
    SLong,
    SRational,
    Float,
    Double,
    Long8,
    SLong8,
    Ifd8,
}

impl FieldType {
    fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            5 => FieldType::Rational,
            6 => FieldType::SByte,
            7 => FieldType::Undefined,
            8 => FieldType::SShort,
            9 => FieldType::SLong,
            10 => FieldType::SRational,
            11 => FieldType::Float,
            12 => FieldType::Double,
            16 => FieldType::Long8,
            17 => FieldType::SLong8,
            18 => FieldType::Ifd8,
            _ => return None,
        })
    }

    /// Size of one value in bytes.
    pub fn size(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::SByte | FieldType::Undefined => 1,
            FieldType::Short | FieldType::SShort => 2,
            FieldType::Long | FieldType::SLong | FieldType::Float => 4,
            FieldType::Rational
            | FieldType::SRational
            | FieldType::Double
            | FieldType::Long8
            | FieldType::SLong8
            | FieldType::Ifd8 => 8,
        }
    }
}

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: TiffByteOrder,
    pub big_tiff: bool,
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse the 8-byte (classic) or 16-byte (BigTIFF) header.
    pub fn read(src: &mut StreamingByteReader<'_>) -> Result<Self> {
        let head = src.read_bytes(0, 8)?;

        let byte_order = match (head[0], head[1]) {
            (b'I', b'I') => TiffByteOrder::LittleEndian,
            (b'M', b'M') => TiffByteOrder::BigEndian,
            _ => return Err(RasterSourceError::format_parse("invalid byte order marker")),
        };

        match byte_order.read_u16(&head[2..4]) {
            42 => Ok(Self {
                byte_order,
                big_tiff: false,
                first_ifd_offset: byte_order.read_u32(&head[4..8]) as u64,
            }),
            43 => {
                let offset_size = byte_order.read_u16(&head[4..6]);
                if offset_size != 8 {
                    return Err(RasterSourceError::format_parse(format!(
                        "unsupported BigTIFF offset size {}",
                        offset_size
                    )));
                }
                let rest = src.read_bytes(8, 8)?;
                Ok(Self {
                    byte_order,
                    big_tiff: true,
                    first_ifd_offset: byte_order.read_u64(&rest),
                })
            }
            magic => Err(RasterSourceError::format_parse(format!(
                "expected TIFF magic 42 or 43, got {}",
                magic
            ))),
        }
    }
}

/// One directory entry with its value bytes resolved.
#[derive(Debug, Clone)]
pub struct IfdEntry {
    pub field_type: FieldType,
    pub count: u64,
    /// Raw value bytes in file byte order.
    pub data: Vec<u8>,
}

/// An image file directory.
#[derive(Debug, Clone)]
pub struct Ifd {
    pub byte_order: TiffByteOrder,
    pub entries: BTreeMap<u16, IfdEntry>,
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// Read the directory at `offset`, resolving every entry's value.
    pub fn read(src: &mut StreamingByteReader<'_>, header: &TiffHeader, offset: u64) -> Result<Self> {
        let order = header.byte_order;
        let (count_size, entry_size, pointer_size) = if header.big_tiff {
            (8usize, 20usize, 8usize)
        } else {
            (2, 12, 4)
        };

        let count_bytes = src.read_bytes(offset, count_size)?;
        let entry_count = if header.big_tiff {
            order.read_u64(&count_bytes)
        } else {
            order.read_u16(&count_bytes) as u64
        };

        if entry_count == 0 || entry_count > 4096 {
            return Err(RasterSourceError::format_parse(format!(
                "implausible IFD entry count {} at offset {}",
                entry_count, offset
            )));
        }

        let table_len = entry_count as usize * entry_size + pointer_size;
        let table = src.read_bytes(offset + count_size as u64, table_len)?;

        let mut entries = BTreeMap::new();
        for i in 0..entry_count as usize {
            let raw = &table[i * entry_size..(i + 1) * entry_size];
            let tag = order.read_u16(&raw[0..2]);
            let type_code = order.read_u16(&raw[2..4]);

            // Unknown field types are skipped; readers must ignore them.
            let Some(field_type) = FieldType::from_code(type_code) else {
                continue;
            };

            let (count, value_field) = if header.big_tiff {
                (order.read_u64(&raw[4..12]), &raw[12..20])
            } else {
                (order.read_u32(&raw[4..8]) as u64, &raw[8..12])
            };

            let len = (count as usize)
                .checked_mul(field_type.size())
                .ok_or_else(|| RasterSourceError::format_parse(format!("tag {} is too large", tag)))?;

            let data = if len <= value_field.len() {
                value_field[..len].to_vec()
            } else {
                let value_offset = if header.big_tiff {
                    order.read_u64(value_field)
                } else {
                    order.read_u32(value_field) as u64
                };
                src.read_bytes(value_offset, len)?
            };

            entries.insert(
                tag,
                IfdEntry {
                    field_type,
                    count,
                    data,
                },
            );
        }

        let pointer = &table[table_len - pointer_size..];
        let next_ifd_offset = if header.big_tiff {
            order.read_u64(pointer)
        } else {
            order.read_u32(pointer) as u64
        };

        Ok(Self {
            byte_order: order,
            entries,
            next_ifd_offset,
        })
    }

    pub fn contains(&self, tag: u16) -> bool {
        self.entries.contains_key(&tag)
    }

    /// All values of an integer tag, widened to u64.
    pub fn get_u64_vec(&self, tag: u16) -> Option<Vec<u64>> {
        let entry = self.entries.get(&tag)?;
        let order = self.byte_order;
        let size = entry.field_type.size();
        let values = entry.data.chunks_exact(size);

        let out = match entry.field_type {
            FieldType::Byte | FieldType::Undefined => entry.data.iter().map(|&b| b as u64).collect(),
            FieldType::Short => values.map(|c| order.read_u16(c) as u64).collect(),
            FieldType::Long => values.map(|c| order.read_u32(c) as u64).collect(),
            FieldType::Long8 | FieldType::Ifd8 => values.map(|c| order.read_u64(c)).collect(),
            _ => return None,
        };
        Some(out)
    }

    /// First value of an integer tag.
    pub fn get_u64(&self, tag: u16) -> Option<u64> {
        self.get_u64_vec(tag)?.first().copied()
    }

    pub fn get_u16(&self, tag: u16) -> Option<u16> {
        self.get_u64(tag).and_then(|v| u16::try_from(v).ok())
    }

    /// All values of a numeric tag as f64.
    pub fn get_f64_vec(&self, tag: u16) -> Option<Vec<f64>> {
        let entry = self.entries.get(&tag)?;
        let order = self.byte_order;
        let size = entry.field_type.size();
        let values = entry.data.chunks_exact(size);

        let out = match entry.field_type {
            FieldType::Double => values
                .map(|c| f64::from_bits(order.read_u64(c)))
                .collect(),
            FieldType::Float => values
                .map(|c| f32::from_bits(order.read_u32(c)) as f64)
                .collect(),
            FieldType::Rational => values
                .map(|c| order.read_u32(&c[0..4]) as f64 / order.read_u32(&c[4..8]) as f64)
                .collect(),
            FieldType::SShort => values.map(|c| order.read_u16(c) as i16 as f64).collect(),
            FieldType::SLong => values.map(|c| order.read_u32(c) as i32 as f64).collect(),
            _ => self.get_u64_vec(tag)?.into_iter().map(|v| v as f64).collect(),
        };
        Some(out)
    }

    /// An ASCII tag, with the trailing NUL (and anything after it) removed.
    pub fn get_ascii(&self, tag: u16) -> Option<String> {
        let entry = self.entries.get(&tag)?;
        if entry.field_type != FieldType::Ascii {
            return None;
        }
        let end = entry.data.iter().position(|&b| b == 0).unwrap_or(entry.data.len());
        Some(String::from_utf8_lossy(&entry.data[..end]).into_owned())
    }
}
