//! Segment decoding: decompression, predictors and sample conversion.

use raster_common::CellType;
use std::io::Read;

use super::ifd::TiffByteOrder;
use crate::error::{RasterSourceError, Result};

/// TIFF compression schemes this reader decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
    Deflate,
    PackBits,
}

impl Compression {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            1 => Ok(Compression::None),
            5 => Ok(Compression::Lzw),
            8 | 32946 => Ok(Compression::Deflate),
            32773 => Ok(Compression::PackBits),
            other => Err(RasterSourceError::unsupported_format(format!(
                "compression scheme {}",
                other
            ))),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            Compression::None => 1,
            Compression::Lzw => 5,
            Compression::Deflate => 8,
            Compression::PackBits => 32773,
        }
    }
}

/// TIFF differencing predictors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    None,
    /// Horizontal differencing of integer samples.
    Horizontal,
    /// Byte-plane shuffle plus differencing of floating point samples.
    FloatingPoint,
}

impl Predictor {
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            1 => Ok(Predictor::None),
            2 => Ok(Predictor::Horizontal),
            3 => Ok(Predictor::FloatingPoint),
            other => Err(RasterSourceError::unsupported_format(format!(
                "predictor {}",
                other
            ))),
        }
    }
}

/// Decompress one segment.
pub fn decompress(compression: Compression, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let out = match compression {
        Compression::None => data.to_vec(),
        Compression::Lzw => {
            let mut decoder =
                weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
            decoder
                .decode(data)
                .map_err(|e| RasterSourceError::format_parse(format!("LZW: {}", e)))?
        }
        Compression::Deflate => {
            // TIFF deflate segments are zlib streams; tolerate raw deflate.
            let mut out = Vec::with_capacity(expected_len);
            if flate2::read::ZlibDecoder::new(data).read_to_end(&mut out).is_err() {
                out.clear();
                flate2::read::DeflateDecoder::new(data)
                    .read_to_end(&mut out)
                    .map_err(|e| RasterSourceError::format_parse(format!("DEFLATE: {}", e)))?;
            }
            out
        }
        Compression::PackBits => unpack_bits(data, expected_len),
    };

    if out.len() < expected_len {
        return Err(RasterSourceError::format_parse(format!(
            "segment decoded to {} bytes, expected {}",
            out.len(),
            expected_len
        )));
    }
    Ok(out)
}

fn unpack_bits(data: &[u8], expected_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(expected_len);
    let mut i = 0;
    while i < data.len() && out.len() < expected_len {
        let n = data[i] as i8;
        i += 1;
        if n >= 0 {
            let end = (i + n as usize + 1).min(data.len());
            out.extend_from_slice(&data[i..end]);
            i = end;
        } else if n != -128 {
            if let Some(&b) = data.get(i) {
                out.extend(std::iter::repeat(b).take(1 + (-(n as i16)) as usize));
            }
            i += 1;
        }
    }
    out
}

/// Undo the predictor in place.
///
/// `buf` holds `rows` rows of `width` pixels with `samples` interleaved
/// samples each.
pub fn undo_predictor(
    predictor: Predictor,
    buf: &mut [u8],
    width: usize,
    samples: usize,
    cell_type: CellType,
    order: TiffByteOrder,
) -> Result<()> {
    let bytes = cell_type.bytes();
    let row_len = width * samples * bytes;
    if row_len == 0 {
        return Ok(());
    }

    match predictor {
        Predictor::None => Ok(()),
        Predictor::Horizontal => {
            if cell_type.is_floating_point() {
                return Err(RasterSourceError::unsupported_format(
                    "horizontal predictor on floating point samples",
                ));
            }
            for row in buf.chunks_exact_mut(row_len) {
                accumulate_row(row, samples, bytes, order);
            }
            Ok(())
        }
        Predictor::FloatingPoint => {
            if !cell_type.is_floating_point() {
                return Err(RasterSourceError::unsupported_format(
                    "floating point predictor on integer samples",
                ));
            }
            let mut scratch = vec![0u8; row_len];
            for row in buf.chunks_exact_mut(row_len) {
                unshuffle_float_row(row, &mut scratch, samples, bytes, order);
            }
            Ok(())
        }
    }
}

fn accumulate_row(row: &mut [u8], samples: usize, bytes: usize, order: TiffByteOrder) {
    let count = row.len() / bytes;
    match bytes {
        1 => {
            for i in samples..count {
                row[i] = row[i].wrapping_add(row[i - samples]);
            }
        }
        2 => {
            for i in samples..count {
                let prev = order.read_u16(&row[(i - samples) * 2..]);
                let cur = order.read_u16(&row[i * 2..]);
                order.write_u16(&mut row[i * 2..i * 2 + 2], cur.wrapping_add(prev));
            }
        }
        4 => {
            for i in samples..count {
                let prev = order.read_u32(&row[(i - samples) * 4..]);
                let cur = order.read_u32(&row[i * 4..]);
                order.write_u32(&mut row[i * 4..i * 4 + 4], cur.wrapping_add(prev));
            }
        }
        _ => {
            for i in samples..count {
                let prev = order.read_u64(&row[(i - samples) * 8..]);
                let cur = order.read_u64(&row[i * 8..]);
                order.write_u64(&mut row[i * 8..i * 8 + 8], cur.wrapping_add(prev));
            }
        }
    }
}

/// Byte-wise differencing, then regroup byte planes (most significant
/// first) into samples written in file byte order.
fn unshuffle_float_row(
    row: &mut [u8],
    scratch: &mut [u8],
    samples: usize,
    bytes: usize,
    order: TiffByteOrder,
) {
    for i in samples..row.len() {
        row[i] = row[i].wrapping_add(row[i - samples]);
    }
    scratch.copy_from_slice(row);

    let count = row.len() / bytes;
    for k in 0..count {
        for b in 0..bytes {
            let plane = scratch[b * count + k];
            let dest = match order {
                TiffByteOrder::BigEndian => b,
                TiffByteOrder::LittleEndian => bytes - 1 - b,
            };
            row[k * bytes + dest] = plane;
        }
    }
}

/// Convert raw samples in file byte order to f64.
pub fn samples_to_f64(buf: &[u8], cell_type: CellType, order: TiffByteOrder) -> Vec<f64> {
    let chunks = buf.chunks_exact(cell_type.bytes());
    match cell_type {
        CellType::UInt8 => buf.iter().map(|&b| b as f64).collect(),
        CellType::Int8 => buf.iter().map(|&b| b as i8 as f64).collect(),
        CellType::UInt16 => chunks.map(|c| order.read_u16(c) as f64).collect(),
        CellType::Int16 => chunks.map(|c| order.read_u16(c) as i16 as f64).collect(),
        CellType::UInt32 => chunks.map(|c| order.read_u32(c) as f64).collect(),
        CellType::Int32 => chunks.map(|c| order.read_u32(c) as i32 as f64).collect(),
        CellType::Float32 => chunks
            .map(|c| f32::from_bits(order.read_u32(c)) as f64)
            .collect(),
        CellType::Float64 => chunks.map(|c| f64::from_bits(order.read_u64(c))).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unsupported_compression() {
        let err = Compression::from_code(7).unwrap_err();
        assert!(matches!(err, RasterSourceError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_packbits() {
        // PackBits sample from TIFF 6.0 section 9.
        let packed = [
            0xFE, 0xAA, 0x02, 0x80, 0x00, 0x2A, 0xFD, 0xAA, 0x03, 0x80, 0x00, 0x2A, 0x22, 0xF7,
            0xAA,
        ];
        let expected = [
            0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0xAA, 0xAA, 0xAA, 0xAA, 0x80, 0x00, 0x2A, 0x22,
            0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA, 0xAA,
        ];
        assert_eq!(decompress(Compression::PackBits, &packed, 24).unwrap(), expected);
    }

    #[test]
    fn test_deflate_zlib_stream() {
        let raw: Vec<u8> = (0..=255).collect();
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&raw).unwrap();
        let packed = encoder.finish().unwrap();
        assert_eq!(decompress(Compression::Deflate, &packed, 256).unwrap(), raw);
    }

    #[test]
    fn test_lzw_round_trip() {
        let raw: Vec<u8> = (0..1000u32).map(|i| (i % 7) as u8).collect();
        let packed = weezl::encode::Encoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8)
            .encode(&raw)
            .unwrap();
        assert_eq!(decompress(Compression::Lzw, &packed, raw.len()).unwrap(), raw);
    }

    #[test]
    fn test_short_segment_is_parse_error() {
        assert!(decompress(Compression::None, &[1, 2, 3], 4).is_err());
    }

    #[test]
    fn test_horizontal_predictor_u16() {
        // Row of 3 pixels, 1 sample: 100, +5, -3 (wrapping)
        let order = TiffByteOrder::BigEndian;
        let mut buf = vec![0u8; 6];
        order.write_u16(&mut buf[0..2], 100);
        order.write_u16(&mut buf[2..4], 5);
        order.write_u16(&mut buf[4..6], 3u16.wrapping_neg());

        undo_predictor(Predictor::Horizontal, &mut buf, 3, 1, CellType::UInt16, order).unwrap();
        assert_eq!(samples_to_f64(&buf, CellType::UInt16, order), vec![100.0, 105.0, 102.0]);
    }

    #[test]
    fn test_floating_point_predictor() {
        let values = [1.5f32, -2.25, 1000.0];
        let count = values.len();

        // Encode: big-endian byte planes, then byte differencing.
        let mut planes = vec![0u8; count * 4];
        for (k, v) in values.iter().enumerate() {
            for (b, byte) in v.to_be_bytes().iter().enumerate() {
                planes[b * count + k] = *byte;
            }
        }
        for i in (1..planes.len()).rev() {
            planes[i] = planes[i].wrapping_sub(planes[i - 1]);
        }

        for order in [TiffByteOrder::LittleEndian, TiffByteOrder::BigEndian] {
            let mut buf = planes.clone();
            undo_predictor(Predictor::FloatingPoint, &mut buf, count, 1, CellType::Float32, order)
                .unwrap();
            assert_eq!(
                samples_to_f64(&buf, CellType::Float32, order),
                vec![1.5, -2.25, 1000.0]
            );
        }
    }

    #[test]
    fn test_signed_samples() {
        let buf = [0xFFu8, 0x80];
        assert_eq!(samples_to_f64(&buf, CellType::Int8, TiffByteOrder::LittleEndian), vec![-1.0, -128.0]);
        assert_eq!(samples_to_f64(&buf, CellType::Int16, TiffByteOrder::LittleEndian), vec![-32513.0]);
    }
}
