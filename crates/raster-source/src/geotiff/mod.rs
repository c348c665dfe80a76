//! GeoTIFF header parsing and pixel decoding over range reads.

pub mod decode;
pub mod gdal_metadata;
pub mod header;
pub mod ifd;
pub mod info;
pub mod pixels;

pub use self::decode::{Compression, Predictor};
pub use self::header::StreamingByteReader;
pub use self::info::{parse_tiff_datetime, GeoTiffInfo, SegmentLayout};
pub use self::pixels::read_window;
