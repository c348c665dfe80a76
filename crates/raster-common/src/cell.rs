//! Cell (pixel value) types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The numeric encoding of one pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
}

impl CellType {
    /// Map a TIFF BitsPerSample / SampleFormat pair to a cell type.
    ///
    /// SampleFormat: 1 = unsigned integer, 2 = signed integer, 3 = IEEE float.
    pub fn from_tiff(bits_per_sample: u16, sample_format: u16) -> Option<Self> {
        match (bits_per_sample, sample_format) {
            (8, 1) => Some(CellType::UInt8),
            (8, 2) => Some(CellType::Int8),
            (16, 1) => Some(CellType::UInt16),
            (16, 2) => Some(CellType::Int16),
            (32, 1) => Some(CellType::UInt32),
            (32, 2) => Some(CellType::Int32),
            (32, 3) => Some(CellType::Float32),
            (64, 3) => Some(CellType::Float64),
            _ => None,
        }
    }

    /// Size of one value in bits.
    pub fn bits(&self) -> u16 {
        match self {
            CellType::UInt8 | CellType::Int8 => 8,
            CellType::UInt16 | CellType::Int16 => 16,
            CellType::UInt32 | CellType::Int32 | CellType::Float32 => 32,
            CellType::Float64 => 64,
        }
    }

    /// Size of one value in bytes.
    pub fn bytes(&self) -> usize {
        self.bits() as usize / 8
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, CellType::Float32 | CellType::Float64)
    }

    pub fn is_signed(&self) -> bool {
        !matches!(self, CellType::UInt8 | CellType::UInt16 | CellType::UInt32)
    }

    /// TIFF SampleFormat code for this cell type.
    pub fn tiff_sample_format(&self) -> u16 {
        if self.is_floating_point() {
            3
        } else if self.is_signed() {
            2
        } else {
            1
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CellType::UInt8 => "uint8",
            CellType::Int8 => "int8",
            CellType::UInt16 => "uint16",
            CellType::Int16 => "int16",
            CellType::UInt32 => "uint32",
            CellType::Int32 => "int32",
            CellType::Float32 => "float32",
            CellType::Float64 => "float64",
        }
    }
}

impl fmt::Display for CellType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
