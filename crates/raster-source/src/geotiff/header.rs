//! Chunked header access over a range reader.

use bytes::Bytes;

use crate::error::{RasterSourceError, Result};
use crate::reader::RangeReader;

/// Serves small header reads from a few large range fetches.
///
/// Each miss fetches at least `chunk_size` bytes starting at the requested
/// offset, so a header that fits in the first chunk costs exactly one range
/// read.
pub struct StreamingByteReader<'a> {
    reader: &'a dyn RangeReader,
    chunk_size: u64,
    total_length: u64,
    chunks: Vec<(u64, Bytes)>,
}

impl<'a> StreamingByteReader<'a> {
    pub fn new(reader: &'a dyn RangeReader, chunk_size: usize) -> Result<Self> {
        Ok(Self {
            reader,
            chunk_size: chunk_size.max(16) as u64,
            total_length: reader.total_length()?,
            chunks: Vec::new(),
        })
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    /// Number of range reads issued so far.
    pub fn fetch_count(&self) -> usize {
        self.chunks.len()
    }

    /// Copy `len` bytes starting at `offset`.
    pub fn read_bytes(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(len as u64)
            .filter(|&end| end <= self.total_length)
            .ok_or_else(|| {
                RasterSourceError::format_parse(format!(
                    "header field at {}+{} runs past end of file ({} bytes)",
                    offset, len, self.total_length
                ))
            })?;

        if let Some(bytes) = self.buffered(offset, end) {
            return Ok(bytes);
        }

        let fetch_len = (len as u64).max(self.chunk_size);
        let chunk = self.reader.read_clipped_range(offset, fetch_len)?;
        if (chunk.len() as u64) < end - offset {
            return Err(RasterSourceError::format_parse(format!(
                "short header read at {}: got {} of {} bytes",
                offset,
                chunk.len(),
                len
            )));
        }

        let out = chunk[..len].to_vec();
        self.chunks.push((offset, chunk));
        Ok(out)
    }

    fn buffered(&self, start: u64, end: u64) -> Option<Vec<u8>> {
        self.chunks.iter().find_map(|(chunk_start, chunk)| {
            let chunk_end = chunk_start + chunk.len() as u64;
            if start >= *chunk_start && end <= chunk_end {
                let from = (start - chunk_start) as usize;
                let to = (end - chunk_start) as usize;
                Some(chunk[from..to].to_vec())
            } else {
                None
            }
        })
    }
}
