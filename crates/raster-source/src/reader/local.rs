//! Local filesystem reader.

use bytes::Bytes;
use once_cell::sync::OnceCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use super::RangeReader;
use crate::error::Result;

/// Reads byte ranges with seek + read on a freshly opened file.
pub struct LocalRangeReader {
    path: PathBuf,
    identifier: String,
    length: OnceCell<u64>,
}

impl LocalRangeReader {
    pub fn new(path: PathBuf) -> Self {
        let identifier = path.display().to_string();
        Self {
            path,
            identifier,
            length: OnceCell::new(),
        }
    }
}

impl RangeReader for LocalRangeReader {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn total_length(&self) -> Result<u64> {
        self.length
            .get_or_try_init(|| -> Result<u64> { Ok(std::fs::metadata(&self.path)?.len()) })
            .copied()
    }

    fn read_range(&self, start: u64, length: u64) -> Result<Bytes> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start))?;
        let mut buffer = vec![0u8; length as usize];
        file.read_exact(&mut buffer)?;
        Ok(Bytes::from(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_local_range_reader() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Hello, World!").unwrap();

        let reader = LocalRangeReader::new(file.path().to_path_buf());
        assert_eq!(reader.total_length().unwrap(), 13);
        assert_eq!(&reader.read_range(0, 5).unwrap()[..], b"Hello");
        assert_eq!(&reader.read_range(7, 5).unwrap()[..], b"World");
        assert_eq!(&reader.read_clipped_range(7, 100).unwrap()[..], b"World!");
        assert!(reader.last_modified().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let reader = LocalRangeReader::new(PathBuf::from("/nonexistent/raster.tif"));
        let err = reader.total_length().unwrap_err();
        assert!(err.is_transport());
    }
}
