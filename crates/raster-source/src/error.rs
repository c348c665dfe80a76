//! Error types for raster sources.

use thiserror::Error;

/// Errors that can occur while resolving, describing or reading a raster
/// source.
#[derive(Error, Debug)]
pub enum RasterSourceError {
    /// The locator's scheme is not handled by any backend.
    #[error("unsupported scheme '{scheme}' in locator {locator}")]
    UnsupportedScheme { scheme: String, locator: String },

    /// A range read or stat failed in the underlying transport.
    #[error("transport error reading {source_id}: {message}")]
    Transport { source_id: String, message: String },

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The header bytes do not form a valid raster header.
    #[error("failed to parse raster header: {0}")]
    FormatParse(String),

    /// The header is valid but uses a feature this reader does not decode.
    #[error("unsupported raster format: {0}")]
    UnsupportedFormat(String),

    /// The requested region does not overlap the raster.
    #[error("requested region {requested} is outside raster extent {extent}")]
    OutOfBounds { requested: String, extent: String },

    /// Configuration or locator detail is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RasterSourceError {
    /// Create a Transport error.
    pub fn transport(source_id: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Transport {
            source_id: source_id.into(),
            message: message.to_string(),
        }
    }

    /// Create a FormatParse error.
    pub fn format_parse(msg: impl Into<String>) -> Self {
        Self::FormatParse(msg.into())
    }

    /// Create an UnsupportedFormat error.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(requested: impl ToString, extent: impl ToString) -> Self {
        Self::OutOfBounds {
            requested: requested.to_string(),
            extent: extent.to_string(),
        }
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for failures that happened while talking to the backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Io(_))
    }
}

/// Result type for raster source operations.
pub type Result<T> = std::result::Result<T, RasterSourceError>;
