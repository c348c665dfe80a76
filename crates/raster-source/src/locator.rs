//! Locator strings (paths and URIs) naming a raster.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Scheme prefix selecting the native driver.
pub const NATIVE_SCHEME: &str = "gdal";

/// A path or URI naming a raster, e.g. `/data/a.tif`, `https://h/a.tif`,
/// `s3://bucket/key.tif` or `gdal+https://h/a.tif`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator {
    raw: String,
}

impl Locator {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lowercased scheme, or `None` for plain paths.
    pub fn scheme(&self) -> Option<String> {
        let (scheme, _) = self.raw.split_once("://")?;
        let valid = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        valid.then(|| scheme.to_ascii_lowercase())
    }

    /// True for `gdal://` and `gdal+<scheme>://` locators.
    pub fn is_native(&self) -> bool {
        match self.scheme() {
            Some(scheme) => {
                scheme == NATIVE_SCHEME || scheme.starts_with(&format!("{}+", NATIVE_SCHEME))
            }
            None => false,
        }
    }

    /// Strip the native driver prefix.
    ///
    /// `gdal+https://h/x.tif` becomes `https://h/x.tif` and
    /// `gdal:///data/x.tif` becomes `/data/x.tif`. Other locators are
    /// returned unchanged.
    pub fn unwrap_native(&self) -> Locator {
        let Some(scheme) = self.scheme().filter(|_| self.is_native()) else {
            return self.clone();
        };
        let rest = &self.raw[scheme.len() + 3..];
        match scheme.split_once('+') {
            Some((_, inner)) => Locator::new(format!("{}://{}", inner, rest)),
            None => Locator::new(rest),
        }
    }

    /// Filesystem path for plain paths and `file://` URIs.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self.scheme().as_deref() {
            None => Some(PathBuf::from(&self.raw)),
            Some("file") => Url::parse(&self.raw)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .or_else(|| Some(PathBuf::from(&self.raw["file://".len()..]))),
            Some(_) => None,
        }
    }

    /// Parsed URL for locators that have a scheme.
    pub fn url(&self) -> Option<Url> {
        self.scheme()?;
        Url::parse(&self.raw).ok()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for Locator {
    fn from(raw: &str) -> Self {
        Locator::new(raw)
    }
}

impl From<String> for Locator {
    fn from(raw: String) -> Self {
        Locator::new(raw)
    }
}
