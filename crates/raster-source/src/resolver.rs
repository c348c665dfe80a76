//! Locator to source-variant resolution.

use tracing::debug;

use crate::callback::CallbackHandle;
use crate::config::RasterSourceConfig;
use crate::error::{RasterSourceError, Result};
use crate::locator::Locator;
use crate::reader::Backend;
use crate::source::{native_driver_available, GeoTiffSource, NativeSource, RasterSource};

/// Families of locator schemes, each served by one kind of backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeFamily {
    Local,
    Http,
    Hdfs,
    ObjectStore,
    Native,
}

/// Scheme registry. Plain paths (no scheme) are `Local`; `gdal+<scheme>`
/// prefixes are `Native`.
const SCHEME_REGISTRY: &[(&str, SchemeFamily)] = &[
    ("file", SchemeFamily::Local),
    ("http", SchemeFamily::Http),
    ("https", SchemeFamily::Http),
    ("hdfs", SchemeFamily::Hdfs),
    ("webhdfs", SchemeFamily::Hdfs),
    ("s3", SchemeFamily::ObjectStore),
    ("s3a", SchemeFamily::ObjectStore),
    ("s3n", SchemeFamily::ObjectStore),
    ("gdal", SchemeFamily::Native),
];

impl SchemeFamily {
    /// The family handling `locator`, or `None` for unknown schemes.
    pub fn of(locator: &Locator) -> Option<Self> {
        if locator.is_native() {
            return Some(SchemeFamily::Native);
        }
        match locator.scheme() {
            None => Some(SchemeFamily::Local),
            Some(scheme) => SCHEME_REGISTRY
                .iter()
                .find(|(name, _)| *name == scheme)
                .map(|(_, family)| *family),
        }
    }

    /// Every registered scheme name.
    pub fn registered_schemes() -> impl Iterator<Item = &'static str> {
        SCHEME_REGISTRY.iter().map(|(name, _)| *name)
    }
}

/// Picks the source variant for a locator.
///
/// Resolution does no I/O; sources fetch headers on first metadata access.
#[derive(Debug, Clone, Copy)]
pub struct SourceResolver {
    prefer_native: bool,
}

impl SourceResolver {
    pub fn new(prefer_native: bool) -> Self {
        Self { prefer_native }
    }

    /// Resolver following the process configuration.
    pub fn global() -> Self {
        Self::new(RasterSourceConfig::global().prefer_native_driver)
    }

    pub fn resolve(
        &self,
        locator: impl Into<Locator>,
        callback: Option<CallbackHandle>,
    ) -> Result<RasterSource> {
        let locator = locator.into();
        let family = SchemeFamily::of(&locator).ok_or_else(|| RasterSourceError::UnsupportedScheme {
            scheme: locator.scheme().unwrap_or_default(),
            locator: locator.to_string(),
        })?;

        if family == SchemeFamily::Native {
            if native_driver_available() {
                return Ok(RasterSource::Native(NativeSource::new(locator)));
            }
            let inner = locator.unwrap_native();
            debug!(locator = %locator, fallback = %inner, "Native driver unavailable, resolving unwrapped locator");
            return self.resolve(inner, callback);
        }

        if self.prefer_native && native_driver_available() {
            return Ok(RasterSource::Native(NativeSource::new(locator)));
        }

        let backend = backend_for(&locator, family)?;
        debug!(locator = %locator, backend = backend.kind(), "Resolved raster source");
        Ok(RasterSource::GeoTiff(GeoTiffSource::new(locator, backend, callback)))
    }
}

fn backend_for(locator: &Locator, family: SchemeFamily) -> Result<Backend> {
    match family {
        SchemeFamily::Local => locator
            .local_path()
            .map(|path| Backend::Local { path })
            .ok_or_else(|| RasterSourceError::config(format!("not a local path: {}", locator))),
        SchemeFamily::Http => Ok(Backend::Http {
            url: locator.to_string(),
        }),
        SchemeFamily::Hdfs => Ok(Backend::Hdfs {
            url: locator.to_string(),
        }),
        SchemeFamily::ObjectStore => {
            let url = locator
                .url()
                .ok_or_else(|| RasterSourceError::config(format!("invalid object store URI: {}", locator)))?;
            let bucket = url
                .host_str()
                .filter(|b| !b.is_empty())
                .ok_or_else(|| RasterSourceError::config(format!("missing bucket in {}", locator)))?;
            // URL paths are percent-encoded; object keys are not.
            let key = object_store::path::Path::from_url_path(url.path()).map_err(|e| {
                RasterSourceError::config(format!("invalid object key in {}: {}", locator, e))
            })?;
            if key.as_ref().is_empty() {
                return Err(RasterSourceError::config(format!("missing key in {}", locator)));
            }
            Ok(Backend::ObjectStore {
                bucket: bucket.to_string(),
                key: key.into(),
            })
        }
        SchemeFamily::Native => Err(RasterSourceError::config(format!(
            "native locator {} has no byte-range backend",
            locator
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_family() {
        let cases = [
            ("/data/a.tif", Some(SchemeFamily::Local)),
            ("file:///data/a.tif", Some(SchemeFamily::Local)),
            ("http://h/a.tif", Some(SchemeFamily::Http)),
            ("https://h/a.tif", Some(SchemeFamily::Http)),
            ("hdfs://nn:8020/a.tif", Some(SchemeFamily::Hdfs)),
            ("webhdfs://nn:9870/a.tif", Some(SchemeFamily::Hdfs)),
            ("s3://b/a.tif", Some(SchemeFamily::ObjectStore)),
            ("s3a://b/a.tif", Some(SchemeFamily::ObjectStore)),
            ("s3n://b/a.tif", Some(SchemeFamily::ObjectStore)),
            ("gdal://vsimem/a.tif", Some(SchemeFamily::Native)),
            ("gdal+https://h/a.tif", Some(SchemeFamily::Native)),
            ("ftp://h/a.tif", None),
        ];
        for (locator, expected) in cases {
            assert_eq!(SchemeFamily::of(&Locator::new(locator)), expected, "{}", locator);
        }
    }

    #[test]
    fn test_object_store_backend() {
        let backend = backend_for(&Locator::new("s3://bucket/dir/a.tif"), SchemeFamily::ObjectStore).unwrap();
        assert_eq!(
            backend,
            Backend::ObjectStore {
                bucket: "bucket".to_string(),
                key: "dir/a.tif".to_string()
            }
        );

        let err = backend_for(&Locator::new("s3://bucket/"), SchemeFamily::ObjectStore).unwrap_err();
        assert!(matches!(err, RasterSourceError::Config(_)));
    }

    #[test]
    fn test_object_store_key_is_decoded() {
        let backend =
            backend_for(&Locator::new("s3://bucket/dir/my scene%2B1.tif"), SchemeFamily::ObjectStore).unwrap();
        assert_eq!(
            backend,
            Backend::ObjectStore {
                bucket: "bucket".to_string(),
                key: "dir/my scene+1.tif".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_scheme() {
        let err = SourceResolver::new(false).resolve("ftp://h/a.tif", None).unwrap_err();
        match err {
            RasterSourceError::UnsupportedScheme { scheme, .. } => assert_eq!(scheme, "ftp"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
