//! Common helpers for raster-source integration tests.
//!
//! Provides helpers for:
//! - Writing GeoTIFF fixtures to disk
//! - Counting range reads through a named callback
//! - Serving fixture bytes over HTTP from a background thread
//! - Comparing decoded rasters

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use raster_source::{
    CallbackHandle, CallbackRegistry, GridBounds, ProjectedRaster, RasterSource, ReadCounter, Tile,
};
use tempfile::TempDir;
use test_utils::GeoTiffBuilder;

/// A fixture written into its own temporary directory.
pub struct Fixture {
    pub dir: TempDir,
    pub path: std::path::PathBuf,
}

impl Fixture {
    pub fn write(builder: &GeoTiffBuilder) -> Self {
        Self::write_named(builder, "fixture.tif")
    }

    pub fn write_named(builder: &GeoTiffBuilder, name: &str) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(name);
        builder.write_to(&path);
        Self { dir, path }
    }

    /// Plain path locator.
    pub fn locator(&self) -> String {
        self.path.display().to_string()
    }

    pub fn source(&self) -> RasterSource {
        RasterSource::new(self.locator()).expect("resolve fixture")
    }
}

/// Register a fresh [`ReadCounter`] under `name`.
pub fn counting_callback(name: &str) -> (Arc<ReadCounter>, CallbackHandle) {
    let counter = Arc::new(ReadCounter::new());
    let handle = CallbackRegistry::register(name, counter.clone());
    (counter, handle)
}

/// Start `router` on an ephemeral localhost port in a background thread.
///
/// The server lives until the test process exits.
pub fn spawn_server(router: Router) -> SocketAddr {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("server runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind test server");
            tx.send(listener.local_addr().expect("local addr"))
                .expect("report address");
            axum::serve(listener, router).await.expect("serve");
        });
    });
    rx.recv().expect("server address")
}

/// Serve every file in `dir` with range support.
pub fn serve_dir(dir: &Path) -> SocketAddr {
    let router = Router::new().nest_service("/data", tower_http::services::ServeDir::new(dir));
    spawn_server(router)
}

/// The single band of a raster.
pub fn single(raster: &ProjectedRaster) -> &Tile {
    raster.data.as_single().expect("single band raster")
}

/// Sum of every cell of every band.
pub fn pixel_sum(raster: &ProjectedRaster) -> f64 {
    (0..raster.data.band_count())
        .filter_map(|b| raster.data.band(b))
        .flat_map(|t| t.values.iter())
        .sum()
}

/// Check every cell of `tile`, read at `bounds`, against `expected(col, row)`.
pub fn assert_tile_matches(tile: &Tile, bounds: &GridBounds, expected: impl Fn(usize, usize) -> f64) {
    assert_eq!(tile.dimensions(), (bounds.width(), bounds.height()));
    for row in 0..tile.rows {
        for col in 0..tile.cols {
            let want = expected(bounds.col_min + col, bounds.row_min + row);
            let got = tile.get(col, row).expect("cell inside tile");
            assert_eq!(
                got,
                want,
                "cell ({}, {})",
                bounds.col_min + col,
                bounds.row_min + row
            );
        }
    }
}
