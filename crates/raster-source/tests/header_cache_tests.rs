//! Header caching and descriptor serialization, observed through the
//! read callback.

mod common;

use std::sync::Arc;

use common::{counting_callback, Fixture};
use raster_source::{Extent, GridBounds, RasterRef, RasterSource, TileHandle};
use test_utils::fixtures;

#[test]
fn test_header_read_once_per_instance() {
    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let (counter, handle) = counting_callback("header-once");
    let source = RasterSource::with_callback(fixture.locator(), handle).unwrap();

    // Resolution does no I/O.
    assert_eq!(counter.reads(), 0);

    source.metadata().unwrap();
    let after_first = counter.reads();
    assert_eq!(after_first, 1);

    source.crs().unwrap();
    source.extent().unwrap();
    source.tags().unwrap();
    source.dimensions().unwrap();
    source.windows().unwrap();
    assert_eq!(counter.reads(), after_first);
}

#[test]
fn test_window_reads_only_touch_needed_segments() {
    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let (counter, handle) = counting_callback("segment-reads");
    let source = RasterSource::with_callback(fixture.locator(), handle).unwrap();
    source.metadata().unwrap();
    counter.reset();

    let extent = source.extent().unwrap();
    let quadrant = Extent::new(extent.min_x, extent.center().1, extent.center().0, extent.max_y);
    source.read(&quadrant).unwrap();
    assert_eq!(counter.reads(), 1);

    counter.reset();
    source.read(&extent).unwrap();
    assert_eq!(counter.reads(), 4);
}

#[test]
fn test_serialized_source_round_trip() {
    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let (counter, handle) = counting_callback("serde-round-trip");
    let source = RasterSource::with_callback(fixture.locator(), handle).unwrap();
    let original = source.metadata().unwrap().clone();
    let reads_before = counter.reads();

    let json = serde_json::to_string(&source).unwrap();
    let copy: RasterSource = serde_json::from_str(&json).unwrap();
    assert_eq!(copy.to_string(), source.to_string());
    assert_eq!(counter.reads(), reads_before);

    assert_eq!(copy.metadata().unwrap(), &original);
    let after_copy = counter.reads();
    assert!(after_copy - reads_before <= 1);

    copy.metadata().unwrap();
    copy.cell_type().unwrap();
    assert_eq!(counter.reads(), after_copy);
}

#[test]
fn test_serialized_form_is_descriptor_only() {
    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let source = fixture.source();
    source.metadata().unwrap();

    let value = serde_json::to_value(&source).unwrap();
    assert_eq!(value["kind"], "GeoTiff");
    assert_eq!(value["backend"]["type"], "local");
    assert!(value.get("info").is_none());
    assert!(value.get("reader").is_none());
}

#[test]
fn test_raster_ref_serialization_reads_on_demand() {
    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let (counter, handle) = counting_callback("ref-round-trip");
    let source = Arc::new(RasterSource::with_callback(fixture.locator(), handle).unwrap());

    let handles = source.read_all_lazy().unwrap();
    let TileHandle::Lazy(raster_ref) = &handles[3] else {
        panic!("single-band windows are lazy");
    };
    let expected = raster_ref.tile().unwrap();

    let json = serde_json::to_string(raster_ref).unwrap();
    counter.reset();
    let copy: RasterRef = serde_json::from_str(&json).unwrap();
    assert_eq!(counter.reads(), 0);

    assert_eq!(copy.tile().unwrap(), expected);
    // Header plus one segment.
    assert_eq!(counter.reads(), 2);
}

#[test]
fn test_unregistered_callback_reads_silently() {
    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let source = RasterSource::with_callback(
        fixture.locator(),
        raster_source::CallbackHandle::named("never-registered"),
    )
    .unwrap();
    assert_eq!(source.dimensions().unwrap(), (100, 100));
}

#[test]
fn test_concurrent_first_access_agrees() {
    const THREADS: usize = 8;

    let fixture = Fixture::write(&fixtures::standard_geotiff());
    let (counter, handle) = counting_callback("concurrent-first-access");
    let source = Arc::new(RasterSource::with_callback(fixture.locator(), handle).unwrap());
    let bounds = GridBounds::new(10, 10, 40, 40);

    let results: Vec<_> = std::thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let source = Arc::clone(&source);
                scope.spawn(move || {
                    let metadata = source.metadata().unwrap().clone();
                    let raster = source.read_bounds(&bounds).unwrap();
                    (metadata, raster)
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let (first_metadata, first_raster) = &results[0];
    for (metadata, raster) in &results {
        assert_eq!(metadata, first_metadata);
        assert_eq!(raster, first_raster);
    }
    assert_eq!(first_metadata, source.metadata().unwrap());

    // Racing threads may each parse the header; each window read is one
    // segment since the bounds sit inside the first tile.
    assert!(counter.reads() <= (THREADS + THREADS) as u64, "{}", counter.reads());
    assert!(counter.reads() >= (1 + THREADS) as u64);
}
