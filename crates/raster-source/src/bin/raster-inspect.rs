//! Raster inspector
//!
//! Resolves a locator, prints its metadata and read windows, and optionally
//! reads every window while counting the range requests it takes.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use raster_source::{CallbackRegistry, RasterSource, ReadCounter};

#[derive(Parser, Debug)]
#[command(name = "raster-inspect")]
#[command(about = "Print metadata and read windows of a raster dataset")]
struct Args {
    /// Raster locator (path, file://, http(s)://, hdfs://, webhdfs://, s3://, gdal+...)
    locator: String,

    /// List every read window
    #[arg(long)]
    windows: bool,

    /// Read every window and report the number of range requests issued
    #[arg(long)]
    count_reads: bool,

    /// Print metadata as JSON
    #[arg(long)]
    json: bool,

    /// Log level
    #[arg(long, default_value = "warn", env = "RUST_LOG")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let counter = Arc::new(ReadCounter::new());
    let resolved = if args.count_reads {
        let handle = CallbackRegistry::register("raster-inspect", counter.clone());
        RasterSource::with_callback(args.locator.as_str(), handle)
    } else {
        RasterSource::new(args.locator.as_str())
    };
    let source = resolved.with_context(|| format!("Failed to resolve {}", args.locator))?;

    info!(source = %source, "Resolved raster source");

    let metadata = source
        .metadata()
        .with_context(|| format!("Failed to read metadata of {}", source))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(metadata)?);
    } else {
        println!("Source:     {}", source);
        println!("Size:       {} x {}", metadata.cols, metadata.rows);
        println!("Bands:      {}", metadata.band_count);
        println!("Cell type:  {}", metadata.cell_type.name());
        println!("CRS:        {}", metadata.crs);
        println!("Extent:     {}", metadata.extent);
        if let Some(no_data) = metadata.no_data {
            println!("NoData:     {}", no_data);
        }
        if let Some(timestamp) = metadata.timestamp {
            println!("Timestamp:  {}", timestamp.to_rfc3339());
        }
        match metadata.tile_layout {
            Some(layout) => println!(
                "Tiling:     {} x {} tiles of {} x {}",
                layout.layout_cols, layout.layout_rows, layout.tile_cols, layout.tile_rows
            ),
            None => println!("Tiling:     none"),
        }
        for (key, value) in &metadata.tags.head {
            println!("Tag:        {}={}", key, value);
        }
    }

    let windows = source.windows()?;
    println!("Windows:    {}", windows.len());
    if args.windows {
        for window in windows.clone() {
            println!("  {:?} {}", window.bounds, window.extent);
        }
    }

    if args.count_reads {
        let header_reads = counter.reads();
        let mut cells = 0;
        for raster in source.read_all()? {
            cells += raster?.size();
        }
        println!("Header reads: {}", header_reads);
        println!("Total reads:  {} ({} bytes)", counter.reads(), counter.bytes());
        println!("Cells read:   {}", cells);
        CallbackRegistry::unregister("raster-inspect");
    }

    Ok(())
}
