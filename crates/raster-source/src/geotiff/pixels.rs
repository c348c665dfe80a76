//! Windowed pixel reads.

use raster_common::{GridBounds, Tile};
use tracing::debug;

use super::decode::{decompress, samples_to_f64, undo_predictor};
use super::info::GeoTiffInfo;
use crate::error::{RasterSourceError, Result};
use crate::reader::RangeReader;

/// Read `bands` of the pixels inside `bounds`.
///
/// Only the segments overlapping `bounds` are fetched. Returns one tile
/// per requested band, in request order.
pub fn read_window(
    reader: &dyn RangeReader,
    info: &GeoTiffInfo,
    bounds: &GridBounds,
    bands: &[usize],
) -> Result<Vec<Tile>> {
    let meta = &info.metadata;
    let layout = &info.segments;

    if let Some(&band) = bands.iter().find(|&&b| b >= meta.band_count) {
        return Err(RasterSourceError::out_of_bounds(
            format!("band {}", band),
            format!("{} bands", meta.band_count),
        ));
    }

    let bounds = bounds
        .intersection(&GridBounds::full(meta.cols, meta.rows))
        .ok_or_else(|| {
            RasterSourceError::out_of_bounds(
                format!("{:?}", bounds),
                format!("{}x{} grid", meta.cols, meta.rows),
            )
        })?;

    let out_cols = bounds.width();
    let fill = meta.no_data.unwrap_or(0.0);
    let mut outputs: Vec<Vec<f64>> = bands.iter().map(|_| vec![fill; bounds.size()]).collect();

    let seg_col_range = bounds.col_min / layout.segment_cols..=(bounds.col_max - 1) / layout.segment_cols;
    let seg_row_range = bounds.row_min / layout.segment_rows..=(bounds.row_max - 1) / layout.segment_rows;
    let spp = layout.samples_per_segment();

    let mut fetched = 0usize;
    for seg_row in seg_row_range {
        let stored_rows = layout.stored_rows(seg_row, meta.rows);
        for seg_col in seg_col_range.clone() {
            let seg_bounds = GridBounds::new(
                seg_col * layout.segment_cols,
                seg_row * layout.segment_rows,
                seg_col * layout.segment_cols + layout.segment_cols,
                seg_row * layout.segment_rows + stored_rows,
            );
            let Some(overlap) = seg_bounds.intersection(&bounds) else {
                continue;
            };

            // Chunky segments hold every band: decode once.
            let planes: Vec<(usize, Vec<usize>)> = if layout.planar_separate {
                bands.iter().enumerate().map(|(i, &b)| (b, vec![i])).collect()
            } else {
                vec![(0, (0..bands.len()).collect())]
            };

            for (plane_band, outputs_for_plane) in planes {
                let index = layout.index(seg_col, seg_row, plane_band);
                let Some(samples) = decode_segment(reader, info, index, stored_rows)? else {
                    continue;
                };
                fetched += 1;

                for row in overlap.row_min..overlap.row_max {
                    let seg_r = row - seg_bounds.row_min;
                    let out_r = row - bounds.row_min;
                    for col in overlap.col_min..overlap.col_max {
                        let seg_c = col - seg_bounds.col_min;
                        let base = (seg_r * layout.segment_cols + seg_c) * spp;
                        let out_idx = out_r * out_cols + (col - bounds.col_min);
                        for &o in &outputs_for_plane {
                            let sample = if layout.planar_separate { 0 } else { bands[o] };
                            outputs[o][out_idx] = samples[base + sample];
                        }
                    }
                }
            }
        }
    }

    debug!(
        source = reader.identifier(),
        col_min = bounds.col_min,
        row_min = bounds.row_min,
        cols = bounds.width(),
        rows = bounds.height(),
        bands = bands.len(),
        segments = fetched,
        "Read window"
    );

    Ok(outputs
        .into_iter()
        .map(|values| {
            Tile::new(values, bounds.width(), bounds.height(), meta.cell_type).with_no_data(meta.no_data)
        })
        .collect())
}

/// Fetch and decode one segment. `None` for sparse (unwritten) segments.
fn decode_segment(
    reader: &dyn RangeReader,
    info: &GeoTiffInfo,
    index: usize,
    stored_rows: usize,
) -> Result<Option<Vec<f64>>> {
    let layout = &info.segments;
    let cell_type = info.metadata.cell_type;

    let offset = layout.offsets[index];
    let count = layout.byte_counts[index];
    if offset == 0 || count == 0 {
        return Ok(None);
    }

    let spp = layout.samples_per_segment();
    let expected = layout.segment_cols * stored_rows * spp * cell_type.bytes();

    let raw = reader.read_range(offset, count)?;
    let mut bytes = decompress(layout.compression, &raw, expected)?;
    bytes.truncate(expected);
    undo_predictor(
        layout.predictor,
        &mut bytes,
        layout.segment_cols,
        spp,
        cell_type,
        layout.byte_order,
    )?;

    Ok(Some(samples_to_f64(&bytes, cell_type, layout.byte_order)))
}
