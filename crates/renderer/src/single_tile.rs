//! Render one tile straight from a Shapefile, without a polyfile.

use projection::MercatorProjector;
use shapefile_parser::{Selection, ShapefileReader};
use tracing::debug;

use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::error::RenderResult;

const OUTLINE: u8 = 1;

/// Draw every part of every record crossing TMS tile `(tms_x, tms_y)` as an
/// open line string and encode the tile as PNG.
///
/// Coordinates map linearly from the tile's lon/lat bounds to pixels, north
/// up. The reader's select box is left set to the tile bounds. Returns
/// `Selection::Empty` when the tile misses the file's bbox.
pub fn render_single_tile(
    reader: &mut ShapefileReader,
    projector: &MercatorProjector,
    tms_x: u32,
    tms_y: u32,
    zoom: u32,
    config: &RenderConfig,
) -> RenderResult<Selection<Vec<u8>>> {
    let bounds = projector.tile_lat_lon_bounds(tms_x, tms_y, zoom);
    if let Selection::Empty(reason) = reader.set_select_bbox(Some(bounds)) {
        debug!(x = tms_x, y = tms_y, zoom = zoom, reason = %reason, "Tile misses shapefile");
        return Ok(Selection::Empty(reason));
    }
    reader.rewind()?;

    let ts = projector.tile_size() as usize;
    let mut canvas = Canvas::with_palette(ts, ts, &config.palette())?.with_bounds(
        bounds.min_x,
        bounds.max_y,
        bounds.max_x,
        bounds.min_y,
    );

    let mut records = 0usize;
    while let Some(record) = reader.next_record()? {
        for part in &record.parts {
            canvas.polyline(part, OUTLINE);
        }
        records += 1;
    }
    debug!(x = tms_x, y = tms_y, zoom = zoom, records = records, "Rendered single tile");

    Ok(Selection::Selected(canvas.encode()?))
}
