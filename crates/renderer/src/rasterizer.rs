//! Rasterize a polyfile into a zoom level of Mercator tiles.
//!
//! A zoom level's tile range is split into leaves small enough to hold in
//! one canvas. Each leaf is drawn in full, sliced into tiles, and the tiles
//! that carry any ink are encoded and handed to a [`TileSink`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use polyfile::PolyfileReader;
use projection::MercatorProjector;
use rayon::prelude::*;
use tile_common::{tile_file_name, BoundingBox, MeterBounds, TileCoord, TileRange};
use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::config::RenderConfig;
use crate::error::{RenderError, RenderResult};
use crate::sink::TileSink;

/// Palette index of outlines in a leaf canvas.
const OUTLINE: u8 = 1;
/// Palette index of polygon interiors when a fill color is configured.
const FILL: u8 = 2;

/// Shared flag that stops rendering at the next leaf boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// One non-blank tile cut out of a leaf canvas.
#[derive(Debug, Clone)]
pub struct RenderedTile {
    /// Google/XYZ address
    pub coord: TileCoord,
    pub pixels: Canvas,
}

/// Counters for one rendering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub leaves: usize,
    pub tiles_emitted: usize,
    /// Tiles left out because they were entirely background
    pub tiles_skipped: usize,
}

impl RenderStats {
    pub fn combine(self, other: RenderStats) -> RenderStats {
        RenderStats {
            leaves: self.leaves + other.leaves,
            tiles_emitted: self.tiles_emitted + other.tiles_emitted,
            tiles_skipped: self.tiles_skipped + other.tiles_skipped,
        }
    }
}

/// Renders the features of one polyfile.
pub struct TileRasterizer<'a> {
    reader: &'a PolyfileReader,
    projector: &'a MercatorProjector,
    config: RenderConfig,
    cancel: CancelToken,
}

impl<'a> TileRasterizer<'a> {
    pub fn new(
        reader: &'a PolyfileReader,
        projector: &'a MercatorProjector,
        config: RenderConfig,
    ) -> Self {
        Self {
            reader,
            projector,
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Observe `token` instead of the rasterizer's own token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render every tile of `zoom` the polyfile touches.
    ///
    /// An empty polyfile renders nothing.
    pub fn render_zoom<S>(&self, zoom: u32, theme: &str, sink: &mut S) -> RenderResult<RenderStats>
    where
        S: TileSink + Send,
    {
        match self.reader.tile_range(zoom, self.projector) {
            Some(range) => self.render_range(&range, theme, sink),
            None => {
                info!(zoom = zoom, path = %self.reader.path().display(), "Polyfile is empty, nothing to render");
                Ok(RenderStats::default())
            }
        }
    }

    /// Render the tiles of `range`, one rayon task per leaf.
    ///
    /// Each task holds its leaf canvas plus the one tile being encoded, so
    /// peak memory is about `max_canvas_pixels` bytes per rayon thread.
    /// Leaves that start after cancellation are not rendered. When a leaf
    /// fails, the first non-cancellation error is returned; tiles already
    /// handed to the sink stay there.
    pub fn render_range<S>(
        &self,
        range: &TileRange,
        theme: &str,
        sink: &mut S,
    ) -> RenderResult<RenderStats>
    where
        S: TileSink + Send,
    {
        let leaves = self.plan(range);
        info!(
            range = %range,
            tiles = range.tile_count(),
            leaves = leaves.len(),
            theme = theme,
            "Rendering zoom level"
        );

        let ts = self.projector.tile_size() as usize;
        let sink = Mutex::new(sink);
        let results: Vec<RenderResult<RenderStats>> = leaves
            .par_iter()
            .map(|leaf| {
                if self.cancel.is_cancelled() {
                    return Err(RenderError::Cancelled);
                }
                let canvas = self.draw_leaf(leaf)?;
                let mut emitted = 0usize;
                for (coord, left, top) in self.inked_tiles(&canvas, leaf) {
                    // one tile copy alive at a time next to the leaf canvas
                    let data = canvas.window(left, top, ts, ts).encode()?;
                    let name = tile_file_name(theme, &coord);
                    let mut sink = sink
                        .lock()
                        .map_err(|_| RenderError::Sink("tile sink lock poisoned".to_string()))?;
                    sink.accept(name, data)?;
                    emitted += 1;
                }
                Ok(RenderStats {
                    leaves: 1,
                    tiles_emitted: emitted,
                    tiles_skipped: leaf.tile_count() as usize - emitted,
                })
            })
            .collect();

        let mut total = RenderStats::default();
        let mut cancelled = false;
        for result in results {
            match result {
                Ok(stats) => total = total.combine(stats),
                Err(RenderError::Cancelled) => cancelled = true,
                Err(e) => return Err(e),
            }
        }
        if cancelled {
            warn!(completed_leaves = total.leaves, "Rendering cancelled");
            return Err(RenderError::Cancelled);
        }

        info!(
            leaves = total.leaves,
            emitted = total.tiles_emitted,
            skipped = total.tiles_skipped,
            "Zoom level rendered"
        );
        Ok(total)
    }

    /// Split `range` into leaves whose canvas fits `max_canvas_pixels`.
    ///
    /// Ranges are halved along the longer axis until they fit or are a
    /// single tile, which is always rendered regardless of size. The leaves
    /// are disjoint and cover `range` exactly.
    pub fn plan(&self, range: &TileRange) -> Vec<TileRange> {
        let mut leaves = Vec::new();
        let mut pending = vec![*range];
        let tile_size = self.projector.tile_size();
        while let Some(r) = pending.pop() {
            if r.pixel_area(tile_size) <= self.config.max_canvas_pixels {
                leaves.push(r);
                continue;
            }
            match r.split() {
                Some((low, high)) => {
                    pending.push(high);
                    pending.push(low);
                }
                None => leaves.push(r),
            }
        }
        leaves
    }

    /// Draw one leaf and return its non-blank tiles.
    pub fn render_leaf(&self, leaf: &TileRange) -> RenderResult<Vec<RenderedTile>> {
        let ts = self.projector.tile_size() as usize;
        let canvas = self.draw_leaf(leaf)?;
        Ok(self
            .inked_tiles(&canvas, leaf)
            .map(|(coord, left, top)| RenderedTile {
                coord,
                pixels: canvas.window(left, top, ts, ts),
            })
            .collect())
    }

    /// Draw every feature crossing `leaf` onto one canvas covering it.
    fn draw_leaf(&self, leaf: &TileRange) -> RenderResult<Canvas> {
        let ts = self.projector.tile_size() as usize;
        let mut canvas = Canvas::with_palette(
            leaf.width() as usize * ts,
            leaf.height() as usize * ts,
            &self.config.palette(),
        )?;
        let affine = self.projector.affine_meters_to_pixels(leaf.zoom, leaf);
        let cull = self.leaf_meter_bounds(leaf);

        let mut drawn = 0usize;
        for feature in self.reader.features()? {
            let feature = feature?;
            if padded(&feature.bbox).all_out(&cull) {
                continue;
            }
            let rings: Vec<Vec<(f64, f64)>> = feature
                .parts()
                .map(|part| {
                    part.chunks_exact(2)
                        .map(|p| affine.apply(p[0] as f64, p[1] as f64))
                        .collect()
                })
                .collect();
            if self.config.fill.is_some() {
                canvas.fill_rings(&rings, FILL);
            }
            for ring in &rings {
                let points: Vec<(i64, i64)> = ring
                    .iter()
                    .map(|&(x, y)| (x.floor() as i64, y.floor() as i64))
                    .collect();
                canvas.polygon(&points, OUTLINE);
            }
            drawn += 1;
        }

        debug!(leaf = %leaf, features = drawn, "Drew leaf");
        Ok(canvas)
    }

    /// Google address and window origin of each non-blank tile of a leaf canvas.
    fn inked_tiles<'c>(
        &self,
        canvas: &'c Canvas,
        leaf: &'c TileRange,
    ) -> impl Iterator<Item = (TileCoord, usize, usize)> + 'c {
        let ts = self.projector.tile_size() as usize;
        leaf.tiles().filter_map(move |coord| {
            let left = (coord.x - leaf.min_x) as usize * ts;
            let top = (leaf.max_y - coord.y) as usize * ts;
            if canvas.is_window_blank(left, top, ts, ts) {
                None
            } else {
                Some((coord.flip_y(), left, top))
            }
        })
    }

    fn leaf_meter_bounds(&self, leaf: &TileRange) -> BoundingBox {
        let low = self.projector.tile_bounds(leaf.min_x, leaf.min_y, leaf.zoom);
        let high = self.projector.tile_bounds(leaf.max_x, leaf.max_y, leaf.zoom);
        BoundingBox::new(low.min_x, low.min_y, high.max_x, high.max_y)
    }
}

/// Feature bbox widened by the one meter lost to truncation.
fn padded(b: &MeterBounds) -> BoundingBox {
    BoundingBox::new(
        b.min_x as f64 - 1.0,
        b.min_y as f64 - 1.0,
        b.max_x as f64 + 1.0,
        b.max_y as f64 + 1.0,
    )
}
