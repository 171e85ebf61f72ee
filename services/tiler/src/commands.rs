//! The tiler's subcommands.

use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{Context, Result};
use polyfile::{Converter, PolyfileReader};
use projection::MercatorProjector;
use renderer::{
    render_single_tile, CancelToken, DirectorySink, QueueSink, RenderStats, TileMessage,
    TileRasterizer, TileSink,
};
use shapefile_parser::{Selection, ShapefileReader};
use tile_common::{tile_file_name, BoundingBox};
use tracing::{debug, error, info, warn};

use crate::config::{ThemeConfig, TilerConfig};

/// Tiles queued between the rasterizer and the writer threads.
const QUEUE_CAPACITY: usize = 64;

/// Convert a theme's Shapefile into its polyfile.
///
/// Returns the number of features written, zero when no record qualified.
pub fn convert(theme: &ThemeConfig, projector: &MercatorProjector) -> Result<usize> {
    info!(theme = %theme.name, shapefile = %theme.shapefile.display(), "Converting theme");
    let selection = Converter::convert(&theme.converter_config(), projector)
        .with_context(|| format!("Failed to convert theme {}", theme.name))?;

    match selection {
        Selection::Selected(summary) => {
            info!(
                theme = %theme.name,
                polyfile = %theme.polyfile.display(),
                features = summary.features,
                ids = summary.distinct_ids,
                "Theme converted"
            );
            Ok(summary.features)
        }
        Selection::Empty(reason) => {
            warn!(theme = %theme.name, reason = %reason, "Nothing to convert");
            Ok(0)
        }
    }
}

/// Options of the `render` subcommand.
#[derive(Debug, Clone)]
pub struct RenderOptions<'a> {
    pub min_zoom: Option<u32>,
    pub max_zoom: Option<u32>,
    pub output_dir: &'a Path,
    pub writers: usize,
    pub skip_existing: bool,
}

/// Render a theme's zoom levels from its polyfile into `output_dir`.
///
/// Rendering and writing run concurrently: the rasterizer feeds a bounded
/// queue drained by `writers` threads. A failing writer cancels rendering.
pub fn render(
    config: &TilerConfig,
    theme: &ThemeConfig,
    projector: &MercatorProjector,
    options: &RenderOptions<'_>,
) -> Result<RenderStats> {
    let reader = PolyfileReader::open(&theme.polyfile).with_context(|| {
        format!(
            "Cannot open polyfile {} (run `tiler convert --theme {}` first)",
            theme.polyfile.display(),
            theme.name
        )
    })?;

    let zooms = theme.zoom_range(config);
    let min_zoom = options.min_zoom.unwrap_or(*zooms.start());
    let max_zoom = options.max_zoom.unwrap_or(*zooms.end());
    anyhow::ensure!(
        min_zoom <= max_zoom,
        "min zoom {} exceeds max zoom {}",
        min_zoom,
        max_zoom
    );

    let cancel = CancelToken::new();
    let rasterizer = TileRasterizer::new(&reader, projector, config.render.clone())
        .with_cancel_token(cancel.clone());
    let (mut sink, receiver) = QueueSink::bounded(QUEUE_CAPACITY, options.writers);
    let receiver = Arc::new(Mutex::new(receiver));

    thread::scope(|scope| {
        let writers: Vec<_> = (0..options.writers)
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let cancel = cancel.clone();
                scope.spawn(move || {
                    let result = write_tiles(worker, &receiver, options);
                    if let Err(e) = &result {
                        error!(worker = worker, error = %e, "Tile writer failed, cancelling render");
                        cancel.cancel();
                    }
                    result
                })
            })
            .collect();
        // only writers keep the queue open, so a dead pool unblocks the rasterizer
        drop(receiver);

        let mut total = RenderStats::default();
        let mut rendered = Ok(());
        for zoom in min_zoom..=max_zoom {
            match rasterizer.render_zoom(zoom, &theme.name, &mut sink) {
                Ok(stats) => {
                    info!(
                        theme = %theme.name,
                        zoom = zoom,
                        leaves = stats.leaves,
                        tiles = stats.tiles_emitted,
                        "Zoom level queued"
                    );
                    total = total.combine(stats);
                }
                Err(e) => {
                    rendered = Err(e);
                    break;
                }
            }
        }

        // writers must see their shutdown even when rendering failed
        let finished = sink.finish();

        let mut written = 0;
        let mut write_error = None;
        for handle in writers {
            match handle.join() {
                Ok(Ok(count)) => written += count,
                Ok(Err(e)) => write_error = write_error.or(Some(e)),
                Err(_) => {
                    write_error = write_error.or(Some(anyhow::anyhow!("tile writer panicked")))
                }
            }
        }

        if let Some(e) = write_error {
            return Err(e);
        }
        rendered.with_context(|| format!("Rendering theme {} failed", theme.name))?;
        finished?;

        info!(
            theme = %theme.name,
            zooms = ?(min_zoom..=max_zoom),
            emitted = total.tiles_emitted,
            written = written,
            skipped_blank = total.tiles_skipped,
            "Theme rendered"
        );
        Ok(total)
    })
}

/// Drain the tile queue into the output directory until shutdown.
fn write_tiles(
    worker: usize,
    receiver: &Mutex<Receiver<TileMessage>>,
    options: &RenderOptions<'_>,
) -> Result<usize> {
    let mut sink = DirectorySink::new(options.output_dir)?.skip_existing(options.skip_existing);
    loop {
        let message = receiver
            .lock()
            .map_err(|_| anyhow::anyhow!("tile queue lock poisoned"))?
            .recv()
            .context("tile queue closed before shutdown")?;
        match message {
            TileMessage::Tile { name, data } => sink.accept(name, data)?,
            TileMessage::Shutdown => break,
        }
    }
    debug!(
        worker = worker,
        written = sink.written(),
        skipped = sink.skipped(),
        "Tile writer finished"
    );
    Ok(sink.written())
}

/// Render the tiles covering a (lon, lat) box straight from the Shapefile.
///
/// Tiles the Shapefile does not reach are skipped. Returns the number of
/// tiles written.
pub fn tile(
    theme: &ThemeConfig,
    projector: &MercatorProjector,
    config: &TilerConfig,
    zoom: u32,
    region: &BoundingBox,
    output_dir: &Path,
) -> Result<usize> {
    let selection = ShapefileReader::open(&theme.shapefile, None, &theme.id_field, theme.validator())
        .with_context(|| format!("Cannot open shapefile {}", theme.shapefile.display()))?;
    let mut reader = match selection {
        Selection::Selected(reader) => reader,
        Selection::Empty(reason) => {
            warn!(theme = %theme.name, reason = %reason, "No tiles to render");
            return Ok(0);
        }
    };

    let range = projector.lat_lon_tile_range(region, zoom);
    info!(theme = %theme.name, region = %region, range = %range, "Rendering single tiles");

    let mut sink = DirectorySink::new(output_dir)?.skip_existing(config.skip_existing);
    for coord in range.tiles() {
        match render_single_tile(&mut reader, projector, coord.x, coord.y, zoom, &config.render)? {
            Selection::Selected(data) => {
                sink.accept(tile_file_name(&theme.name, &coord.flip_y()), data)?;
            }
            Selection::Empty(_) => {
                debug!(x = coord.x, y = coord.y, zoom = zoom, "Skipping tile outside shapefile");
            }
        }
    }

    info!(
        theme = %theme.name,
        written = sink.written(),
        skipped_existing = sink.skipped(),
        "Single tiles done"
    );
    Ok(sink.written())
}
