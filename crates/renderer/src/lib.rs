//! Tile rendering for boundary polyfiles.
//!
//! - [`canvas`]: 8-bit indexed drawing surface (Bresenham lines, outlines,
//!   scanline fill)
//! - [`png`]: indexed PNG encoder with a transparent background
//! - [`rasterizer`]: split-and-render of a zoom level into tiles
//! - [`single_tile`]: one tile straight from a Shapefile
//! - [`sink`]: where encoded tiles go

pub mod canvas;
pub mod config;
pub mod error;
pub mod png;
pub mod rasterizer;
pub mod single_tile;
pub mod sink;

pub use canvas::{Canvas, BACKGROUND};
pub use config::{RenderConfig, DEFAULT_MAX_CANVAS_PIXELS};
pub use error::{RenderError, RenderResult};
pub use png::{create_png_indexed, Rgb, MAX_PALETTE_SIZE};
pub use rasterizer::{CancelToken, RenderStats, RenderedTile, TileRasterizer};
pub use single_tile::render_single_tile;
pub use sink::{DirectorySink, MemorySink, QueueSink, TileMessage, TileSink};
