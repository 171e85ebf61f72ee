//! Error types for tile rendering.

use polyfile::PolyfileError;
use shapefile_parser::ShapefileError;
use thiserror::Error;

/// Result type for renderer operations.
pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Polyfile error: {0}")]
    Polyfile(#[from] PolyfileError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] ShapefileError),

    /// Invalid PNG encoder input
    #[error("PNG encoding failed: {0}")]
    Encode(String),

    /// The canvas palette already holds 256 colors
    #[error("Palette is full ({0} colors)")]
    PaletteFull(usize),

    /// A tile sink refused or failed to store a tile
    #[error("Tile sink error: {0}")]
    Sink(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rendering cancelled")]
    Cancelled,
}
