//! Error types for the polyfile crate.

use shapefile_parser::ShapefileError;
use thiserror::Error;

/// Errors that can occur while writing or reading a polyfile.
#[derive(Error, Debug)]
pub enum PolyfileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Shapefile error: {0}")]
    Shapefile(#[from] ShapefileError),

    #[error("Invalid polyfile format: {0}")]
    Format(String),

    /// A projected coordinate does not fit in an i32
    #[error("Projected coordinate out of range: ({lat}, {lon}) -> ({x}, {y})")]
    OutOfRange { lat: f64, lon: f64, x: f64, y: f64 },
}

/// Result type for polyfile operations.
pub type PolyfileResult<T> = Result<T, PolyfileError>;
