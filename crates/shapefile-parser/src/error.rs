//! Error types for Shapefile reading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for Shapefile operations.
pub type ShapefileResult<T> = Result<T, ShapefileError>;

/// Error types for Shapefile reading.
#[derive(Error, Debug)]
pub enum ShapefileError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed `.shp`, `.shx` or `.dbf` content, or an unsupported shape type
    #[error("Invalid shapefile format: {0}")]
    Format(String),

    /// A keyed seek was requested but no `.shx` index was loaded
    #[error("No shape index available: {}", .0.display())]
    MissingIndex(PathBuf),

    /// Seek key that can never be in the index
    #[error("Invalid key {key}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// Well-formed key that is absent from the index
    #[error("Key not in index: {key}")]
    NotInIndex { key: String },
}
