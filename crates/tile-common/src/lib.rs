//! Common types shared across the boundary-tiles crates.

pub mod bbox;
pub mod tile;

pub use bbox::{BboxParseError, BoundingBox, MeterBounds};
pub use tile::{tile_file_name, TileCoord, TileRange, TILE_SIZE};
