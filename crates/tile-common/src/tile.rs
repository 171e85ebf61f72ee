//! Slippy-map tile addresses and tile ranges.
//!
//! Tiles are addressed in one of two conventions: TMS (origin bottom-left,
//! the convention of all tile arithmetic here) and Google/XYZ (origin
//! top-left, the convention of emitted tile names).

use serde::{Deserialize, Serialize};

/// Edge length of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Flip the row between TMS and Google conventions.
    ///
    /// `y' = 2^z - 1 - y`; applying it twice returns the original tile.
    pub fn flip_y(&self) -> TileCoord {
        let n = 1u64 << self.z;
        TileCoord {
            z: self.z,
            x: self.x,
            y: (n - 1 - self.y as u64) as u32,
        }
    }
}

/// File name under which a rendered tile is handed to collaborators.
///
/// `coord` must already be in the Google convention.
pub fn tile_file_name(theme: &str, coord: &TileCoord) -> String {
    format!("tile_{}_{}_{}_{}.png", theme, coord.z, coord.x, coord.y)
}

/// An inclusive rectangle of TMS tiles at one zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRange {
    pub zoom: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl TileRange {
    pub fn new(zoom: u32, min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        debug_assert!(min_x <= max_x && min_y <= max_y);
        Self {
            zoom,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Number of tile columns.
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    /// Number of tile rows.
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn tile_count(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_single_tile(&self) -> bool {
        self.min_x == self.max_x && self.min_y == self.max_y
    }

    /// Pixel area of a canvas covering the whole range.
    ///
    /// Saturates at `u64::MAX`, so oversized ranges never look small.
    pub fn pixel_area(&self, tile_size: u32) -> u64 {
        let ts = tile_size as u64;
        (ts * self.width() as u64).saturating_mul(ts * self.height() as u64)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Halve the range along its longer axis (X on ties).
    ///
    /// Returns `None` for a single tile. Otherwise the halves are
    /// `[min, mid]` and `[mid + 1, max]` with `mid = min + (max - min) / 2`,
    /// so both are non-empty, disjoint and strictly smaller.
    pub fn split(&self) -> Option<(TileRange, TileRange)> {
        let dx = self.max_x - self.min_x;
        let dy = self.max_y - self.min_y;
        if dx == 0 && dy == 0 {
            return None;
        }
        let mut low = *self;
        let mut high = *self;
        if dx < dy {
            let mid = self.min_y + dy / 2;
            low.max_y = mid;
            high.min_y = mid + 1;
        } else {
            let mid = self.min_x + dx / 2;
            low.max_x = mid;
            high.min_x = mid + 1;
        }
        Some((low, high))
    }

    /// All TMS tiles of the range, column by column.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.min_x..=self.max_x)
            .flat_map(move |x| (self.min_y..=self.max_y).map(move |y| TileCoord::new(self.zoom, x, y)))
    }
}

impl std::fmt::Display for TileRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "z{} x={}:{} y={}:{}",
            self.zoom, self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}
