//! Spherical (Web) Mercator projection and the TMS tile pyramid.
//!
//! Conversions chain as lat/lon (WGS84) <-> meters (EPSG:3857) <-> pyramid
//! pixels <-> tiles. Pixel and tile coordinates follow TMS notation with
//! the origin at the bottom-left of the world.
//!
//! Latitudes beyond [`MAX_LATITUDE`] project outside the square world
//! extent. Point conversions do not clip them; lat/lon tile lookups clamp
//! to the pyramid.

use std::f64::consts::PI;

use tile_common::{BoundingBox, MeterBounds, TileRange, TILE_SIZE};

/// Earth radius used by the spherical Mercator profile (meters).
pub const EARTH_RADIUS: f64 = 6378137.0;

/// Half the world extent in meters, `πR` (20037508.342789244).
pub const ORIGIN_SHIFT: f64 = PI * EARTH_RADIUS;

/// Latitude of the north edge of the square world, `atan(sinh(π))`.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Deepest zoom supported by `u32` tile indices.
pub const MAX_ZOOM: u32 = 31;

/// Coefficients of an affine transform
/// `out_x = a*x + b*y + c`, `out_y = d*x + e*y + f`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }
}

/// TMS global Mercator profile.
#[derive(Debug, Clone)]
pub struct MercatorProjector {
    tile_size: u32,
    initial_resolution: f64,
    origin_shift: f64,
}

impl Default for MercatorProjector {
    fn default() -> Self {
        Self::new(TILE_SIZE)
    }
}

impl MercatorProjector {
    /// Create a projector for the given tile edge length in pixels.
    pub fn new(tile_size: u32) -> Self {
        Self {
            tile_size,
            // 156543.03392804062 for 256 pixel tiles
            initial_resolution: 2.0 * PI * EARTH_RADIUS / tile_size as f64,
            origin_shift: ORIGIN_SHIFT,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn origin_shift(&self) -> f64 {
        self.origin_shift
    }

    /// Resolution (meters/pixel) at the given zoom, measured at the equator.
    pub fn resolution(&self, zoom: u32) -> f64 {
        self.initial_resolution / 2f64.powi(zoom as i32)
    }

    /// WGS84 lat/lon to spherical Mercator meters.
    pub fn lat_lon_to_meters(&self, lat: f64, lon: f64) -> (f64, f64) {
        let scale = self.origin_shift / 180.0;
        let mx = lon * scale;
        let my = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
        (mx, my * scale)
    }

    /// Spherical Mercator meters to WGS84 lat/lon.
    pub fn meters_to_lat_lon(&self, mx: f64, my: f64) -> (f64, f64) {
        let scale = self.origin_shift / 180.0;
        let lon = mx / scale;
        let lat = my / scale;
        let lat = (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0) / (PI / 180.0);
        (lat, lon)
    }

    /// Pyramid pixel coordinates at `zoom` to meters.
    pub fn pixels_to_meters(&self, px: f64, py: f64, zoom: u32) -> (f64, f64) {
        let res = self.resolution(zoom);
        (px * res - self.origin_shift, py * res - self.origin_shift)
    }

    /// Meters to pyramid pixel coordinates at `zoom`.
    pub fn meters_to_pixels(&self, mx: f64, my: f64, zoom: u32) -> (f64, f64) {
        let res = self.resolution(zoom);
        ((mx + self.origin_shift) / res, (my + self.origin_shift) / res)
    }

    /// Tile covering the given pixel coordinates.
    ///
    /// Uses `ceil(p / tile_size) - 1`, so a pixel coordinate lying exactly on
    /// a tile edge belongs to the tile below/left of it, and 0 maps to -1.
    /// Infinite inputs saturate instead of overflowing.
    pub fn pixels_to_tile(&self, px: f64, py: f64) -> (i64, i64) {
        let ts = self.tile_size as f64;
        (
            ((px / ts).ceil() as i64).saturating_sub(1),
            ((py / ts).ceil() as i64).saturating_sub(1),
        )
    }

    /// Move the pixel origin from the bottom-left to the top-left corner.
    pub fn pixels_to_raster(&self, px: f64, py: f64, zoom: u32) -> (f64, f64) {
        let map_size = (self.tile_size as u64) << zoom;
        (px, map_size as f64 - py)
    }

    /// Tile containing the given meter coordinates.
    pub fn meters_to_tile(&self, mx: f64, my: f64, zoom: u32) -> (i64, i64) {
        let (px, py) = self.meters_to_pixels(mx, my, zoom);
        self.pixels_to_tile(px, py)
    }

    /// Tile containing the given lat/lon.
    ///
    /// Latitude is clamped to ±[`MAX_LATITUDE`], so the poles land in the
    /// first or last tile row.
    pub fn lat_lon_to_tile(&self, lat: f64, lon: f64, zoom: u32) -> (i64, i64) {
        let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
        let (mx, my) = self.lat_lon_to_meters(lat, lon);
        self.meters_to_tile(mx, my, zoom)
    }

    /// Bounds of a TMS tile in meters.
    pub fn tile_bounds(&self, tx: u32, ty: u32, zoom: u32) -> BoundingBox {
        let ts = self.tile_size as f64;
        let (min_x, min_y) = self.pixels_to_meters(tx as f64 * ts, ty as f64 * ts, zoom);
        let (max_x, max_y) =
            self.pixels_to_meters((tx as f64 + 1.0) * ts, (ty as f64 + 1.0) * ts, zoom);
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    /// Bounds of a TMS tile in (lon, lat) order.
    pub fn tile_lat_lon_bounds(&self, tx: u32, ty: u32, zoom: u32) -> BoundingBox {
        let bounds = self.tile_bounds(tx, ty, zoom);
        let (min_lat, min_lon) = self.meters_to_lat_lon(bounds.min_x, bounds.min_y);
        let (max_lat, max_lon) = self.meters_to_lat_lon(bounds.max_x, bounds.max_y);
        BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
    }

    /// Deepest zoom whose resolution is not finer than `pixel_size`.
    pub fn zoom_for_pixel_size(&self, pixel_size: f64) -> u32 {
        for zoom in 0..30 {
            if pixel_size > self.resolution(zoom) {
                return zoom.saturating_sub(1);
            }
        }
        29
    }

    /// TMS tile to Google tile coordinates (and back: the mapping is involutive).
    pub fn google_tile(&self, tx: u32, ty: u32, zoom: u32) -> (u32, u32) {
        let n = 1u64 << zoom;
        (tx, (n - 1 - ty as u64) as u32)
    }

    /// Microsoft quadkey of a TMS tile.
    pub fn quad_key(&self, tx: u32, ty: u32, zoom: u32) -> String {
        let (_, gy) = self.google_tile(tx, ty, zoom);
        (1..=zoom)
            .rev()
            .map(|i| {
                let mask = 1u32 << (i - 1);
                let mut digit = b'0';
                if tx & mask != 0 {
                    digit += 1;
                }
                if gy & mask != 0 {
                    digit += 2;
                }
                digit as char
            })
            .collect()
    }

    /// TMS tiles covering a box of meters at `zoom`, clamped to the pyramid.
    ///
    /// Returns `None` for an empty box.
    pub fn tile_range(&self, bounds: &MeterBounds, zoom: u32) -> Option<TileRange> {
        if bounds.is_empty() {
            return None;
        }
        let last = ((1u64 << zoom) - 1) as i64;
        let clamp = |t: i64| t.clamp(0, last) as u32;
        let (min_tx, min_ty) = self.meters_to_tile(bounds.min_x as f64, bounds.min_y as f64, zoom);
        let (max_tx, max_ty) = self.meters_to_tile(bounds.max_x as f64, bounds.max_y as f64, zoom);
        Some(TileRange::new(
            zoom,
            clamp(min_tx),
            clamp(min_ty),
            clamp(max_tx),
            clamp(max_ty),
        ))
    }

    /// TMS tiles covering a (lon, lat) box at `zoom`, clamped to the pyramid.
    pub fn lat_lon_tile_range(&self, bbox: &BoundingBox, zoom: u32) -> TileRange {
        let last = ((1u64 << zoom) - 1) as i64;
        let clamp = |t: i64| t.clamp(0, last) as u32;
        let (min_tx, min_ty) = self.lat_lon_to_tile(bbox.min_y, bbox.min_x, zoom);
        let (max_tx, max_ty) = self.lat_lon_to_tile(bbox.max_y, bbox.max_x, zoom);
        TileRange::new(
            zoom,
            clamp(min_tx),
            clamp(min_ty),
            clamp(max_tx).max(clamp(min_tx)),
            clamp(max_ty).max(clamp(min_ty)),
        )
    }

    /// Affine transform from meters to pixels of a canvas covering `range`.
    ///
    /// The Y axis is flipped: canvas row 0 is the north edge of the range's
    /// northernmost tile row, column 0 the west edge of its westernmost column.
    pub fn affine_meters_to_pixels(&self, zoom: u32, range: &TileRange) -> Affine {
        let ires = 1.0 / self.resolution(zoom);
        let delta = self.origin_shift * ires;
        let ts = self.tile_size as f64;
        Affine {
            a: ires,
            b: 0.0,
            c: delta - range.min_x as f64 * ts,
            d: 0.0,
            e: -ires,
            f: (range.max_y as f64 + 1.0) * ts - delta,
        }
    }
}
