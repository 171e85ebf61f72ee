//! Coordinate transformations for the tile pyramid.
//!
//! Implements the spherical Mercator profile from scratch without external
//! dependencies.

pub mod mercator;

pub use mercator::{Affine, MercatorProjector, EARTH_RADIUS, MAX_LATITUDE, MAX_ZOOM, ORIGIN_SHIFT};
