//! Common test fixtures for tiling tests.
//!
//! This module provides pre-defined boxes and geometries that represent
//! common scenarios in boundary tiling.

/// Common bounding box definitions as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Global bounding box (-180 to 180, -90 to 90)
    pub const GLOBAL: (f64, f64, f64, f64) = (-180.0, -90.0, 180.0, 90.0);

    /// Continental United States bounding box
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Palo Alto area, one ZIP code tabulation area wide.
    /// Covers TMS tiles x 658..=659, y 2507..=2508 at zoom 12.
    pub const PALO_ALTO: (f64, f64, f64, f64) = (-122.1552, 37.4162, -122.0780, 37.5001);

    /// Far from every other fixture (South Pacific)
    pub const SOUTH_PACIFIC: (f64, f64, f64, f64) = (-150.0, -40.0, -140.0, -30.0);

    /// Single point (degenerate bbox)
    pub const POINT: (f64, f64, f64, f64) = (0.0, 0.0, 0.0, 0.0);
}

/// Zoom levels used across tests.
pub mod zoom {
    /// Zoom at which the Palo Alto fixture spans a 2x2 tile block
    pub const PALO_ALTO_Z: u32 = 12;

    /// Typical state-level zoom range
    pub const STATE_ZOOMS: [u32; 4] = [4, 5, 6, 7];
}

/// Ready-made geometries.
pub mod shapes {
    use super::bbox;
    use crate::shapefile::rectangle_ring;

    /// Closed ring tracing the Palo Alto box.
    pub fn palo_alto_ring() -> Vec<(f64, f64)> {
        rectangle_ring(bbox::PALO_ALTO)
    }

    /// Closed triangular ring inside the Palo Alto box.
    pub fn palo_alto_triangle() -> Vec<(f64, f64)> {
        vec![
            (-122.15, 37.42),
            (-122.08, 37.42),
            (-122.11, 37.49),
            (-122.15, 37.42),
        ]
    }

    /// Two disjoint squares standing in for a multi-part state (islands).
    pub fn two_islands() -> Vec<Vec<(f64, f64)>> {
        vec![
            rectangle_ring((-120.0, 34.0, -119.5, 34.5)),
            rectangle_ring((-118.6, 33.3, -118.3, 33.5)),
        ]
    }
}
