//! Shared test utilities for the boundary-tiles workspace.
//!
//! - Synthetic Shapefile triples ([`ShapefileBuilder`])
//! - Fixture boxes and geometries
//! - Lookup of optional real-world data, with a skip macro
//! - Approximate float assertions
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```

pub mod fixtures;
pub mod paths;
pub mod shapefile;

pub use paths::*;
pub use shapefile::{bbox_of, rectangle_ring, ShapefileBuilder};

/// Skip the test (return early) when a data file cannot be found.
///
/// ```ignore
/// let shp = require_test_file!("fe_2007_us_state.shp");
/// ```
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: Test file '{}' not found. Set TEST_DATA_DIR to run it.",
                    $name
                );
                return;
            }
        }
    }};
}

/// Approximate float equality; both sides are widened to `f64`.
///
/// ```ignore
/// assert_approx_eq!(meters.width(), 9783.94, 0.01);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Approximate equality of coordinate pairs, given as tuple literals or as
/// expressions returning `(f64, f64)`.
///
/// ```ignore
/// assert_coords_approx_eq!((1.0001, 2.0001), (1.0, 2.0), 0.001);
/// assert_coords_approx_eq!(xform.apply(x, y), (0.0, 0.0), 1e-6);
/// ```
#[macro_export]
macro_rules! assert_coords_approx_eq {
    (($x1:expr, $y1:expr), ($x2:expr, $y2:expr), $epsilon:expr) => {{
        $crate::assert_approx_eq!($x1, $x2, $epsilon);
        $crate::assert_approx_eq!($y1, $y2, $epsilon);
    }};
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let (x1, y1): (f64, f64) = $left;
        let (x2, y2): (f64, f64) = $right;
        $crate::assert_approx_eq!(x1, x2, $epsilon);
        $crate::assert_approx_eq!(y1, y2, $epsilon);
    }};
}
