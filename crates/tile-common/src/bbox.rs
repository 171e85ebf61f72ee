//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

/// A geographic bounding box in (lon, lat) axis order.
///
/// `min_x`/`max_x` are longitudes and `min_y`/`max_y` are latitudes, the
/// natural order of Shapefile headers. Every crate in the workspace uses
/// this order for selection boxes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Build from the 4 doubles stored in a Shapefile header or record.
    pub fn from_array(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    /// Parse a "minx,miny,maxx,maxy" string (lon,lat,lon,lat).
    pub fn parse(s: &str) -> Result<Self, BboxParseError> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 4 {
            return Err(BboxParseError::InvalidFormat(s.to_string()));
        }

        let mut values = [0.0f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .trim()
                .parse()
                .map_err(|_| BboxParseError::InvalidNumber(part.to_string()))?;
        }
        Ok(Self::from_array(values))
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True iff `self` lies entirely outside `other` (zero overlap).
    ///
    /// Boxes that only touch along an edge are not "all out".
    pub fn all_out(&self, other: &BoundingBox) -> bool {
        self.min_x > other.max_x
            || self.max_x < other.min_x
            || self.min_y > other.max_y
            || self.max_y < other.min_y
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:9.4} {:9.4} {:9.4} {:9.4}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BboxParseError {
    #[error("Invalid BBOX format: {0}. Expected 'minx,miny,maxx,maxy'")]
    InvalidFormat(String),

    #[error("Invalid number in BBOX: {0}")]
    InvalidNumber(String),
}

/// A projected bounding box in whole Web-Mercator meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeterBounds {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl MeterBounds {
    /// Sentinel for min/max reduction: merging anything into it yields that thing.
    pub const EMPTY: MeterBounds = MeterBounds {
        min_x: i32::MAX,
        min_y: i32::MAX,
        max_x: i32::MIN,
        max_y: i32::MIN,
    };

    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Element-wise min/max merge.
    pub fn merge(&self, other: &MeterBounds) -> MeterBounds {
        MeterBounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// True when nothing was ever merged in (or the box is inverted).
    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }

    pub fn to_array(&self) -> [i32; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }
}

impl Default for MeterBounds {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bbox() {
        let bbox = BoundingBox::parse("-125.0,24.0,-66.0,50.0").unwrap();
        assert_eq!(bbox.min_x, -125.0);
        assert_eq!(bbox.min_y, 24.0);
        assert_eq!(bbox.max_x, -66.0);
        assert_eq!(bbox.max_y, 50.0);
    }

    #[test]
    fn test_all_out() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);

        assert!(!a.all_out(&b));
        assert!(a.all_out(&c));
        assert!(c.all_out(&a));
    }

    #[test]
    fn test_touching_edges_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert!(!a.all_out(&b));
        assert!(!b.all_out(&a));
    }

    #[test]
    fn test_meter_bounds_merge_from_empty() {
        let b = MeterBounds::new(-5, -6, 7, 8);
        assert!(MeterBounds::EMPTY.is_empty());
        assert_eq!(MeterBounds::EMPTY.merge(&b), b);
        let merged = b.merge(&MeterBounds::new(0, -10, 20, 0));
        assert_eq!(merged, MeterBounds::new(-5, -10, 20, 8));
    }
}
