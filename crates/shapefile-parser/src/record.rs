//! Shape records and their header fields.

use tile_common::BoundingBox;

use crate::error::{ShapefileError, ShapefileResult};

/// Shape types this reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    Polyline,
    Polygon,
}

impl ShapeType {
    pub const NULL_CODE: i32 = 0;

    /// Map a Shapefile shape type code.
    pub fn from_code(code: i32) -> ShapefileResult<Self> {
        match code {
            3 => Ok(ShapeType::Polyline),
            5 => Ok(ShapeType::Polygon),
            other => Err(ShapefileError::Format(format!(
                "Unsupported shape type {} (expected 3 polyline or 5 polygon)",
                other
            ))),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ShapeType::Polyline => 3,
            ShapeType::Polygon => 5,
        }
    }
}

/// Identity and extent of a record, without its points.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub id: String,
    /// One-based record number
    pub record_number: u32,
    /// (lon, lat) bbox
    pub bbox: BoundingBox,
}

/// A fully decoded polygon or polyline record.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub id: String,
    /// One-based record number
    pub record_number: u32,
    pub shape_type: ShapeType,
    /// (lon, lat) bbox
    pub bbox: BoundingBox,
    /// Rings or line strings as (lon, lat) pairs
    pub parts: Vec<Vec<(f64, f64)>>,
}

impl ShapeRecord {
    pub fn num_points(&self) -> usize {
        self.parts.iter().map(Vec::len).sum()
    }

    pub fn header(&self) -> RecordHeader {
        RecordHeader {
            id: self.id.clone(),
            record_number: self.record_number,
            bbox: self.bbox,
        }
    }
}

/// Split a flat point array into parts given the part start indices.
///
/// Starts must begin at 0, be non-decreasing and not exceed the point count.
pub(crate) fn split_parts(
    starts: &[i32],
    points: Vec<(f64, f64)>,
) -> ShapefileResult<Vec<Vec<(f64, f64)>>> {
    let num_points = points.len();
    let mut bounds = Vec::with_capacity(starts.len() + 1);
    for &s in starts {
        if s < 0 || s as usize > num_points {
            return Err(ShapefileError::Format(format!(
                "Part start {} outside 0..={}",
                s, num_points
            )));
        }
        bounds.push(s as usize);
    }
    bounds.push(num_points);

    if starts.first().is_some_and(|&s| s != 0) {
        return Err(ShapefileError::Format(
            "First part does not start at point 0".to_string(),
        ));
    }
    if bounds.windows(2).any(|w| w[0] > w[1]) {
        return Err(ShapefileError::Format(
            "Part starts are not ascending".to_string(),
        ));
    }

    Ok(bounds
        .windows(2)
        .map(|w| points[w[0]..w[1]].to_vec())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(n: usize) -> Vec<(f64, f64)> {
        (0..n).map(|i| (i as f64, -(i as f64))).collect()
    }

    #[test]
    fn test_split_parts() {
        let parts = split_parts(&[0, 4, 9], pts(12)).unwrap();
        let lengths: Vec<_> = parts.iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![4, 5, 3]);
        assert_eq!(parts[1][0], (4.0, -4.0));
    }

    #[test]
    fn test_split_parts_rejects_bad_starts() {
        assert!(split_parts(&[1, 3], pts(5)).is_err());
        assert!(split_parts(&[0, 4, 2], pts(5)).is_err());
        assert!(split_parts(&[0, 6], pts(5)).is_err());
    }

    #[test]
    fn test_shape_type_codes() {
        assert_eq!(ShapeType::from_code(5).unwrap(), ShapeType::Polygon);
        assert_eq!(ShapeType::Polyline.code(), 3);
        assert!(ShapeType::from_code(1).is_err());
    }
}
