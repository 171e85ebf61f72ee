//! Synthetic Shapefile triples for tests.
//!
//! Writes `.shp`, `.shx` and `.dbf` files with valid structure so readers can
//! be tested without shipping Census data. The attribute table has a numeric
//! `FID` column followed by the id column, so the id never sits at the start
//! of a record.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const POLYLINE: i32 = 3;
const POLYGON: i32 = 5;

enum Geometry {
    Null,
    Parts(Vec<Vec<(f64, f64)>>),
}

struct Record {
    id: String,
    geometry: Geometry,
    bbox_override: Option<[f64; 4]>,
}

/// Build a Shapefile triple record by record.
///
/// # Example
///
/// ```ignore
/// use test_utils::ShapefileBuilder;
///
/// let dir = test_utils::temp_test_dir();
/// let shp = ShapefileBuilder::polygon("STUSPS")
///     .record("CA", vec![vec![(-124.0, 32.0), (-114.0, 32.0), (-114.0, 42.0), (-124.0, 32.0)]])
///     .write(dir.path(), "states")
///     .unwrap();
/// ```
pub struct ShapefileBuilder {
    shape_type: i32,
    id_field: String,
    records: Vec<Record>,
    file_bbox: Option<[f64; 4]>,
    write_index: bool,
}

impl ShapefileBuilder {
    /// Builder for a polygon file whose ids live in column `id_field`.
    pub fn polygon(id_field: &str) -> Self {
        Self::with_shape_type(POLYGON, id_field)
    }

    /// Builder for a polyline file.
    pub fn polyline(id_field: &str) -> Self {
        Self::with_shape_type(POLYLINE, id_field)
    }

    /// Builder with an arbitrary shape type code, e.g. 1 (point) to
    /// exercise rejection of unsupported files.
    pub fn with_shape_type(shape_type: i32, id_field: &str) -> Self {
        Self {
            shape_type,
            id_field: id_field.to_string(),
            records: Vec::new(),
            file_bbox: None,
            write_index: true,
        }
    }

    /// Append a record with the given parts (rings or line strings).
    pub fn record(mut self, id: &str, parts: Vec<Vec<(f64, f64)>>) -> Self {
        self.records.push(Record {
            id: id.to_string(),
            geometry: Geometry::Parts(parts),
            bbox_override: None,
        });
        self
    }

    /// Append a record whose stored bbox differs from its points.
    pub fn record_with_bbox(
        mut self,
        id: &str,
        bbox: [f64; 4],
        parts: Vec<Vec<(f64, f64)>>,
    ) -> Self {
        self.records.push(Record {
            id: id.to_string(),
            geometry: Geometry::Parts(parts),
            bbox_override: Some(bbox),
        });
        self
    }

    /// Append a null-shape record.
    pub fn null_record(mut self, id: &str) -> Self {
        self.records.push(Record {
            id: id.to_string(),
            geometry: Geometry::Null,
            bbox_override: None,
        });
        self
    }

    /// Override the overall bbox written in the file headers.
    pub fn file_bbox(mut self, bbox: [f64; 4]) -> Self {
        self.file_bbox = Some(bbox);
        self
    }

    /// Skip writing the `.shx` index.
    pub fn without_index(mut self) -> Self {
        self.write_index = false;
        self
    }

    /// Write `<stem>.shp`, `<stem>.dbf` and (unless disabled) `<stem>.shx`
    /// into `dir`, returning the `.shp` path.
    pub fn write(&self, dir: &Path, stem: &str) -> io::Result<PathBuf> {
        let shp_path = dir.join(format!("{}.shp", stem));
        let (shp, shx) = self.encode_geometry();
        fs::write(&shp_path, shp)?;
        if self.write_index {
            fs::write(dir.join(format!("{}.shx", stem)), shx)?;
        }
        fs::write(dir.join(format!("{}.dbf", stem)), self.encode_dbf())?;
        Ok(shp_path)
    }

    fn record_bbox(record: &Record) -> [f64; 4] {
        if let Some(bbox) = record.bbox_override {
            return bbox;
        }
        match &record.geometry {
            Geometry::Null => [0.0; 4],
            Geometry::Parts(parts) => bbox_of(parts.iter().flatten()),
        }
    }

    fn overall_bbox(&self) -> [f64; 4] {
        if let Some(bbox) = self.file_bbox {
            return bbox;
        }
        let boxes: Vec<[f64; 4]> = self
            .records
            .iter()
            .filter(|r| matches!(r.geometry, Geometry::Parts(_)))
            .map(Self::record_bbox)
            .collect();
        if boxes.is_empty() {
            return [0.0; 4];
        }
        boxes.iter().fold(
            [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
            |acc, b| [acc[0].min(b[0]), acc[1].min(b[1]), acc[2].max(b[2]), acc[3].max(b[3])],
        )
    }

    fn encode_geometry(&self) -> (Vec<u8>, Vec<u8>) {
        let bbox = self.overall_bbox();
        let mut body = Vec::new();
        let mut index = Vec::new();

        for (i, record) in self.records.iter().enumerate() {
            let content = self.encode_content(record);
            let offset_words = (100 + body.len()) / 2;
            let content_words = content.len() / 2;

            body.extend_from_slice(&(i as u32 + 1).to_be_bytes());
            body.extend_from_slice(&(content_words as u32).to_be_bytes());
            body.extend_from_slice(&content);

            index.extend_from_slice(&(offset_words as u32).to_be_bytes());
            index.extend_from_slice(&(content_words as u32).to_be_bytes());
        }

        let mut shp = self.encode_header(100 + body.len(), bbox);
        shp.extend_from_slice(&body);
        let mut shx = self.encode_header(100 + index.len(), bbox);
        shx.extend_from_slice(&index);
        (shp, shx)
    }

    fn encode_header(&self, file_len: usize, bbox: [f64; 4]) -> Vec<u8> {
        let mut header = Vec::with_capacity(100);
        header.extend_from_slice(&9994i32.to_be_bytes());
        header.extend_from_slice(&[0u8; 20]);
        header.extend_from_slice(&((file_len / 2) as i32).to_be_bytes());
        header.extend_from_slice(&1000i32.to_le_bytes());
        header.extend_from_slice(&self.shape_type.to_le_bytes());
        for v in bbox {
            header.extend_from_slice(&v.to_le_bytes());
        }
        // Z and M ranges
        header.extend_from_slice(&[0u8; 32]);
        header
    }

    fn encode_content(&self, record: &Record) -> Vec<u8> {
        let parts = match &record.geometry {
            Geometry::Null => return 0i32.to_le_bytes().to_vec(),
            Geometry::Parts(parts) => parts,
        };

        let mut content = Vec::new();
        content.extend_from_slice(&self.shape_type.to_le_bytes());
        for v in Self::record_bbox(record) {
            content.extend_from_slice(&v.to_le_bytes());
        }
        let num_points: usize = parts.iter().map(Vec::len).sum();
        content.extend_from_slice(&(parts.len() as i32).to_le_bytes());
        content.extend_from_slice(&(num_points as i32).to_le_bytes());
        let mut start = 0i32;
        for part in parts {
            content.extend_from_slice(&start.to_le_bytes());
            start += part.len() as i32;
        }
        for &(x, y) in parts.iter().flatten() {
            content.extend_from_slice(&x.to_le_bytes());
            content.extend_from_slice(&y.to_le_bytes());
        }
        content
    }

    fn encode_dbf(&self) -> Vec<u8> {
        const FID_WIDTH: usize = 6;
        let id_width = self
            .records
            .iter()
            .map(|r| r.id.len())
            .max()
            .unwrap_or(1)
            .max(1);
        let header_len = 32 + 2 * 32 + 1;
        let record_len = 1 + FID_WIDTH + id_width;

        let mut dbf = vec![0u8; 32];
        dbf[0] = 0x03;
        dbf[4..8].copy_from_slice(&(self.records.len() as u32).to_le_bytes());
        dbf[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        dbf[10..12].copy_from_slice(&(record_len as u16).to_le_bytes());

        for (name, kind, width) in [("FID", b'N', FID_WIDTH), (self.id_field.as_str(), b'C', id_width)] {
            let mut desc = [0u8; 32];
            let name = &name.as_bytes()[..name.len().min(10)];
            desc[..name.len()].copy_from_slice(name);
            desc[11] = kind;
            desc[16] = width as u8;
            dbf.extend_from_slice(&desc);
        }
        dbf.push(0x0D);

        for (i, record) in self.records.iter().enumerate() {
            dbf.push(b' ');
            dbf.extend_from_slice(format!("{:>width$}", i, width = FID_WIDTH).as_bytes());
            dbf.extend_from_slice(format!("{:<width$}", record.id, width = id_width).as_bytes());
        }
        dbf.push(0x1A);
        dbf
    }
}

/// (min_x, min_y, max_x, max_y) of a point set.
pub fn bbox_of<'a>(points: impl IntoIterator<Item = &'a (f64, f64)>) -> [f64; 4] {
    points.into_iter().fold(
        [f64::MAX, f64::MAX, f64::MIN, f64::MIN],
        |acc, &(x, y)| [acc[0].min(x), acc[1].min(y), acc[2].max(x), acc[3].max(y)],
    )
}

/// Closed rectangular ring over a (min_x, min_y, max_x, max_y) box.
pub fn rectangle_ring(bbox: (f64, f64, f64, f64)) -> Vec<(f64, f64)> {
    let (x0, y0, x1, y1) = bbox;
    vec![(x0, y0), (x0, y1), (x1, y1), (x1, y0), (x0, y0)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_triple() {
        let dir = crate::temp_test_dir();
        let shp = ShapefileBuilder::polygon("ZCTA")
            .record("94301", vec![rectangle_ring((0.0, 0.0, 1.0, 1.0))])
            .null_record("94302")
            .write(dir.path(), "zips")
            .unwrap();

        let data = fs::read(&shp).unwrap();
        assert_eq!(&data[0..4], &9994i32.to_be_bytes());
        let words = i32::from_be_bytes([data[24], data[25], data[26], data[27]]);
        assert_eq!(words as usize * 2, data.len());
        // record 1: header + type + bbox + counts + 1 part start + 5 points
        assert_eq!(data.len(), 100 + 8 + 4 + 32 + 8 + 4 + 5 * 16 + 8 + 4);

        let shx = fs::read(dir.path().join("zips.shx")).unwrap();
        assert_eq!(shx.len(), 100 + 2 * 8);
        assert!(dir.path().join("zips.dbf").exists());
    }

    #[test]
    fn test_without_index() {
        let dir = crate::temp_test_dir();
        ShapefileBuilder::polyline("ID")
            .record("a", vec![vec![(0.0, 0.0), (1.0, 1.0)]])
            .without_index()
            .write(dir.path(), "lines")
            .unwrap();
        assert!(!dir.path().join("lines.shx").exists());
    }

    #[test]
    fn test_bbox_of() {
        let ring = rectangle_ring((-2.0, 1.0, 3.0, 4.0));
        assert_eq!(bbox_of(&ring), [-2.0, 1.0, 3.0, 4.0]);
    }
}
