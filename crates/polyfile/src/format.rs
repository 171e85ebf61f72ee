//! Byte layout of the polyfile container entries.
//!
//! A polyfile is a zip archive holding:
//! - `ids.txt`: one `"<id> <idnum>\n"` line per distinct id, sorted by id
//! - `bbox.bin`: overall bbox as 4 little-endian i32 meters
//! - `<id>_<recno>.pol`: one feature blob per admitted record
//!
//! Feature blob (all little-endian):
//!
//! | field | type |
//! |---|---|
//! | idnum | u32 |
//! | num_parts | u32 |
//! | total_points | u32 |
//! | bbox (min_x, min_y, max_x, max_y) | 4 × i32 |
//! | part_starts | u32 × num_parts |
//! | part_lengths | u32 × num_parts |
//! | coords (x, y interleaved) | i32 × 2·total_points |
//!
//! Part starts and lengths count points, not coordinate values.

use std::collections::BTreeMap;

use tile_common::MeterBounds;

use crate::error::{PolyfileError, PolyfileResult};

pub const IDS_ENTRY: &str = "ids.txt";
pub const BBOX_ENTRY: &str = "bbox.bin";
pub const FEATURE_SUFFIX: &str = ".pol";

const BLOB_HEADER_LEN: usize = 3 * 4 + 4 * 4;

/// Name of the entry holding the `recno`-th admitted record.
pub fn feature_entry_name(id: &str, recno: usize) -> String {
    format!("{}_{}{}", id, recno, FEATURE_SUFFIX)
}

/// Decoded feature blob.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureBlob {
    pub idnum: u32,
    pub bbox: MeterBounds,
    pub part_starts: Vec<u32>,
    pub part_lengths: Vec<u32>,
    pub coords: Vec<i32>,
}

impl FeatureBlob {
    /// Build a blob from parts of projected points, deriving starts/lengths.
    pub fn from_parts(idnum: u32, bbox: MeterBounds, parts: &[Vec<(i32, i32)>]) -> Self {
        let mut part_starts = Vec::with_capacity(parts.len());
        let mut part_lengths = Vec::with_capacity(parts.len());
        let mut coords = Vec::new();
        for part in parts {
            part_starts.push((coords.len() / 2) as u32);
            part_lengths.push(part.len() as u32);
            for &(x, y) in part {
                coords.push(x);
                coords.push(y);
            }
        }
        Self {
            idnum,
            bbox,
            part_starts,
            part_lengths,
            coords,
        }
    }

    pub fn total_points(&self) -> usize {
        self.coords.len() / 2
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            BLOB_HEADER_LEN + 8 * self.part_starts.len() + 4 * self.coords.len(),
        );
        out.extend_from_slice(&self.idnum.to_le_bytes());
        out.extend_from_slice(&(self.part_starts.len() as u32).to_le_bytes());
        out.extend_from_slice(&(self.total_points() as u32).to_le_bytes());
        for v in self.bbox.to_array() {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.part_starts {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.part_lengths {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in &self.coords {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Decode and validate a blob.
    pub fn decode(data: &[u8]) -> PolyfileResult<Self> {
        if data.len() < BLOB_HEADER_LEN {
            return Err(PolyfileError::Format(format!(
                "Feature blob of {} bytes is shorter than its header",
                data.len()
            )));
        }

        let words = |range: &[u8]| -> Vec<u32> {
            range
                .chunks_exact(4)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect()
        };
        let header = words(&data[..BLOB_HEADER_LEN]);
        let (idnum, num_parts, total) = (header[0], header[1] as usize, header[2] as usize);
        let bbox = MeterBounds::new(
            header[3] as i32,
            header[4] as i32,
            header[5] as i32,
            header[6] as i32,
        );

        let expected = BLOB_HEADER_LEN as u64 + 8 * num_parts as u64 + 8 * total as u64;
        if data.len() as u64 != expected {
            return Err(PolyfileError::Format(format!(
                "Feature blob {} declares {} parts and {} points ({} bytes) but has {} bytes",
                idnum,
                num_parts,
                total,
                expected,
                data.len()
            )));
        }

        let mut pos = BLOB_HEADER_LEN;
        let part_starts = words(&data[pos..pos + 4 * num_parts]);
        pos += 4 * num_parts;
        let part_lengths = words(&data[pos..pos + 4 * num_parts]);
        pos += 4 * num_parts;
        let coords: Vec<i32> = words(&data[pos..]).into_iter().map(|v| v as i32).collect();

        let mut next = 0u64;
        for (start, len) in part_starts.iter().zip(&part_lengths) {
            if *start as u64 != next {
                return Err(PolyfileError::Format(format!(
                    "Feature blob {} part starts at {} but previous part ended at {}",
                    idnum, start, next
                )));
            }
            next += *len as u64;
        }
        if next != total as u64 {
            return Err(PolyfileError::Format(format!(
                "Feature blob {} part lengths sum to {} but it has {} points",
                idnum, next, total
            )));
        }

        Ok(Self {
            idnum,
            bbox,
            part_starts,
            part_lengths,
            coords,
        })
    }
}

/// Render the id table, sorted by id.
pub fn encode_ids(ids: &BTreeMap<String, u32>) -> String {
    ids.iter()
        .map(|(id, num)| format!("{} {}\n", id, num))
        .collect()
}

/// Parse the id table into `idnum -> id`.
///
/// The id is everything before the last space, so ids may contain spaces.
pub fn decode_ids(text: &str) -> PolyfileResult<BTreeMap<u32, String>> {
    let mut by_num = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let (id, num) = line.rsplit_once(' ').ok_or_else(|| {
            PolyfileError::Format(format!("{} line {}: {:?}", IDS_ENTRY, lineno + 1, line))
        })?;
        let num: u32 = num.trim().parse().map_err(|_| {
            PolyfileError::Format(format!(
                "{} line {}: bad idnum {:?}",
                IDS_ENTRY,
                lineno + 1,
                num
            ))
        })?;
        if by_num.insert(num, id.to_string()).is_some() {
            return Err(PolyfileError::Format(format!(
                "{} assigns idnum {} twice",
                IDS_ENTRY, num
            )));
        }
    }
    Ok(by_num)
}

pub fn encode_bounds(bounds: &MeterBounds) -> Vec<u8> {
    bounds
        .to_array()
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

pub fn decode_bounds(data: &[u8]) -> PolyfileResult<MeterBounds> {
    if data.len() != 16 {
        return Err(PolyfileError::Format(format!(
            "{} has {} bytes, expected 16",
            BBOX_ENTRY,
            data.len()
        )));
    }
    let v = |i: usize| i32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    Ok(MeterBounds::new(v(0), v(4), v(8), v(12)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FeatureBlob {
        FeatureBlob::from_parts(
            7,
            MeterBounds::new(-10, -20, 30, 40),
            &[vec![(0, 0), (1, 1), (2, 0)], vec![(-10, -20), (30, 40)]],
        )
    }

    #[test]
    fn test_from_parts_counts_points() {
        let blob = sample();
        assert_eq!(blob.part_starts, vec![0, 3]);
        assert_eq!(blob.part_lengths, vec![3, 2]);
        assert_eq!(blob.total_points(), 5);
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), 28 + 2 * 8 + 5 * 8);
        assert_eq!(&bytes[0..4], &7u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &(-10i32).to_le_bytes());
        assert_eq!(FeatureBlob::decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_decode_rejects_inconsistent_blobs() {
        let bytes = sample().encode();
        assert!(FeatureBlob::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(FeatureBlob::decode(&bytes[..10]).is_err());

        // second part length bumped from 2 to 3
        let mut bad = bytes.clone();
        bad[40..44].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            FeatureBlob::decode(&bad),
            Err(PolyfileError::Format(_))
        ));
    }

    #[test]
    fn test_ids_table() {
        let mut ids = BTreeMap::new();
        ids.insert("NV".to_string(), 1);
        ids.insert("CA".to_string(), 0);
        ids.insert("New York".to_string(), 2);
        let text = encode_ids(&ids);
        assert_eq!(text, "CA 0\nNV 1\nNew York 2\n");

        let back = decode_ids(&text).unwrap();
        assert_eq!(back[&2], "New York");
        assert!(decode_ids("CA x\n").is_err());
        assert!(decode_ids("CA 0\nNV 0\n").is_err());
    }

    #[test]
    fn test_bounds_entry() {
        let b = MeterBounds::new(i32::MIN, -1, 0, i32::MAX);
        assert_eq!(decode_bounds(&encode_bounds(&b)).unwrap(), b);
        assert!(decode_bounds(&[0u8; 15]).is_err());
    }
}
