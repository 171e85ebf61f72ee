//! Record offset index (`.shx`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{ShapefileError, ShapefileResult};

const SHX_HEADER_LEN: usize = 100;
const ENTRY_LEN: usize = 8;

/// Byte offsets of admitted records, by id and by record number.
#[derive(Debug, Clone)]
pub struct ShapeIndex {
    path: PathBuf,
    by_record_number: HashMap<u32, u64>,
    recnos_by_id: HashMap<String, Vec<u32>>,
}

impl ShapeIndex {
    /// Build the index from `.shx` bytes.
    ///
    /// `ids[i]` and `admitted[i]` describe record number `i + 1`; only
    /// admitted records are indexed.
    pub fn parse(
        path: &Path,
        data: &[u8],
        ids: &[String],
        admitted: &[bool],
    ) -> ShapefileResult<Self> {
        if data.len() < SHX_HEADER_LEN {
            return Err(ShapefileError::Format(format!(
                "{} shorter than its 100 byte header",
                path.display()
            )));
        }

        let entries = &data[SHX_HEADER_LEN..];
        let count = entries.len() / ENTRY_LEN;
        if count != ids.len() {
            tracing::warn!(
                index_entries = count,
                dbf_rows = ids.len(),
                "Shape index and attribute table disagree on record count"
            );
        }

        let mut by_record_number = HashMap::new();
        let mut recnos_by_id: HashMap<String, Vec<u32>> = HashMap::new();
        for (i, entry) in entries.chunks_exact(ENTRY_LEN).enumerate().take(ids.len()) {
            if !admitted[i] {
                continue;
            }
            let offset_words = u32::from_be_bytes([entry[0], entry[1], entry[2], entry[3]]);
            let recno = i as u32 + 1;
            by_record_number.insert(recno, offset_words as u64 * 2);
            recnos_by_id.entry(ids[i].clone()).or_default().push(recno);
        }

        Ok(Self {
            path: path.to_path_buf(),
            by_record_number,
            recnos_by_id,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset_of_record(&self, recno: u32) -> Option<u64> {
        self.by_record_number.get(&recno).copied()
    }

    /// Record numbers carrying `id`, ascending.
    pub fn record_numbers(&self, id: &str) -> Option<&[u32]> {
        self.recnos_by_id.get(id).map(Vec::as_slice)
    }

    /// Offset of the first record carrying `id`.
    pub fn offset_of_id(&self, id: &str) -> Option<u64> {
        self.record_numbers(id)
            .and_then(|recnos| recnos.first())
            .and_then(|&r| self.offset_of_record(r))
    }

    pub fn len(&self) -> usize {
        self.by_record_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_record_number.is_empty()
    }
}
