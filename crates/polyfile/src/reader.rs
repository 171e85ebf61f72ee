//! Reading features back out of a polyfile.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use projection::MercatorProjector;
use tile_common::{MeterBounds, TileRange};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::error::{PolyfileError, PolyfileResult};
use crate::format::{self, FeatureBlob, BBOX_ENTRY, FEATURE_SUFFIX, IDS_ENTRY};

/// One projected feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// String id from the source attribute table
    pub name: String,
    pub idnum: u32,
    pub bbox: MeterBounds,
    /// Point index where each part starts
    pub part_starts: Vec<u32>,
    /// Point count of each part
    pub part_lengths: Vec<u32>,
    /// x, y interleaved meters
    pub coords: Vec<i32>,
}

impl Feature {
    /// Each part's points as an `[x0, y0, x1, y1, ...]` slice.
    pub fn parts(&self) -> impl Iterator<Item = &[i32]> + '_ {
        self.part_starts
            .iter()
            .zip(&self.part_lengths)
            .map(move |(&start, &len)| {
                let from = 2 * start as usize;
                &self.coords[from..from + 2 * len as usize]
            })
    }

    pub fn num_points(&self) -> usize {
        self.coords.len() / 2
    }
}

/// Read-only view of a polyfile.
///
/// The id table and overall bbox are loaded on open; feature blobs are
/// decoded lazily by [`features`](Self::features).
#[derive(Debug, Clone)]
pub struct PolyfileReader {
    path: PathBuf,
    name_by_num: Arc<BTreeMap<u32, String>>,
    bounds: MeterBounds,
    /// Archive indices of the feature entries, in write order
    entries: Arc<Vec<usize>>,
}

impl PolyfileReader {
    pub fn open(path: impl AsRef<Path>) -> PolyfileResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut archive = ZipArchive::new(BufReader::new(File::open(&path)?))?;

        let mut text = String::new();
        archive
            .by_name(IDS_ENTRY)
            .map_err(|e| missing_entry(IDS_ENTRY, e))?
            .read_to_string(&mut text)?;
        let name_by_num = format::decode_ids(&text)?;

        let mut raw = Vec::new();
        archive
            .by_name(BBOX_ENTRY)
            .map_err(|e| missing_entry(BBOX_ENTRY, e))?
            .read_to_end(&mut raw)?;
        let bounds = format::decode_bounds(&raw)?;

        let mut entries = Vec::new();
        for i in 0..archive.len() {
            if archive.by_index(i)?.name().ends_with(FEATURE_SUFFIX) {
                entries.push(i);
            }
        }

        info!(
            path = %path.display(),
            features = entries.len(),
            ids = name_by_num.len(),
            bounds = ?bounds,
            "Opened polyfile"
        );

        Ok(Self {
            path,
            name_by_num: Arc::new(name_by_num),
            bounds,
            entries: Arc::new(entries),
        })
    }

    /// Lazily decode every feature.
    ///
    /// Each call reopens the archive, so iterators are independent and can
    /// run on different threads.
    pub fn features(&self) -> PolyfileResult<FeatureIter> {
        let archive = ZipArchive::new(BufReader::new(File::open(&self.path)?))?;
        Ok(FeatureIter {
            archive,
            name_by_num: Arc::clone(&self.name_by_num),
            entries: Arc::clone(&self.entries),
            next: 0,
        })
    }

    /// Tiles covering the overall bbox at `zoom`, or `None` for an empty file.
    pub fn tile_range(&self, zoom: u32, projector: &MercatorProjector) -> Option<TileRange> {
        projector.tile_range(&self.bounds, zoom)
    }

    pub fn name_for(&self, idnum: u32) -> Option<&str> {
        self.name_by_num.get(&idnum).map(String::as_str)
    }

    /// `(idnum, id)` pairs in idnum order.
    pub fn ids(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.name_by_num.iter().map(|(num, id)| (*num, id.as_str()))
    }

    pub fn bounds(&self) -> MeterBounds {
        self.bounds
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of feature entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn missing_entry(name: &str, e: zip::result::ZipError) -> PolyfileError {
    match e {
        zip::result::ZipError::FileNotFound => {
            PolyfileError::Format(format!("polyfile has no {} entry", name))
        }
        other => PolyfileError::Zip(other),
    }
}

/// Largest buffer reserved up front for a feature entry; bigger entries grow
/// while being read.
const MAX_PREALLOC: u64 = 1 << 20;

/// Finite, lazy iterator over the features of one polyfile.
pub struct FeatureIter {
    archive: ZipArchive<BufReader<File>>,
    name_by_num: Arc<BTreeMap<u32, String>>,
    entries: Arc<Vec<usize>>,
    next: usize,
}

impl FeatureIter {
    fn read_entry(&mut self, index: usize) -> PolyfileResult<Feature> {
        let mut entry = self.archive.by_index(index)?;
        let entry_name = entry.name().to_string();
        // the declared size is untrusted until the blob decodes
        let mut raw = Vec::with_capacity(entry.size().min(MAX_PREALLOC) as usize);
        entry.read_to_end(&mut raw)?;

        let blob = FeatureBlob::decode(&raw)
            .map_err(|e| PolyfileError::Format(format!("{}: {}", entry_name, e)))?;
        let name = self.name_by_num.get(&blob.idnum).cloned().ok_or_else(|| {
            PolyfileError::Format(format!(
                "{}: idnum {} is not in {}",
                entry_name, blob.idnum, IDS_ENTRY
            ))
        })?;
        debug!(entry = %entry_name, idnum = blob.idnum, "Decoded feature");

        Ok(Feature {
            name,
            idnum: blob.idnum,
            bbox: blob.bbox,
            part_starts: blob.part_starts,
            part_lengths: blob.part_lengths,
            coords: blob.coords,
        })
    }
}

impl Iterator for FeatureIter {
    type Item = PolyfileResult<Feature>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.entries.get(self.next)?;
        self.next += 1;
        Some(self.read_entry(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.entries.len() - self.next;
        (left, Some(left))
    }
}
