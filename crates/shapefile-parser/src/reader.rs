//! Sequential and keyed reading of a Shapefile triple.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tile_common::BoundingBox;
use tracing::{debug, info};

use crate::dbf;
use crate::error::{ShapefileError, ShapefileResult};
use crate::id_filter::IdValidator;
use crate::index::ShapeIndex;
use crate::record::{split_parts, RecordHeader, ShapeRecord, ShapeType};
use crate::selection::{EmptySelection, Selection};

const FILE_CODE: i32 = 9994;
const MAIN_HEADER_LEN: u64 = 100;
const RECORD_HEADER_LEN: u64 = 8;
/// shape type + bbox
const RECORD_PREFIX_LEN: u64 = 4 + 32;

/// Path of a companion file, trying the lowercase then uppercase extension.
fn companion(shp: &Path, ext: &str) -> PathBuf {
    let lower = shp.with_extension(ext);
    if lower.exists() {
        return lower;
    }
    let upper = shp.with_extension(ext.to_ascii_uppercase());
    if upper.exists() {
        upper
    } else {
        lower
    }
}

fn le_f64(b: &[u8]) -> f64 {
    f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn le_bbox(b: &[u8]) -> BoundingBox {
    BoundingBox::new(le_f64(&b[0..8]), le_f64(&b[8..16]), le_f64(&b[16..24]), le_f64(&b[24..32]))
}

/// Reader over one `.shp` file with its `.dbf` id column and optional `.shx`.
///
/// Records whose id fails the validator, and records whose bbox misses the
/// active select box, are skipped without decoding their points.
pub struct ShapefileReader {
    path: PathBuf,
    file: BufReader<File>,
    file_len: u64,
    shape_type: ShapeType,
    overall_bbox: BoundingBox,
    select_bbox: Option<BoundingBox>,
    /// DBF id column; entry `i` belongs to record number `i + 1`
    ids: Vec<String>,
    admitted: Vec<bool>,
    valid_count: usize,
    index: Option<ShapeIndex>,
    last_read: Option<(String, u32)>,
    failed: bool,
}

impl std::fmt::Debug for ShapefileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShapefileReader")
            .field("path", &self.path)
            .field("shape_type", &self.shape_type)
            .field("overall_bbox", &self.overall_bbox)
            .field("select_bbox", &self.select_bbox)
            .field("records", &self.valid_count)
            .field("indexed", &self.index.is_some())
            .finish()
    }
}

impl ShapefileReader {
    /// Open a Shapefile.
    ///
    /// `path` may name the `.shp` file or the common base name. The `.dbf`
    /// must carry a column named `id_field`. The `.shx` is optional and only
    /// needed for keyed seeks.
    ///
    /// # Returns
    ///
    /// `Selection::Empty` when no record has an admitted id, or when
    /// `select_bbox` does not intersect the file's overall bbox.
    pub fn open(
        path: impl AsRef<Path>,
        select_bbox: Option<BoundingBox>,
        id_field: &str,
        id_validator: IdValidator,
    ) -> ShapefileResult<Selection<ShapefileReader>> {
        let path = path.as_ref();
        let shp_path = match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("shp") => path.to_path_buf(),
            _ => path.with_extension("shp"),
        };

        let mut file = BufReader::new(File::open(&shp_path)?);
        let file_len = file.get_ref().metadata()?.len();
        let mut header = [0u8; MAIN_HEADER_LEN as usize];
        file.read_exact(&mut header).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => ShapefileError::Format(format!(
                "{} shorter than its 100 byte header",
                shp_path.display()
            )),
            _ => ShapefileError::Io(e),
        })?;

        let file_code = i32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if file_code != FILE_CODE {
            return Err(ShapefileError::Format(format!(
                "Bad file code {} in {}",
                file_code,
                shp_path.display()
            )));
        }
        let shape_type =
            ShapeType::from_code(i32::from_le_bytes([header[32], header[33], header[34], header[35]]))?;
        let overall_bbox = le_bbox(&header[36..68]);

        let ids = dbf::read_column(&companion(&shp_path, "dbf"), id_field)?;
        let admitted: Vec<bool> = ids.iter().map(|id| id_validator(id)).collect();
        let valid_count = admitted.iter().filter(|&&ok| ok).count();

        let shx_path = companion(&shp_path, "shx");
        let index = if shx_path.exists() {
            let data = std::fs::read(&shx_path)?;
            Some(ShapeIndex::parse(&shx_path, &data, &ids, &admitted)?)
        } else {
            debug!(path = %shx_path.display(), "No shape index, keyed seeks disabled");
            None
        };

        info!(
            path = %shp_path.display(),
            shape_type = ?shape_type,
            records = ids.len(),
            admitted = valid_count,
            bbox = %overall_bbox,
            "Opened shapefile"
        );

        let mut reader = ShapefileReader {
            path: shp_path,
            file,
            file_len,
            shape_type,
            overall_bbox,
            select_bbox: None,
            ids,
            admitted,
            valid_count,
            index,
            last_read: None,
            failed: false,
        };

        if valid_count == 0 {
            return Ok(Selection::Empty(EmptySelection::NoValidIds));
        }
        Ok(reader.set_select_bbox(select_bbox).map(|()| reader))
    }

    /// Replace the select box.
    ///
    /// The box is installed even when it misses the file, in which case
    /// sequential reads yield nothing.
    pub fn set_select_bbox(&mut self, select_bbox: Option<BoundingBox>) -> Selection<()> {
        self.select_bbox = select_bbox;
        match select_bbox {
            Some(select) if self.overall_bbox.all_out(&select) => {
                Selection::Empty(EmptySelection::OutsideSelectBox {
                    file_bbox: self.overall_bbox,
                    select_bbox: select,
                })
            }
            _ => Selection::Selected(()),
        }
    }

    /// Restart sequential reading at the first record.
    pub fn rewind(&mut self) -> ShapefileResult<()> {
        self.file.seek(SeekFrom::Start(MAIN_HEADER_LEN))?;
        self.failed = false;
        Ok(())
    }

    /// Position the stream at the first record carrying `id`.
    pub fn seek_to_id(&mut self, id: &str) -> ShapefileResult<()> {
        let index = self.require_index()?;
        match index.offset_of_id(id) {
            Some(offset) => {
                self.file.seek(SeekFrom::Start(offset))?;
                self.failed = false;
                Ok(())
            }
            None if self.ids.iter().any(|known| known == id) => Err(ShapefileError::InvalidKey {
                key: id.to_string(),
                reason: "id is rejected by the validator".to_string(),
            }),
            None => Err(ShapefileError::NotInIndex { key: id.to_string() }),
        }
    }

    /// Position the stream at a one-based record number.
    pub fn seek_to_record_number(&mut self, record_number: u32) -> ShapefileResult<()> {
        let total = self.ids.len();
        let index = self.require_index()?;
        if record_number == 0 || record_number as usize > total {
            return Err(ShapefileError::InvalidKey {
                key: record_number.to_string(),
                reason: format!("record numbers run from 1 to {}", total),
            });
        }
        match index.offset_of_record(record_number) {
            Some(offset) => {
                self.file.seek(SeekFrom::Start(offset))?;
                self.failed = false;
                Ok(())
            }
            None => Err(ShapefileError::NotInIndex {
                key: record_number.to_string(),
            }),
        }
    }

    /// All admitted record numbers carrying `id`.
    pub fn recnos_by_id(&self, id: &str) -> ShapefileResult<Vec<u32>> {
        let index = self.require_index()?;
        index
            .record_numbers(id)
            .map(<[u32]>::to_vec)
            .ok_or_else(|| ShapefileError::NotInIndex { key: id.to_string() })
    }

    /// Id stored in the attribute table for a one-based record number.
    pub fn id_of(&self, record_number: u32) -> Option<&str> {
        let i = (record_number as usize).checked_sub(1)?;
        self.ids.get(i).map(String::as_str)
    }

    /// Next admissible record, or `None` at end of file.
    pub fn next_record(&mut self) -> ShapefileResult<Option<ShapeRecord>> {
        let Some((header, shape_type, end)) = self.next_admissible()? else {
            return Ok(None);
        };

        let mut counts = [0u8; 8];
        self.file.read_exact(&mut counts)?;
        let num_parts = i32::from_le_bytes([counts[0], counts[1], counts[2], counts[3]]);
        let num_points = i32::from_le_bytes([counts[4], counts[5], counts[6], counts[7]]);
        if num_parts < 0 || num_points < 0 {
            return Err(ShapefileError::Format(format!(
                "Record {} has negative counts ({} parts, {} points)",
                header.record_number, num_parts, num_points
            )));
        }
        let (num_parts, num_points) = (num_parts as u64, num_points as u64);
        let body_start = self.file.stream_position()?;
        if body_start + 4 * num_parts + 16 * num_points > end {
            return Err(ShapefileError::Format(format!(
                "Record {} declares {} parts and {} points, more than its content length",
                header.record_number, num_parts, num_points
            )));
        }

        let mut raw = vec![0u8; (4 * num_parts) as usize];
        self.file.read_exact(&mut raw)?;
        let starts: Vec<i32> = raw
            .chunks_exact(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let mut raw = vec![0u8; (16 * num_points) as usize];
        self.file.read_exact(&mut raw)?;
        let points: Vec<(f64, f64)> = raw
            .chunks_exact(16)
            .map(|b| (le_f64(&b[0..8]), le_f64(&b[8..16])))
            .collect();

        let parts = split_parts(&starts, points)?;
        self.file.seek(SeekFrom::Start(end))?;

        debug!(
            id = %header.id,
            record_number = header.record_number,
            parts = parts.len(),
            points = num_points,
            "Read shape record"
        );

        Ok(Some(ShapeRecord {
            id: header.id,
            record_number: header.record_number,
            shape_type,
            bbox: header.bbox,
            parts,
        }))
    }

    /// Next admissible record's id, number and bbox, leaving its points unread.
    pub fn read_record_header_only(&mut self) -> ShapefileResult<Option<RecordHeader>> {
        match self.next_admissible()? {
            Some((header, _, end)) => {
                self.file.seek(SeekFrom::Start(end))?;
                Ok(Some(header))
            }
            None => Ok(None),
        }
    }

    /// Advance to the next record passing the id and bbox filters.
    ///
    /// Leaves the stream just past the record's bbox and returns the offset
    /// where the next record starts.
    fn next_admissible(&mut self) -> ShapefileResult<Option<(RecordHeader, ShapeType, u64)>> {
        loop {
            let pos = self.file.stream_position()?;
            if pos + RECORD_HEADER_LEN > self.file_len {
                return Ok(None);
            }

            let mut rec_header = [0u8; RECORD_HEADER_LEN as usize];
            self.file.read_exact(&mut rec_header)?;
            let record_number =
                u32::from_be_bytes([rec_header[0], rec_header[1], rec_header[2], rec_header[3]]);
            let content_words =
                u32::from_be_bytes([rec_header[4], rec_header[5], rec_header[6], rec_header[7]]);
            let end = pos + RECORD_HEADER_LEN + 2 * content_words as u64;
            if end > self.file_len {
                return Err(ShapefileError::Format(format!(
                    "Record {} at offset {} runs past end of file",
                    record_number, pos
                )));
            }

            let id = match self.id_of(record_number) {
                Some(id) => id.to_string(),
                None => {
                    return Err(ShapefileError::Format(format!(
                        "Record number {} has no attribute row ({} rows)",
                        record_number,
                        self.ids.len()
                    )))
                }
            };
            if !self.admitted[record_number as usize - 1] {
                self.file.seek(SeekFrom::Start(end))?;
                continue;
            }

            if pos + RECORD_HEADER_LEN + 4 > end {
                return Err(ShapefileError::Format(format!(
                    "Record {} has no shape type",
                    record_number
                )));
            }
            let mut code = [0u8; 4];
            self.file.read_exact(&mut code)?;
            let code = i32::from_le_bytes(code);
            if code == ShapeType::NULL_CODE {
                debug!(record_number, "Skipping null shape");
                self.file.seek(SeekFrom::Start(end))?;
                continue;
            }
            let shape_type = ShapeType::from_code(code)?;
            if pos + RECORD_HEADER_LEN + RECORD_PREFIX_LEN > end {
                return Err(ShapefileError::Format(format!(
                    "Record {} too short for its bbox",
                    record_number
                )));
            }

            let mut raw = [0u8; 32];
            self.file.read_exact(&mut raw)?;
            let bbox = le_bbox(&raw);
            if let Some(select) = &self.select_bbox {
                if bbox.all_out(select) {
                    self.file.seek(SeekFrom::Start(end))?;
                    continue;
                }
            }

            self.last_read = Some((id.clone(), record_number));
            return Ok(Some((
                RecordHeader {
                    id,
                    record_number,
                    bbox,
                },
                shape_type,
                end,
            )));
        }
    }

    fn require_index(&self) -> ShapefileResult<&ShapeIndex> {
        self.index
            .as_ref()
            .ok_or_else(|| ShapefileError::MissingIndex(self.path.with_extension("shx")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shape_type(&self) -> ShapeType {
        self.shape_type
    }

    pub fn overall_bbox(&self) -> BoundingBox {
        self.overall_bbox
    }

    pub fn select_bbox(&self) -> Option<BoundingBox> {
        self.select_bbox
    }

    /// Number of records whose id passes the validator.
    pub fn len(&self) -> usize {
        self.valid_count
    }

    pub fn is_empty(&self) -> bool {
        self.valid_count == 0
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn last_read_id(&self) -> Option<&str> {
        self.last_read.as_ref().map(|(id, _)| id.as_str())
    }

    pub fn last_read_record_number(&self) -> Option<u32> {
        self.last_read.as_ref().map(|&(_, recno)| recno)
    }
}

impl Iterator for ShapefileReader {
    type Item = ShapefileResult<ShapeRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_record() {
            Ok(record) => record.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
