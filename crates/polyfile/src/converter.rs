//! Shapefile to polyfile conversion.

use std::collections::BTreeMap;
use std::collections::hash_map::{Entry, HashMap};
use std::fs::{self, File};
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use projection::MercatorProjector;
use shapefile_parser::{Selection, ShapeRecord, ShapefileReader, ShapefileResult};
use tile_common::MeterBounds;
use tracing::{debug, error, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::ConverterConfig;
use crate::error::{PolyfileError, PolyfileResult};
use crate::format::{self, FeatureBlob, BBOX_ENTRY, IDS_ENTRY};

/// What a conversion produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertSummary {
    /// Feature blobs written (one per admitted, non-null record)
    pub features: usize,
    pub distinct_ids: usize,
    /// Overall bbox in meters; `MeterBounds::EMPTY` when nothing was written
    pub bounds: MeterBounds,
}

/// Converts one theme's Shapefile into a polyfile.
pub struct Converter;

impl Converter {
    /// Convert `config.in_file` into `config.out_file`.
    ///
    /// The archive is written beside the destination and renamed into place
    /// once complete, so readers never see a half-written polyfile. An empty
    /// selection (no admitted ids) writes nothing.
    pub fn convert(
        config: &ConverterConfig,
        projector: &MercatorProjector,
    ) -> PolyfileResult<Selection<ConvertSummary>> {
        let reader = match ShapefileReader::open(
            &config.in_file,
            None,
            &config.id_field,
            config.is_valid_id.clone(),
        )? {
            Selection::Selected(reader) => reader,
            Selection::Empty(reason) => {
                warn!(input = %config.in_file.display(), %reason, "Nothing to convert");
                return Ok(Selection::Empty(reason));
            }
        };

        let partial = partial_path(&config.out_file);
        let result = File::create(&partial)
            .map_err(PolyfileError::from)
            .and_then(|file| convert_records(reader, BufWriter::new(file), projector));

        let (summary, mut writer) = match result {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_file(&partial);
                return Err(e);
            }
        };
        writer.flush()?;
        drop(writer);
        fs::rename(&partial, &config.out_file)?;

        info!(
            input = %config.in_file.display(),
            output = %config.out_file.display(),
            features = summary.features,
            distinct_ids = summary.distinct_ids,
            bounds = ?summary.bounds,
            "Converted shapefile"
        );
        Ok(Selection::Selected(summary))
    }
}

fn partial_path(out_file: &Path) -> PathBuf {
    let mut name = out_file.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Truncate a projected value toward zero, refusing anything an i32 cannot hold.
fn truncate_meters(v: f64) -> Option<i32> {
    // 2^31 itself does not fit; anything below it truncates into range
    if v.is_finite() && v >= i32::MIN as f64 && v < 2_147_483_648.0 {
        Some(v as i32)
    } else {
        None
    }
}

/// Project a lon/lat point to whole meters.
pub fn project_point(projector: &MercatorProjector, lon: f64, lat: f64) -> PolyfileResult<(i32, i32)> {
    let (x, y) = projector.lat_lon_to_meters(lat, lon);
    match (truncate_meters(x), truncate_meters(y)) {
        (Some(ix), Some(iy)) => Ok((ix, iy)),
        _ => {
            error!(lat, lon, x, y, "Projected coordinate does not fit in i32");
            Err(PolyfileError::OutOfRange { lat, lon, x, y })
        }
    }
}

/// Write a polyfile from any stream of shape records.
///
/// Records are numbered in arrival order for their entry names; ids get
/// dense idnums in first-seen order. Returns the summary and the
/// underlying writer after the archive is finished.
pub fn convert_records<I, W>(
    records: I,
    writer: W,
    projector: &MercatorProjector,
) -> PolyfileResult<(ConvertSummary, W)>
where
    I: IntoIterator<Item = ShapefileResult<ShapeRecord>>,
    W: Write + Seek,
{
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);
    let mut idnums: HashMap<String, u32> = HashMap::new();
    let mut bounds = MeterBounds::EMPTY;
    let mut features = 0usize;

    for record in records {
        let record = record?;
        let next_num = idnums.len() as u32;
        let idnum = match idnums.entry(record.id.clone()) {
            Entry::Occupied(e) => *e.get(),
            Entry::Vacant(e) => *e.insert(next_num),
        };

        let blob = project_record(&record, idnum, projector)?;
        bounds = bounds.merge(&blob.bbox);

        let name = format::feature_entry_name(&record.id, features);
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&blob.encode())?;
        debug!(
            entry = %name,
            idnum,
            parts = blob.part_starts.len(),
            points = blob.total_points(),
            "Wrote feature"
        );
        features += 1;
    }

    let ids: BTreeMap<String, u32> = idnums.into_iter().collect();
    zip.start_file(IDS_ENTRY, options)?;
    zip.write_all(format::encode_ids(&ids).as_bytes())?;
    zip.start_file(BBOX_ENTRY, options)?;
    zip.write_all(&format::encode_bounds(&bounds))?;
    let writer = zip.finish()?;

    Ok((
        ConvertSummary {
            features,
            distinct_ids: ids.len(),
            bounds,
        },
        writer,
    ))
}

/// Project a record's points and corner-projected bbox.
pub fn project_record(
    record: &ShapeRecord,
    idnum: u32,
    projector: &MercatorProjector,
) -> PolyfileResult<FeatureBlob> {
    let b = record.bbox;
    let (min_x, min_y) = project_point(projector, b.min_x, b.min_y)?;
    let (max_x, max_y) = project_point(projector, b.max_x, b.max_y)?;
    let bbox = MeterBounds::new(min_x, min_y, max_x, max_y);

    let parts = record
        .parts
        .iter()
        .map(|part| {
            part.iter()
                .map(|&(lon, lat)| project_point(projector, lon, lat))
                .collect::<PolyfileResult<Vec<_>>>()
        })
        .collect::<PolyfileResult<Vec<_>>>()?;

    Ok(FeatureBlob::from_parts(idnum, bbox, &parts))
}
