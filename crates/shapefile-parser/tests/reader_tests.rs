//! Integration tests for ShapefileReader against synthetic triples.

use shapefile_parser::{
    all_ids, digits_only, excluding, EmptySelection, Selection, ShapeType, ShapefileError,
    ShapefileReader,
};
use tempfile::TempDir;
use test_utils::fixtures::{bbox, shapes};
use test_utils::{rectangle_ring, temp_test_dir, ShapefileBuilder};
use tile_common::BoundingBox;

fn states_fixture() -> (TempDir, std::path::PathBuf) {
    let dir = temp_test_dir();
    let shp = ShapefileBuilder::polygon("STUSPS")
        .record("CA", shapes::two_islands())
        .record("HI", vec![rectangle_ring((-160.0, 19.0, -155.0, 22.0))])
        .null_record("GU")
        .record("NV", vec![rectangle_ring((-120.0, 35.0, -114.0, 42.0))])
        .record("CA", vec![rectangle_ring((-124.0, 40.0, -123.0, 41.0))])
        .write(dir.path(), "states")
        .unwrap();
    (dir, shp)
}

fn open_selected(
    shp: &std::path::Path,
    select: Option<BoundingBox>,
    validator: shapefile_parser::IdValidator,
) -> ShapefileReader {
    match ShapefileReader::open(shp, select, "STUSPS", validator).unwrap() {
        Selection::Selected(reader) => reader,
        Selection::Empty(reason) => panic!("unexpected empty selection: {}", reason),
    }
}

// ============================================================================
// Opening
// ============================================================================

#[test]
fn test_open_reports_header() {
    let (_dir, shp) = states_fixture();
    let reader = open_selected(&shp, None, all_ids());
    assert_eq!(reader.shape_type(), ShapeType::Polygon);
    assert_eq!(reader.len(), 5);
    assert!(reader.has_index());
    let b = reader.overall_bbox();
    assert_eq!((b.min_x, b.min_y, b.max_x, b.max_y), (-160.0, 19.0, -114.0, 42.0));
}

#[test]
fn test_open_by_base_name() {
    let (dir, _shp) = states_fixture();
    let reader = open_selected(&dir.path().join("states"), None, all_ids());
    assert_eq!(reader.len(), 5);
}

#[test]
fn test_unsupported_shape_type() {
    let dir = temp_test_dir();
    let shp = ShapefileBuilder::with_shape_type(1, "ID")
        .record("a", vec![vec![(0.0, 0.0)]])
        .write(dir.path(), "points")
        .unwrap();
    let err = ShapefileReader::open(&shp, None, "ID", all_ids()).unwrap_err();
    assert!(matches!(err, ShapefileError::Format(_)), "{}", err);
}

#[test]
fn test_missing_id_column() {
    let (_dir, shp) = states_fixture();
    let err = ShapefileReader::open(&shp, None, "ZCTA", all_ids()).unwrap_err();
    assert!(matches!(err, ShapefileError::Format(_)), "{}", err);
}

#[test]
fn test_no_valid_ids_is_empty_selection() {
    let (_dir, shp) = states_fixture();
    let selection = ShapefileReader::open(&shp, None, "STUSPS", digits_only()).unwrap();
    assert!(matches!(
        selection,
        Selection::Empty(EmptySelection::NoValidIds)
    ));
}

#[test]
fn test_select_box_outside_file_is_empty_selection() {
    let (_dir, shp) = states_fixture();
    let (x0, y0, x1, y1) = bbox::SOUTH_PACIFIC;
    let select = BoundingBox::new(x0, y0, x1, y1);
    let selection = ShapefileReader::open(&shp, Some(select), "STUSPS", all_ids()).unwrap();
    match selection {
        Selection::Empty(EmptySelection::OutsideSelectBox { select_bbox, .. }) => {
            assert_eq!(select_bbox, select)
        }
        other => panic!("expected OutsideSelectBox, got {:?}", other.is_empty()),
    }
}

// ============================================================================
// Sequential reading
// ============================================================================

#[test]
fn test_sequential_read_skips_null_and_filtered() {
    let (_dir, shp) = states_fixture();
    let mut reader = open_selected(&shp, None, excluding(["HI"]));
    assert_eq!(reader.len(), 4);

    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.id, "CA");
    assert_eq!(first.record_number, 1);
    assert_eq!(first.parts.len(), 2);
    assert_eq!(first.parts[0].len(), 5);
    assert_eq!(first.num_points(), 10);
    assert_eq!(first.parts[1][0], (-118.6, 33.3));

    // HI excluded, GU is a null shape
    let second = reader.next_record().unwrap().unwrap();
    assert_eq!((second.id.as_str(), second.record_number), ("NV", 4));
    assert_eq!(reader.last_read_id(), Some("NV"));
    assert_eq!(reader.last_read_record_number(), Some(4));

    let third = reader.next_record().unwrap().unwrap();
    assert_eq!(third.record_number, 5);
    assert!(reader.next_record().unwrap().is_none());
    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn test_select_box_filters_records() {
    let (_dir, shp) = states_fixture();
    let select = BoundingBox::new(-121.0, 36.0, -119.0, 38.0);
    let reader = open_selected(&shp, Some(select), all_ids());
    let ids: Vec<String> = reader.map(|r| r.unwrap().id).collect();
    assert_eq!(ids, vec!["NV"]);
}

#[test]
fn test_rewind_and_header_only() {
    let (_dir, shp) = states_fixture();
    let mut reader = open_selected(&shp, None, all_ids());
    let headers: Vec<_> = std::iter::from_fn(|| reader.read_record_header_only().unwrap())
        .map(|h| h.record_number)
        .collect();
    assert_eq!(headers, vec![1, 2, 4, 5]);

    reader.rewind().unwrap();
    let record = reader.next_record().unwrap().unwrap();
    assert_eq!(record.record_number, 1);
    assert_eq!(record.header().id, "CA");
}

#[test]
fn test_set_select_bbox_after_open() {
    let (_dir, shp) = states_fixture();
    let mut reader = open_selected(&shp, None, all_ids());
    let (x0, y0, x1, y1) = bbox::SOUTH_PACIFIC;
    assert!(reader
        .set_select_bbox(Some(BoundingBox::new(x0, y0, x1, y1)))
        .is_empty());
    reader.rewind().unwrap();
    assert!(reader.next_record().unwrap().is_none());

    assert!(!reader.set_select_bbox(None).is_empty());
    reader.rewind().unwrap();
    assert_eq!(reader.count(), 4);
}

#[test]
fn test_polyline_parts() {
    let dir = temp_test_dir();
    let shp = ShapefileBuilder::polyline("ID")
        .record("road", vec![vec![(0.0, 0.0), (1.0, 1.0), (2.0, 0.5)], vec![(5.0, 5.0), (6.0, 6.0)]])
        .write(dir.path(), "roads")
        .unwrap();
    let mut reader = match ShapefileReader::open(&shp, None, "ID", all_ids()).unwrap() {
        Selection::Selected(r) => r,
        Selection::Empty(reason) => panic!("{}", reason),
    };
    let record = reader.next_record().unwrap().unwrap();
    assert_eq!(record.shape_type, ShapeType::Polyline);
    let lengths: Vec<usize> = record.parts.iter().map(Vec::len).collect();
    assert_eq!(lengths, vec![3, 2]);
}

// ============================================================================
// Keyed access
// ============================================================================

#[test]
fn test_seek_to_id_and_record_number() {
    let (_dir, shp) = states_fixture();
    let mut reader = open_selected(&shp, None, excluding(["HI"]));

    reader.seek_to_id("NV").unwrap();
    assert_eq!(reader.next_record().unwrap().unwrap().id, "NV");

    reader.seek_to_record_number(5).unwrap();
    let record = reader.next_record().unwrap().unwrap();
    assert_eq!((record.id.as_str(), record.record_number), ("CA", 5));

    assert_eq!(reader.recnos_by_id("CA").unwrap(), vec![1, 5]);
}

#[test]
fn test_seek_errors() {
    let (_dir, shp) = states_fixture();
    let mut reader = open_selected(&shp, None, excluding(["HI"]));

    assert!(matches!(
        reader.seek_to_id("HI"),
        Err(ShapefileError::InvalidKey { .. })
    ));
    assert!(matches!(
        reader.seek_to_id("TX"),
        Err(ShapefileError::NotInIndex { .. })
    ));
    assert!(matches!(
        reader.seek_to_record_number(0),
        Err(ShapefileError::InvalidKey { .. })
    ));
    assert!(matches!(
        reader.seek_to_record_number(99),
        Err(ShapefileError::InvalidKey { .. })
    ));
    // record 2 is HI, rejected by the validator so never indexed
    assert!(matches!(
        reader.seek_to_record_number(2),
        Err(ShapefileError::NotInIndex { .. })
    ));
}

#[test]
fn test_seek_without_index() {
    let dir = temp_test_dir();
    let shp = ShapefileBuilder::polygon("STUSPS")
        .record("CA", vec![rectangle_ring((-124.0, 32.0, -114.0, 42.0))])
        .without_index()
        .write(dir.path(), "noindex")
        .unwrap();
    let mut reader = open_selected(&shp, None, all_ids());
    assert!(!reader.has_index());
    assert!(matches!(
        reader.seek_to_id("CA"),
        Err(ShapefileError::MissingIndex(_))
    ));
    // sequential reading still works
    assert_eq!(reader.next_record().unwrap().unwrap().id, "CA");
}

// ============================================================================
// Real data (skipped unless TEST_DATA_DIR provides it)
// ============================================================================

#[test]
fn test_census_states() {
    let shp = test_utils::require_test_file!("fe_2007_us_state.shp");
    let reader = open_selected(&shp, None, excluding(["HI", "AK", "VI", "GU", "PR", "AS", "MP"]));
    let mut count = 0;
    for record in reader {
        let record = record.unwrap();
        assert!(!record.parts.is_empty());
        count += 1;
    }
    assert!(count >= 49, "expected lower 48 plus DC, got {}", count);
}
