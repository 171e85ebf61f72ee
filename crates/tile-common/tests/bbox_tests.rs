//! Tests for BoundingBox and TileRange operations.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tile_common::bbox::{BboxParseError, BoundingBox, MeterBounds};
use tile_common::tile::{TileCoord, TileRange};

// ============================================================================
// Parsing
// ============================================================================

#[test]
fn test_parse_bbox_integer() {
    let bbox = BoundingBox::parse("0,0,100,100").unwrap();
    assert_eq!(bbox, BoundingBox::new(0.0, 0.0, 100.0, 100.0));
}

#[test]
fn test_parse_bbox_with_spaces() {
    let bbox = BoundingBox::parse("-122.1552, 37.4162, -122.0780, 37.5001").unwrap();
    assert!((bbox.min_x - (-122.1552)).abs() < 1e-9);
    assert!((bbox.max_y - 37.5001).abs() < 1e-9);
}

#[test]
fn test_parse_bbox_invalid_format() {
    assert!(matches!(
        BoundingBox::parse("0,0,100"),
        Err(BboxParseError::InvalidFormat(_))
    ));
    assert!(matches!(
        BoundingBox::parse(""),
        Err(BboxParseError::InvalidFormat(_))
    ));
}

#[test]
fn test_parse_bbox_invalid_number() {
    assert!(matches!(
        BoundingBox::parse("abc,0,100,100"),
        Err(BboxParseError::InvalidNumber(_))
    ));
}

// ============================================================================
// all_out
// ============================================================================

fn intervals_overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> bool {
    a0.max(b0) <= a1.min(b1)
}

fn random_box(rng: &mut StdRng) -> BoundingBox {
    let x0: f64 = rng.gen_range(-180.0..180.0);
    let y0: f64 = rng.gen_range(-90.0..90.0);
    let w: f64 = rng.gen_range(0.0..60.0);
    let h: f64 = rng.gen_range(0.0..40.0);
    BoundingBox::new(x0, y0, x0 + w, y0 + h)
}

#[test]
fn test_all_out_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..10_000 {
        let a = random_box(&mut rng);
        let b = random_box(&mut rng);
        let overlap = intervals_overlap(a.min_x, a.max_x, b.min_x, b.max_x)
            && intervals_overlap(a.min_y, a.max_y, b.min_y, b.max_y);
        assert_eq!(a.all_out(&b), !overlap, "a={:?} b={:?}", a, b);
        assert_eq!(a.all_out(&b), b.all_out(&a));
    }
}

#[test]
fn test_all_out_contained() {
    let outer = BoundingBox::new(-130.0, 20.0, -60.0, 55.0);
    let inner = BoundingBox::new(-122.2, 37.4, -122.0, 37.5);
    assert!(!outer.all_out(&inner));
    assert!(!inner.all_out(&outer));
}

#[test]
fn test_all_out_degenerate_point() {
    let point = BoundingBox::new(5.0, 5.0, 5.0, 5.0);
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(!point.all_out(&bbox));
    assert!(point.all_out(&BoundingBox::new(6.0, 6.0, 7.0, 7.0)));
}

// ============================================================================
// MeterBounds
// ============================================================================

#[test]
fn test_meter_bounds_reduction() {
    let boxes = [
        MeterBounds::new(10, 20, 30, 40),
        MeterBounds::new(-5, 25, 15, 50),
        MeterBounds::new(0, -100, 1, 0),
    ];
    let total = boxes.iter().fold(MeterBounds::EMPTY, |acc, b| acc.merge(b));
    assert_eq!(total, MeterBounds::new(-5, -100, 30, 50));
    assert!(!total.is_empty());
}

// ============================================================================
// TileCoord / TileRange
// ============================================================================

#[test]
fn test_flip_y_is_involutive() {
    let mut rng = StdRng::seed_from_u64(42);
    for z in 0..30u32 {
        let n = 1u64 << z;
        for _ in 0..50 {
            let x = rng.gen_range(0..n) as u32;
            let y = rng.gen_range(0..n) as u32;
            let tile = TileCoord::new(z, x, y);
            assert_eq!(tile.flip_y().flip_y(), tile);
        }
    }
}

#[test]
fn test_range_dimensions() {
    let range = TileRange::new(12, 658, 2507, 659, 2508);
    assert_eq!(range.width(), 2);
    assert_eq!(range.height(), 2);
    assert_eq!(range.tile_count(), 4);
    assert_eq!(range.pixel_area(256), 512 * 512);
    assert!(range.contains(659, 2507));
    assert!(!range.contains(660, 2507));
}

#[test]
fn test_pixel_area_saturates() {
    let world = TileRange::new(24, 0, 0, (1 << 24) - 1, (1 << 24) - 1);
    assert_eq!(world.pixel_area(256), u64::MAX);

    let deepest = TileRange::new(31, 0, 0, (1 << 31) - 1, (1 << 31) - 1);
    assert_eq!(deepest.pixel_area(256), u64::MAX);

    let wide = TileRange::new(20, 0, 0, (1 << 20) - 1, 0);
    assert_eq!(wide.pixel_area(256), (256u64 << 20) * 256);
}
