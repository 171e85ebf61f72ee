//! End-to-end runs of the tiler binary against synthetic Shapefiles.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;
use test_utils::fixtures::{bbox, shapes};
use test_utils::{rectangle_ring, temp_test_dir, ShapefileBuilder};

const CONFIG: &str = r#"
output_dir: tiles
min_zoom: 11
max_zoom: 12
writers: 2
themes:
  - name: ZIP
    shapefile: data/zips.shp
    polyfile: data/zips.zip
    id_field: ZCTA
    id_filter: digits
  - name: BAD
    shapefile: data/bad.shp
    polyfile: data/bad.zip
    id_field: ZCTA
    id_filter: digits
"#;

fn setup() -> (TempDir, PathBuf) {
    let dir = temp_test_dir();
    let data = dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    ShapefileBuilder::polygon("ZCTA")
        .record("94301", vec![shapes::palo_alto_ring()])
        .record("9430A", vec![rectangle_ring((-121.0, 37.0, -120.9, 37.1))])
        .write(&data, "zips")
        .unwrap();
    ShapefileBuilder::polygon("ZCTA")
        .record("XXXXX", vec![shapes::palo_alto_ring()])
        .write(&data, "bad")
        .unwrap();
    let config = dir.path().join("themes.yaml");
    fs::write(&config, CONFIG).unwrap();
    (dir, config)
}

fn tiler(config: &Path, args: &[&str]) -> Output {
    let output = Command::new(env!("CARGO_BIN_EXE_tiler"))
        .arg("--config")
        .arg(config)
        .arg("--log-level")
        .arg("warn")
        .args(args)
        .env_remove("TILER_MAX_CANVAS_PIXELS")
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "tiler {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn tile_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_convert_then_render() {
    let (dir, config) = setup();
    tiler(&config, &["convert", "--theme", "ZIP"]);
    assert!(dir.path().join("data/zips.zip").exists());

    tiler(&config, &["render", "--theme", "ZIP", "--min-zoom", "12"]);
    let names = tile_names(&dir.path().join("tiles"));
    assert!((1..=4).contains(&names.len()), "{:?}", names);
    for name in &names {
        assert!(name.starts_with("tile_ZIP_12_"), "{}", name);
        let data = fs::read(dir.path().join("tiles").join(name)).unwrap();
        assert_eq!(&data[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    }
}

#[test]
fn test_convert_with_no_valid_ids_is_not_an_error() {
    let (dir, config) = setup();
    tiler(&config, &["convert", "--theme", "BAD"]);
    assert!(!dir.path().join("data/bad.zip").exists());
}

#[test]
fn test_render_without_polyfile_fails() {
    let (_dir, config) = setup();
    let output = Command::new(env!("CARGO_BIN_EXE_tiler"))
        .arg("--config")
        .arg(&config)
        .args(["render", "--theme", "ZIP"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_single_tiles_from_shapefile() {
    let (dir, config) = setup();
    let (x0, y0, x1, y1) = bbox::PALO_ALTO;
    let region = format!("{},{},{},{}", x0, y0, x1, y1);
    let out = dir.path().join("single");
    tiler(
        &config,
        &[
            "tile",
            "--theme",
            "ZIP",
            "--zoom",
            "12",
            "--bbox",
            &region,
            "--output",
            out.to_str().unwrap(),
        ],
    );

    let names = tile_names(&out);
    assert_eq!(
        names,
        vec![
            "tile_ZIP_12_658_1587.png",
            "tile_ZIP_12_658_1588.png",
            "tile_ZIP_12_659_1587.png",
            "tile_ZIP_12_659_1588.png",
        ]
    );
}

#[test]
fn test_single_tiles_outside_shapefile() {
    let (dir, config) = setup();
    let out = dir.path().join("pacific");
    tiler(
        &config,
        &[
            "tile",
            "--theme",
            "ZIP",
            "--zoom",
            "6",
            "--bbox",
            "-150,-40,-140,-30",
            "--output",
            out.to_str().unwrap(),
        ],
    );
    assert!(tile_names(&out).is_empty());
}
