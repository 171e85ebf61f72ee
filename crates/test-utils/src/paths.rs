//! Locating optional real-world data and scratch directories.
//!
//! Real boundary files (Census state or ZCTA Shapefiles) are large and not
//! checked in; tests that want them look them up here and skip when absent.

use std::path::PathBuf;

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// `crates/{crate_name}/testdata/`
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root().join("crates").join(crate_name).join("testdata")
}

/// Search for a data file.
///
/// Checks `$TEST_DATA_DIR`, then the `testdata/` directories of the
/// shapefile-parser and polyfile crates, then `testdata/` at the workspace
/// root.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(dir) = std::env::var("TEST_DATA_DIR") {
        candidates.push(PathBuf::from(dir).join(name));
    }
    candidates.push(crate_testdata_dir("shapefile-parser").join(name));
    candidates.push(crate_testdata_dir("polyfile").join(name));
    candidates.push(workspace_root().join("testdata").join(name));

    candidates.into_iter().find(|p| p.exists())
}

/// Scratch directory removed on drop.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temporary test directory")
}

/// Scratch directory with a recognizable name prefix.
pub fn temp_test_dir_with_prefix(prefix: &str) -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temporary test directory")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_root_is_valid() {
        let root = workspace_root();
        assert!(
            root.join("Cargo.toml").exists(),
            "Workspace root should contain Cargo.toml: {:?}",
            root
        );
    }

    #[test]
    fn test_missing_file_is_none() {
        assert!(find_test_file("definitely_not_here_0xdead.shp").is_none());
    }

    #[test]
    fn test_temp_test_dir_with_prefix() {
        let dir = temp_test_dir_with_prefix("tiles_");
        assert!(dir.path().exists());
        assert!(dir.path().to_string_lossy().contains("tiles_"));
    }
}
