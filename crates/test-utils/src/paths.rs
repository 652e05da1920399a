//! Locating sample data files that are too large to check in.

use std::path::PathBuf;

/// Environment variable naming an extra directory to search first.
pub const TEST_DATA_ENV: &str = "TEST_DATA_DIR";

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// `crates/{crate_name}/testdata/`
pub fn crate_testdata_dir(crate_name: &str) -> PathBuf {
    workspace_root().join("crates").join(crate_name).join("testdata")
}

/// Directories searched by [`find_test_file`], in order.
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(dir) = std::env::var(TEST_DATA_ENV) {
        dirs.push(PathBuf::from(dir));
    }
    dirs.push(crate_testdata_dir("dataset-loader"));
    dirs.push(workspace_root().join("testdata"));
    dirs
}

/// First existing file called `name` in [`search_dirs`].
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    search_dirs()
        .into_iter()
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}
