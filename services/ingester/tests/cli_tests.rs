//! Tests for the ingester binary in dry-run mode.

use std::path::Path;
use std::process::{Command, Output};

use dataset_loader::MemoryDataset;
use tempfile::TempDir;
use test_utils::*;

const EVENT: &str = r#"
event:
  id: florence-2018
  name: Florence
  region:
    type: Polygon
    coordinates: [[[-1, -1], [10, -1], [10, 10], [-1, 10], [-1, -1]]]
"#;

fn write_quadrants(dir: &Path) {
    MemoryDataset::new(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4))
        .with_grid_variable(variables::WATER_LEVEL_MAX, to_options(&create_quadrant_grid()))
        .write_json_file(&dir.join("quadrants.json"))
        .unwrap();
}

fn write_job(dir: &Path, datasets: &str) -> std::path::PathBuf {
    let path = dir.join("job.yaml");
    std::fs::write(&path, format!("{}datasets:\n{}", EVENT, datasets)).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ingester"))
        .args(args)
        .env_remove("DATABASE_URL")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

// ============================================================================
// Dry runs
// ============================================================================

#[test]
fn test_dry_run_prints_summary() {
    let dir = TempDir::new().unwrap();
    write_quadrants(dir.path());
    let job = write_job(
        dir.path(),
        "  - { path: quadrants.json, grid: { kind: structured }, variables: [water_level_max] }\n",
    );

    let output = run(&["--job", job.to_str().unwrap(), "--dry-run", "--log-level", "warn"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("polygons=4"), "{}", stdout);
    assert!(stdout.contains("water_level_max [m]: 1=#000080"), "{}", stdout);
}

#[test]
fn test_failed_pass_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    write_quadrants(dir.path());
    let job = write_job(
        dir.path(),
        "  - { path: quadrants.json, grid: { kind: structured }, variables: [rainfall_total] }\n  \
         - { path: quadrants.json, grid: { kind: structured }, variables: [water_level_max] }\n",
    );

    let output = run(&["--job", job.to_str().unwrap(), "--dry-run", "--log-format", "pretty"]);
    assert!(!output.status.success());

    // The failing pass does not stop the next one.
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("polygons=4"), "{}", stdout);
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 of 2 ingestion passes failed"));
}

// ============================================================================
// Argument handling
// ============================================================================

#[test]
fn test_database_url_required_without_dry_run() {
    let dir = TempDir::new().unwrap();
    write_quadrants(dir.path());
    let job = write_job(
        dir.path(),
        "  - { path: quadrants.json, grid: { kind: structured }, variables: [water_level_max] }\n",
    );

    let output = run(&["--job", job.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DATABASE_URL"));
}

#[test]
fn test_missing_job_file() {
    let output = run(&["--job", "/nonexistent/job.yaml", "--dry-run"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read job file"));
}

// ============================================================================
// NetCDF input
// ============================================================================

#[cfg(feature = "netcdf")]
#[test]
fn test_netcdf_read_natively_by_default() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("fort.63.nc"), b"not a netcdf file").unwrap();
    let job = write_job(
        dir.path(),
        "  - { path: fort.63.nc, grid: { kind: unstructured, topology: element, start_index: 1 }, variables: [water_level] }\n",
    );

    let output = run(&["--job", job.to_str().unwrap(), "--dry-run"]);
    assert!(!output.status.success());

    // The file reaches the NetCDF reader instead of being rejected by extension.
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read"), "{}", stderr);
    assert!(!stderr.contains("Unsupported dataset format"), "{}", stderr);
}
