//! End-to-end ingestion tests against the in-memory store.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contour::{color_for, ColorDomain};
use dataset_loader::{LoadError, MemoryDataset};
use geo::Area;
use ingestion::{IngestConfig, IngestionError, Ingester, LevelSpec};
use psa_common::{BoundingBox, Event, ManifestDataset};
use storage::{DataRecord, GeometryStore, MemoryStore, RecordGeometry, VariableRecord};
use tempfile::TempDir;
use test_utils::*;

fn hourly(count: usize) -> Vec<DateTime<Utc>> {
    time::HOURLY_STEPS[..count].iter().map(|s| s.parse().unwrap()).collect()
}

fn write(dir: &TempDir, name: &str, dataset: &MemoryDataset) -> PathBuf {
    let path = dir.path().join(name);
    dataset.write_json_file(&path).unwrap();
    path
}

fn ingester(store: &Arc<MemoryStore>, event: Event, config: IngestConfig) -> Ingester {
    Ingester::new(store.clone(), event, config).unwrap()
}

async fn variable(store: &MemoryStore, name: &str) -> VariableRecord {
    store
        .variables("florence-2018")
        .await
        .unwrap()
        .into_iter()
        .find(|v| v.name() == name)
        .unwrap()
}

fn area(record: &DataRecord) -> f64 {
    match &record.geometry {
        RecordGeometry::MultiPolygon(mp) => mp.unsigned_area(),
        RecordGeometry::Point(_) => 0.0,
    }
}

fn quadrant_dataset() -> MemoryDataset {
    MemoryDataset::new(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4))
        .with_grid_variable(variables::WATER_LEVEL_MAX, to_options(&create_quadrant_grid()))
}

// ============================================================================
// Contour path
// ============================================================================

#[tokio::test]
async fn test_quadrant_grid_yields_four_colored_squares() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quadrants.json", &quadrant_dataset());
    let store = Arc::new(MemoryStore::new());

    let report = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL_MAX]))
        .await
        .unwrap();
    assert_eq!(report.polygon_count(), 4);

    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    let records = store.records(variable.id, None).await.unwrap();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);

    let domain = ColorDomain::new(1.0, 4.0);
    for record in &records {
        assert_approx_eq!(area(record), 4.0, 1e-9);
        assert_eq!(record.color, Some(color_for(record.value, domain)));
    }
    let mut colors: Vec<_> = records.iter().filter_map(|r| r.color).collect();
    colors.dedup();
    assert_eq!(colors.len(), 4);

    assert_eq!(records[0].bbox, Some(BoundingBox::new(-0.5, -0.5, 1.5, 1.5)));
    assert_eq!(records[3].bbox, Some(BoundingBox::new(1.5, 1.5, 3.5, 3.5)));

    assert_eq!(variable.color_bar.len(), 10);
    assert_eq!(variable.color_bar[0].value, 1.0);
    assert_eq!(variable.color_bar[9].value, 4.0);
}

#[tokio::test]
async fn test_zero_based_quadrants_with_four_levels() {
    let dir = TempDir::new().unwrap();
    let dataset = MemoryDataset::new(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4)).with_grid_variable(
        variables::WATER_LEVEL_MAX,
        to_options(&create_zero_based_quadrant_grid()),
    );
    let path = write(&dir, "quadrants.json", &dataset);
    let store = Arc::new(MemoryStore::new());
    let config = IngestConfig {
        levels: LevelSpec::Count(4),
        ..IngestConfig::default()
    };

    ingester(&store, test_event(), config)
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL_MAX]))
        .await
        .unwrap();

    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    let records = store.records(variable.id, None).await.unwrap();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    for record in &records {
        assert_approx_eq!(area(record), 4.0, 1e-9);
    }
    assert_eq!(records[0].color.map(|c| c.to_hex()).as_deref(), Some("#000080"));
    assert_eq!(records[3].color.map(|c| c.to_hex()).as_deref(), Some("#800000"));
}

#[tokio::test]
async fn test_contours_clipped_to_event_region() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quadrants.json", &quadrant_dataset());
    let store = Arc::new(MemoryStore::new());

    ingester(&store, test_event_in(bbox::QUADRANT_LEFT_HALF), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL_MAX]))
        .await
        .unwrap();

    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    let records = store.records(variable.id, None).await.unwrap();
    let kept: Vec<f64> = records.iter().filter(|r| area(r) > 1e-9).map(|r| r.value).collect();
    assert_eq!(kept, vec![1.0, 3.0]);
}

#[tokio::test]
async fn test_time_series_stored_per_timestamp() {
    let dir = TempDir::new().unwrap();
    let quadrants = create_quadrant_grid();
    let steps: Vec<_> = (1..=3)
        .map(|k| to_options(&quadrants.iter().map(|v| v * k as f64).collect::<Vec<_>>()))
        .collect();
    let dataset = MemoryDataset::new(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4))
        .with_times(hourly(3))
        .with_grid_series(variables::WATER_LEVEL, steps);
    let path = write(&dir, "series.json", &dataset);
    let store = Arc::new(MemoryStore::new());

    let report = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL]))
        .await
        .unwrap();
    assert_eq!(report.variables[0].steps, 3);

    let variable = variable(&store, variables::WATER_LEVEL).await;
    for (k, date) in hourly(3).into_iter().enumerate() {
        let records = store.records(variable.id, Some(date)).await.unwrap();
        let values: Vec<f64> = records.iter().map(|r| r.value).collect();
        let scale = (k + 1) as f64;
        assert_eq!(values, vec![scale, 2.0 * scale, 3.0 * scale, 4.0 * scale]);
    }
    assert!(store.records(variable.id, None).await.unwrap().is_empty());

    // The color bar spans every time step.
    assert_eq!(variable.color_bar[0].value, 1.0);
    assert_eq!(variable.color_bar[9].value, 12.0);
}

#[tokio::test]
async fn test_time_series_without_time_dimension_fails() {
    let dir = TempDir::new().unwrap();
    let dataset = MemoryDataset::new(axis(0.0, 1.0, 4), axis(0.0, 1.0, 4))
        .with_grid_variable(variables::WATER_LEVEL, to_options(&create_quadrant_grid()));
    let path = write(&dir, "flat.json", &dataset);
    let store = Arc::new(MemoryStore::new());

    let err = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestionError::Field { source: LoadError::MissingTimeDimension(_), .. }
    ));
    assert_eq!(err.variable(), Some(variables::WATER_LEVEL));
}

#[tokio::test]
async fn test_unstructured_mesh_ingested() {
    let dir = TempDir::new().unwrap();
    let (x, y, faces) = create_triangle_mesh();
    let dataset = MemoryDataset::new(x, y)
        .with_node_variable(variables::WATER_LEVEL_MAX, vec![Some(1.0); 7])
        .with_topology("element", faces);
    let path = write(&dir, "mesh.json", &dataset);
    let store = Arc::new(MemoryStore::new());

    let report = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::unstructured(&path, "element", 1, &[variables::WATER_LEVEL_MAX]))
        .await
        .unwrap();
    assert_eq!(report.polygon_count(), 1);

    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    let records = store.records(variable.id, None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, 1.0);
    assert_approx_eq!(area(&records[0]), 1.5, 1e-9);
}

#[tokio::test]
async fn test_fully_masked_field_stores_nothing() {
    let dir = TempDir::new().unwrap();
    let dataset = MemoryDataset::new(axis(0.0, 1.0, 3), axis(0.0, 1.0, 3))
        .with_grid_variable(variables::WATER_LEVEL_MAX, vec![None; 9]);
    let path = write(&dir, "masked.json", &dataset);
    let store = Arc::new(MemoryStore::new());

    let report = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL_MAX]))
        .await
        .unwrap();
    assert_eq!(report.polygon_count(), 0);
    assert_eq!(report.variables[0].empty_steps, 1);
    assert_eq!(store.record_count().await, 0);
}

// ============================================================================
// Point path
// ============================================================================

#[tokio::test]
async fn test_wind_grid_yields_eight_points() {
    let dir = TempDir::new().unwrap();
    let (direction, speed) = create_wind_grids();
    let dataset = MemoryDataset::new(axis(0.0, 1.0, 3), axis(0.0, 1.0, 3))
        .with_times(hourly(1))
        .with_grid_series(variables::WIND_DIRECTION, vec![to_options(&direction)])
        .with_grid_series(variables::WIND_SPEED, vec![to_options(&speed)]);
    let path = write(&dir, "wind.json", &dataset);
    let store = Arc::new(MemoryStore::new());

    let report = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WIND_DIRECTION]))
        .await
        .unwrap();
    assert_eq!(report.point_count(), 8);

    let variable = variable(&store, variables::WIND_DIRECTION).await;
    let records = store.records(variable.id, Some(hourly(1)[0])).await.unwrap();
    assert_eq!(records.len(), 8);
    for record in &records {
        let RecordGeometry::Point(point) = record.geometry else {
            panic!("expected a point record");
        };
        assert_ne!((point.x(), point.y()), (1.0, 1.0));
        assert_eq!(record.meta["wind_direction"].as_f64(), Some(record.value));
        assert!(record.meta["wind_speed"].as_f64().unwrap() >= 5.0);
        assert_eq!(record.geo_hash.as_ref().map(|h| h.len()), Some(12));
        assert_eq!(record.bbox, None);
    }
    assert!(!store.variables("florence-2018").await.unwrap().iter().any(|v| v.name() == variables::WIND_SPEED));
}

// ============================================================================
// Passes, merging and idempotence
// ============================================================================

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let hill = create_gaussian_hill(12, 12, 5.0);
    let dataset = MemoryDataset::new(axis(0.0, 0.5, 12), axis(0.0, 0.5, 12))
        .with_times(hourly(2))
        .with_grid_series(variables::WATER_LEVEL, vec![to_options(&hill), to_options(&hill)])
        .with_grid_variable(variables::WATER_LEVEL_MAX, to_options(&hill));
    let path = write(&dir, "hill.json", &dataset);
    let manifest = ManifestDataset::structured(&path, &[variables::WATER_LEVEL, variables::WATER_LEVEL_MAX]);
    let store = Arc::new(MemoryStore::new());
    let ingester = ingester(&store, test_event(), IngestConfig::default());

    let snapshot = |records: Vec<DataRecord>| {
        records
            .into_iter()
            .map(|r| (r.variable_id, r.date, r.value, r.color, r.geometry))
            .collect::<Vec<_>>()
    };

    ingester.ingest(&manifest).await.unwrap();
    let first = snapshot(store.all_records().await);
    assert!(!first.is_empty());

    let report = ingester.ingest(&manifest).await.unwrap();
    let second = snapshot(store.all_records().await);
    assert_eq!(first, second);
    assert_eq!(report.writes.records_deleted as usize, first.len());
    assert_eq!(store.variables("florence-2018").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_parts_merge_into_one_record() {
    let dir = TempDir::new().unwrap();
    let half = |x0: f64| {
        MemoryDataset::new(axis(x0, 1.0, 2), axis(0.0, 1.0, 4))
            .with_grid_variable(variables::WATER_LEVEL_MAX, to_options(&create_constant_grid(2, 4, 2.0)))
    };
    let left = ManifestDataset::structured(write(&dir, "left.json", &half(0.0)), &[variables::WATER_LEVEL_MAX]);
    let right = ManifestDataset::structured(write(&dir, "right.json", &half(2.0)), &[variables::WATER_LEVEL_MAX]);
    let store = Arc::new(MemoryStore::new());
    let ingester = ingester(&store, test_event(), IngestConfig::default());

    let report = ingester.ingest_parts(&[left.clone(), right]).await.unwrap();
    assert_eq!(report.writes.polygons_inserted, 1);
    assert_eq!(report.writes.polygons_merged, 1);

    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    let records = store.records(variable.id, None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_approx_eq!(area(&records[0]), 16.0, 1e-9);
    assert_eq!(records[0].bbox, Some(BoundingBox::new(-0.5, -0.5, 3.5, 3.5)));

    // A new pass over one part replaces the merged record.
    ingester.ingest(&left).await.unwrap();
    let records = store.records(variable.id, None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_approx_eq!(area(&records[0]), 8.0, 1e-9);
}

#[tokio::test]
async fn test_parts_share_levels_across_ramp() {
    let dir = TempDir::new().unwrap();
    // A west-east ramp split in two: x 0..2 holds 0, 1, 2 and x 3..5 holds 2, 3, 3.
    let part = |name: &str, x0: f64, row: &[f64]| {
        let dataset = MemoryDataset::new(axis(x0, 1.0, 3), axis(0.0, 1.0, 4)).with_grid_variable(
            variables::WATER_LEVEL_MAX,
            to_options(&create_row_repeated_grid(row, 4)),
        );
        ManifestDataset::structured(write(&dir, name, &dataset), &[variables::WATER_LEVEL_MAX])
    };
    let west = part("west.json", 0.0, &[0.0, 1.0, 2.0]);
    let east = part("east.json", 3.0, &[2.0, 3.0, 3.0]);
    let store = Arc::new(MemoryStore::new());
    let config = IngestConfig {
        levels: LevelSpec::Count(4),
        ..IngestConfig::default()
    };

    let report = ingester(&store, test_event(), config)
        .ingest_parts(&[west, east])
        .await
        .unwrap();
    assert_eq!(report.writes.polygons_inserted, 4);
    assert_eq!(report.writes.polygons_merged, 1);

    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    let records = store.records(variable.id, None).await.unwrap();
    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);

    // The value-2 columns meet at x = 2.5 and merge into one rectangle.
    assert_approx_eq!(area(&records[2]), 8.0, 1e-9);
    assert_eq!(records[2].bbox, Some(BoundingBox::new(1.5, -0.5, 3.5, 3.5)));
    assert_approx_eq!(area(&records[3]), 8.0, 1e-9);
}

// ============================================================================
// Failures and the ingest log
// ============================================================================

#[tokio::test]
async fn test_unknown_variable_strict() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quadrants.json", &quadrant_dataset());
    let store = Arc::new(MemoryStore::new());

    let err = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::UNKNOWN]))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestionError::UnknownVariable(_)));

    let log = store.ingest_log("florence-2018").await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(!log[0].success);
    assert!(log[0].exception.as_deref().unwrap_or_default().contains(variables::UNKNOWN));
}

#[tokio::test]
async fn test_unknown_variable_skipped_when_lenient() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quadrants.json", &quadrant_dataset());
    let store = Arc::new(MemoryStore::new());
    let config = IngestConfig {
        strict_variables: false,
        ..IngestConfig::default()
    };

    let report = ingester(&store, test_event(), config)
        .ingest(&ManifestDataset::structured(
            &path,
            &[variables::UNKNOWN, variables::WATER_LEVEL_MAX],
        ))
        .await
        .unwrap();
    assert_eq!(report.skipped, vec![variables::UNKNOWN.to_string()]);
    assert_eq!(report.polygon_count(), 4);

    let log = store.ingest_log("florence-2018").await.unwrap();
    assert!(log[0].success);
}

#[tokio::test]
async fn test_missing_file_logged_as_failure() {
    let store = Arc::new(MemoryStore::new());
    let manifest = ManifestDataset::structured("/nonexistent/run.json", &[variables::WATER_LEVEL_MAX]);

    let err = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&manifest)
        .await
        .unwrap_err();
    assert!(matches!(err, IngestionError::Load { source: LoadError::FileNotFound(_), .. }));

    let log = store.ingest_log("florence-2018").await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].dataset_path, "/nonexistent/run.json");
    assert!(!log[0].success);
}

#[tokio::test]
async fn test_declared_variable_missing_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "quadrants.json", &quadrant_dataset());
    let store = Arc::new(MemoryStore::new());

    let err = ingester(&store, test_event(), IngestConfig::default())
        .ingest(&ManifestDataset::structured(&path, &[variables::WATER_LEVEL_MAX, "wave_height_max"]))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestionError::Field { source: LoadError::MissingVariable(_), .. }));
    assert_eq!(err.variable(), Some("wave_height_max"));

    // Keys committed before the failure stay.
    let variable = variable(&store, variables::WATER_LEVEL_MAX).await;
    assert_eq!(store.records(variable.id, None).await.unwrap().len(), 4);
}
