//! Pass-scoped writer on top of a [`GeometryStore`].
//!
//! One writer lives for one ingestion pass. It guarantees that:
//!
//! - the first write to a `(variable, date)` key in the pass deletes the
//!   records stored for that key by earlier passes
//! - polygon records with the same `(variable, date, value)` are merged by
//!   union instead of duplicated
//! - no two tasks interleave a delete and a write on the same key
//!
//! Point records go through the store's bulk path in fixed-size batches.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use geo::{BooleanOps, MultiPolygon};
use psa_common::Color;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{NewRecord, RecordGeometry, RecordKey, VariableRecord};
use crate::store::{GeometryStore, UpsertOutcome};

/// Default number of point rows per bulk insert.
pub const DEFAULT_POINT_BATCH_SIZE: usize = 10_000;

type DateKey = (Uuid, Option<DateTime<Utc>>);

/// One point sample ready to store.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSample {
    pub lon: f64,
    pub lat: f64,
    pub value: f64,
    pub meta: Map<String, Value>,
}

/// Counts of what a writer did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub keys_cleared: usize,
    pub records_deleted: u64,
    pub polygons_inserted: usize,
    pub polygons_merged: usize,
    pub points_inserted: u64,
}

/// Union two polygon geometries. Any other combination is a conflict.
pub fn merge_geometries(
    key: &RecordKey,
    existing: RecordGeometry,
    incoming: RecordGeometry,
) -> StorageResult<RecordGeometry> {
    match (existing, incoming) {
        (RecordGeometry::MultiPolygon(a), RecordGeometry::MultiPolygon(b)) => {
            Ok(RecordGeometry::MultiPolygon(union(&a, &b)))
        }
        (existing, incoming) => Err(StorageError::MergeConflict {
            variable_id: key.variable_id,
            date: key.date,
            value: key.value,
            reason: format!("cannot union {} with {}", existing.kind(), incoming.kind()),
        }),
    }
}

fn union(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if a.0.is_empty() {
        return b.clone();
    }
    if b.0.is_empty() {
        return a.clone();
    }
    a.union(b)
}

pub struct GeometryStoreWriter {
    store: Arc<dyn GeometryStore>,
    point_batch_size: usize,
    locks: Mutex<HashMap<DateKey, Arc<Mutex<()>>>>,
    cleared: Mutex<HashSet<DateKey>>,
    stats: Mutex<WriteStats>,
}

impl GeometryStoreWriter {
    pub fn new(store: Arc<dyn GeometryStore>) -> Self {
        Self {
            store,
            point_batch_size: DEFAULT_POINT_BATCH_SIZE,
            locks: Mutex::new(HashMap::new()),
            cleared: Mutex::new(HashSet::new()),
            stats: Mutex::new(WriteStats::default()),
        }
    }

    pub fn with_point_batch_size(mut self, size: usize) -> Self {
        self.point_batch_size = size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn GeometryStore> {
        &self.store
    }

    pub async fn stats(&self) -> WriteStats {
        *self.stats.lock().await
    }

    async fn lock_key(&self, key: DateKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Delete stored records for the key unless this pass already did.
    /// Caller holds the key lock.
    async fn clear_once(&self, key: DateKey) -> StorageResult<()> {
        if !self.cleared.lock().await.insert(key) {
            return Ok(());
        }
        let deleted = self.store.delete_records(key.0, key.1).await?;
        if deleted > 0 {
            info!(variable_id = %key.0, date = ?key.1, deleted, "Removed records from a previous ingestion");
        }
        let mut stats = self.stats.lock().await;
        stats.keys_cleared += 1;
        stats.records_deleted += deleted;
        Ok(())
    }

    /// Start writing a key: clears it on first use in this pass, so a key
    /// that ends up with no geometry is still emptied.
    pub async fn reset(&self, variable: &VariableRecord, date: Option<DateTime<Utc>>) -> StorageResult<()> {
        let key = (variable.id, date);
        let _guard = self.lock_key(key).await;
        self.clear_once(key).await
    }

    /// Insert or merge one contour polygon record.
    pub async fn upsert_polygon(
        &self,
        variable: &VariableRecord,
        date: Option<DateTime<Utc>>,
        value: f64,
        geometry: MultiPolygon<f64>,
        color: Color,
    ) -> StorageResult<UpsertOutcome> {
        let key = (variable.id, date);
        let _guard = self.lock_key(key).await;
        self.clear_once(key).await?;

        let record = NewRecord::polygon(variable.id, date, value, geometry, color);
        let outcome = self.store.upsert_polygon(record, merge_geometries).await?;
        debug!(variable = variable.name(), ?date, value, ?outcome, "Stored contour polygon");

        let mut stats = self.stats.lock().await;
        match outcome {
            UpsertOutcome::Inserted => stats.polygons_inserted += 1,
            UpsertOutcome::Merged => stats.polygons_merged += 1,
        }
        Ok(outcome)
    }

    /// Bulk insert point samples in batches. Returns the rows written.
    pub async fn write_points(
        &self,
        variable: &VariableRecord,
        date: Option<DateTime<Utc>>,
        samples: Vec<PointSample>,
    ) -> StorageResult<u64> {
        let key = (variable.id, date);
        let _guard = self.lock_key(key).await;
        self.clear_once(key).await?;

        let mut written = 0;
        let mut records = samples
            .into_iter()
            .map(|s| NewRecord::point(variable.id, date, s.lon, s.lat, s.value, s.meta))
            .peekable();
        while records.peek().is_some() {
            let batch: Vec<NewRecord> = records.by_ref().take(self.point_batch_size).collect();
            let rows = self.store.insert_points(batch).await?;
            debug!(variable = variable.name(), ?date, rows, "Wrote point batch");
            written += rows;
        }

        self.stats.lock().await.points_inserted += written;
        Ok(written)
    }
}
