//! In-process store for tests and dry runs.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use psa_common::{ColorStop, VariableSpec};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{DataRecord, IngestLogEntry, NewRecord, VariableRecord};
use crate::store::{GeometryStore, MergeFn, UpsertOutcome};

#[derive(Default)]
struct Inner {
    variables: BTreeMap<Uuid, VariableRecord>,
    records: Vec<DataRecord>,
    log: Vec<IngestLogEntry>,
}

/// A [`GeometryStore`] held in memory behind a single lock.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all variables.
    pub async fn record_count(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Every stored record, in insertion order.
    pub async fn all_records(&self) -> Vec<DataRecord> {
        self.inner.lock().await.records.clone()
    }
}

fn sort_records(records: &mut [DataRecord]) {
    records.sort_by(|a, b| a.date.cmp(&b.date).then(a.value.total_cmp(&b.value)));
}

#[async_trait]
impl GeometryStore for MemoryStore {
    async fn get_or_create_variable(
        &self,
        event_id: &str,
        spec: &'static VariableSpec,
    ) -> StorageResult<VariableRecord> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .variables
            .values()
            .find(|v| v.event_id == event_id && v.spec.name == spec.name)
        {
            return Ok(existing.clone());
        }

        let variable = VariableRecord::new(event_id, spec);
        debug!(event = event_id, variable = spec.name, id = %variable.id, "Created variable");
        inner.variables.insert(variable.id, variable.clone());
        Ok(variable)
    }

    async fn update_color_bar(&self, variable_id: Uuid, color_bar: &[ColorStop]) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        let variable = inner
            .variables
            .get_mut(&variable_id)
            .ok_or_else(|| StorageError::NotFound(format!("variable {}", variable_id)))?;
        variable.color_bar = color_bar.to_vec();
        Ok(())
    }

    async fn variables(&self, event_id: &str) -> StorageResult<Vec<VariableRecord>> {
        let inner = self.inner.lock().await;
        let mut variables: Vec<VariableRecord> = inner
            .variables
            .values()
            .filter(|v| v.event_id == event_id)
            .cloned()
            .collect();
        variables.sort_by_key(|v| v.spec.name);
        Ok(variables)
    }

    async fn delete_variable(&self, variable_id: Uuid) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.variables.remove(&variable_id).is_none() {
            return Err(StorageError::NotFound(format!("variable {}", variable_id)));
        }
        inner.records.retain(|r| r.variable_id != variable_id);
        Ok(())
    }

    async fn delete_records(&self, variable_id: Uuid, date: Option<DateTime<Utc>>) -> StorageResult<u64> {
        let mut inner = self.inner.lock().await;
        let before = inner.records.len();
        inner
            .records
            .retain(|r| !(r.variable_id == variable_id && r.date == date));
        Ok((before - inner.records.len()) as u64)
    }

    async fn upsert_polygon(&self, record: NewRecord, merge: MergeFn) -> StorageResult<UpsertOutcome> {
        let key = record.key();
        let mut inner = self.inner.lock().await;

        if let Some(existing) = inner.records.iter_mut().find(|r| r.key() == key) {
            let merged = merge(&key, existing.geometry.clone(), record.geometry)?;
            existing.bbox = merged.bbox();
            existing.geometry = merged;
            existing.meta.extend(record.meta);
            if record.color.is_some() {
                existing.color = record.color;
            }
            return Ok(UpsertOutcome::Merged);
        }

        inner.records.push(record.into_record());
        Ok(UpsertOutcome::Inserted)
    }

    async fn insert_points(&self, records: Vec<NewRecord>) -> StorageResult<u64> {
        let count = records.len() as u64;
        let mut inner = self.inner.lock().await;
        inner.records.extend(records.into_iter().map(NewRecord::into_record));
        Ok(count)
    }

    async fn records(&self, variable_id: Uuid, date: Option<DateTime<Utc>>) -> StorageResult<Vec<DataRecord>> {
        let inner = self.inner.lock().await;
        let mut records: Vec<DataRecord> = inner
            .records
            .iter()
            .filter(|r| r.variable_id == variable_id && r.date == date)
            .cloned()
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    async fn records_covering(&self, variable_id: Uuid, lon: f64, lat: f64) -> StorageResult<Vec<DataRecord>> {
        let inner = self.inner.lock().await;
        let mut records: Vec<DataRecord> = inner
            .records
            .iter()
            .filter(|r| r.variable_id == variable_id && r.covers(lon, lat))
            .cloned()
            .collect();
        sort_records(&mut records);
        Ok(records)
    }

    async fn log_ingestion(&self, entry: IngestLogEntry) -> StorageResult<()> {
        self.inner.lock().await.log.push(entry);
        Ok(())
    }

    async fn ingest_log(&self, event_id: &str) -> StorageResult<Vec<IngestLogEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.log.iter().filter(|e| e.event_id == event_id).cloned().collect())
    }
}
