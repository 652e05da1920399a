//! The persisted-store interface the ingester writes through.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use psa_common::{ColorStop, VariableSpec};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::models::{DataRecord, IngestLogEntry, NewRecord, RecordGeometry, RecordKey, VariableRecord};

/// Combines an existing record's geometry with an incoming one.
pub type MergeFn = fn(&RecordKey, RecordGeometry, RecordGeometry) -> StorageResult<RecordGeometry>;

/// What [`GeometryStore::upsert_polygon`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
}

/// Storage backend for variables, records and the ingest log.
///
/// Implementations make `upsert_polygon` atomic per record key: the read of
/// an existing record, the merge and the write-back happen under one lock or
/// transaction.
#[async_trait]
pub trait GeometryStore: Send + Sync {
    /// Variable for `(event, spec.name)`, created if missing.
    async fn get_or_create_variable(&self, event_id: &str, spec: &'static VariableSpec)
        -> StorageResult<VariableRecord>;

    async fn update_color_bar(&self, variable_id: Uuid, color_bar: &[ColorStop]) -> StorageResult<()>;

    async fn variables(&self, event_id: &str) -> StorageResult<Vec<VariableRecord>>;

    /// Delete a variable and, with it, all its records.
    async fn delete_variable(&self, variable_id: Uuid) -> StorageResult<()>;

    /// Delete all records of a variable at `date` (`None` matches snapshot
    /// records only). Returns the number removed.
    async fn delete_records(&self, variable_id: Uuid, date: Option<DateTime<Utc>>) -> StorageResult<u64>;

    /// Insert a polygon record, or merge it into the record with the same key.
    async fn upsert_polygon(&self, record: NewRecord, merge: MergeFn) -> StorageResult<UpsertOutcome>;

    /// Bulk insert of point records.
    async fn insert_points(&self, records: Vec<NewRecord>) -> StorageResult<u64>;

    /// Records of a variable at exactly `date`, ordered by value.
    async fn records(&self, variable_id: Uuid, date: Option<DateTime<Utc>>) -> StorageResult<Vec<DataRecord>>;

    /// Records of a variable whose geometry covers `(lon, lat)`, ordered by
    /// date then value.
    async fn records_covering(&self, variable_id: Uuid, lon: f64, lat: f64) -> StorageResult<Vec<DataRecord>>;

    async fn log_ingestion(&self, entry: IngestLogEntry) -> StorageResult<()>;

    async fn ingest_log(&self, event_id: &str) -> StorageResult<Vec<IngestLogEntry>>;
}
