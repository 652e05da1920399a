//! Storage for derived hazard geometry.
//!
//! Provides:
//! - the [`GeometryStore`] interface and its records
//! - [`MemoryStore`] for tests and dry runs
//! - [`PgStore`] on PostgreSQL + PostGIS
//! - [`GeometryStoreWriter`], the pass-scoped writer the ingester uses

pub mod error;
pub mod geohash;
pub mod memory;
pub mod models;
pub mod postgis;
pub mod store;
pub mod writer;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use models::{DataRecord, IngestLogEntry, NewRecord, PersistedRecord, RecordGeometry, RecordKey, VariableRecord};
pub use postgis::PgStore;
pub use store::{GeometryStore, MergeFn, UpsertOutcome};
pub use writer::{merge_geometries, GeometryStoreWriter, PointSample, WriteStats, DEFAULT_POINT_BATCH_SIZE};
