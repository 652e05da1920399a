//! Hazard dataset ingestion.
//!
//! Turns one simulation output file (or several parts of one run) into
//! stored geometry for an [`Event`](psa_common::Event):
//!
//! - polygon variables are contoured into one colored `MultiPolygon` per
//!   level, clipped to the event region
//! - point variables become one feature per node, carrying a companion
//!   value in their metadata
//! - every variable gets a color bar covering its full value range
//!
//! Each `(variable, timestamp)` key is rebuilt from scratch on every pass,
//! so re-running an ingestion is the retry strategy.

pub mod config;
pub mod error;
mod ingester;
pub mod points;
pub mod stage;

pub use config::{IngestConfig, LevelSpec, DEFAULT_MIN_POLYGON_AREA_M2};
pub use error::{IngestionError, Result};
pub use ingester::{IngestReport, Ingester, VariableReport};
pub use stage::{Stage, StageTracker};
