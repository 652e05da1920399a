//! Common types shared across the post-storm assessment (PSA) crates.
//!
//! Covers the variable registry, dataset manifests, hazard events, colors,
//! bounding boxes and the GeoJSON geometry codec used at the storage edge.

pub mod bbox;
pub mod color;
pub mod error;
pub mod event;
pub mod geojson;
pub mod manifest;
pub mod variable;

pub use bbox::BoundingBox;
pub use color::{Color, ColorStop};
pub use error::{ManifestError, RegistryError};
pub use event::Event;
pub use geojson::{GeoJsonError, GeoJsonGeometry};
pub use manifest::{GridKind, ManifestDataset};
pub use variable::{GeoKind, TemporalKind, Unit, VariableSpec};
