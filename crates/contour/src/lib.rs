//! Filled contour generation for hazard fields.
//!
//! The pipeline for one field is:
//!
//! 1. [`levels`]: pick the iso-values that split the field into bands
//! 2. [`bands`]: trace each band's boundary rings over a structured
//!    [`grid`] or a triangular [`mesh`]
//! 3. [`rings`]: classify rings, attach holes, filter, repair and clip
//!    into one `MultiPolygon` per level
//! 4. [`colormap`]: assign display colors and build legends

pub mod bands;
pub mod colormap;
pub mod error;
pub mod grid;
pub mod levels;
pub mod mesh;
pub mod rings;

pub use bands::{contour_grid, contour_mesh, FilledBand, Ring};
pub use colormap::{color_for, legend, ColorDomain, COLOR_STEPS};
pub use error::{ContourError, ContourResult};
pub use grid::{GridSampling, StructuredGrid};
pub use levels::{ContourLevels, DEFAULT_LEVEL_COUNT, NULL_FILL_VALUE};
pub use mesh::{NullPolicy, TriMesh};
pub use rings::{assemble_band, AssemblyOptions, LevelGeometry};
