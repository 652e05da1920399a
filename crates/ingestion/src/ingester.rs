//! The `ingest(manifest)` entry point.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contour::{
    assemble_band, color_for, contour_grid, contour_mesh, legend, AssemblyOptions, ColorDomain, ContourLevels,
    ContourResult, LevelGeometry, StructuredGrid, TriMesh,
};
use dataset_loader::{open_dataset, Coordinates, DatasetReader, Field, LoadError};
use psa_common::{variable, Event, GeoKind, GridKind, ManifestDataset, TemporalKind, VariableSpec};
use storage::{GeometryStore, GeometryStoreWriter, IngestLogEntry, VariableRecord, WriteStats};
use tracing::{debug, info, instrument, warn};

use crate::config::IngestConfig;
use crate::error::{IngestionError, Result};
use crate::points::{build_points, NamedValues, NodeLocations};
use crate::stage::{Stage, StageTracker};

/// What one variable produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableReport {
    pub name: String,
    /// Timestamps processed; 1 for snapshots.
    pub steps: usize,
    /// Polygon records written or merged.
    pub polygons: usize,
    pub points: u64,
    /// Timestamps that produced no geometry.
    pub empty_steps: usize,
}

/// Outcome of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub datasets: Vec<PathBuf>,
    pub variables: Vec<VariableReport>,
    /// Unknown variables skipped in non-strict mode.
    pub skipped: Vec<String>,
    pub writes: WriteStats,
}

impl IngestReport {
    pub fn polygon_count(&self) -> usize {
        self.variables.iter().map(|v| v.polygons).sum()
    }

    pub fn point_count(&self) -> u64 {
        self.variables.iter().map(|v| v.points).sum()
    }
}

/// Spatial layout of an opened dataset.
enum Layout {
    Grid(Coordinates),
    Mesh(TriMesh),
}

impl Layout {
    fn locations(&self) -> NodeLocations<'_> {
        match self {
            Layout::Grid(coords) => NodeLocations::Grid {
                x: &coords.x,
                y: &coords.y,
            },
            Layout::Mesh(mesh) => NodeLocations::Nodes {
                x: mesh.x(),
                y: mesh.y(),
            },
        }
    }
}

struct OpenDataset<'m> {
    manifest: &'m ManifestDataset,
    reader: Box<dyn DatasetReader>,
    layout: Layout,
}

impl<'m> OpenDataset<'m> {
    fn open(manifest: &'m ManifestDataset) -> Result<Self> {
        let load_error = |source: LoadError| IngestionError::Load {
            path: manifest.path.clone(),
            source,
        };
        let reader = open_dataset(manifest).map_err(load_error)?;
        let coords = reader.coordinates().map_err(load_error)?;

        let layout = match &manifest.grid {
            GridKind::Structured => Layout::Grid(coords),
            GridKind::Unstructured { topology, start_index } => {
                let faces = reader.connectivity(topology).map_err(load_error)?;
                let mesh = TriMesh::from_connectivity(coords.x, coords.y, &faces, *start_index).map_err(|source| {
                    IngestionError::Contour {
                        variable: topology.clone(),
                        date: None,
                        source,
                    }
                })?;
                debug!(
                    topology = %topology,
                    nodes = mesh.node_count(),
                    triangles = mesh.triangles().len(),
                    "Built mesh"
                );
                Layout::Mesh(mesh)
            }
        };

        Ok(Self {
            manifest,
            reader,
            layout,
        })
    }

    fn declares(&self, name: &str) -> bool {
        self.manifest.variables.iter().any(|v| v == name)
    }

    /// `(time index, timestamp)` pairs to process for a variable.
    fn steps(&self, spec: &VariableSpec) -> std::result::Result<Vec<(Option<usize>, Option<DateTime<Utc>>)>, LoadError> {
        match spec.temporal_kind {
            TemporalKind::Snapshot => Ok(vec![(None, None)]),
            TemporalKind::TimeSeries => {
                if !self.reader.has_time_dimension(spec.name)? {
                    return Err(LoadError::MissingTimeDimension(spec.name.to_string()));
                }
                Ok(self
                    .reader
                    .times()?
                    .into_iter()
                    .enumerate()
                    .map(|(index, date)| (Some(index), Some(date)))
                    .collect())
            }
        }
    }
}

/// One part's slice of a timestamp.
struct PartStep<'p, 'm> {
    part: &'p OpenDataset<'m>,
    time_index: Option<usize>,
}

fn merge_ranges(a: Option<(f64, f64)>, b: Option<(f64, f64)>) -> Option<(f64, f64)> {
    match (a, b) {
        (Some((a_min, a_max)), Some((b_min, b_max))) => Some((a_min.min(b_min), a_max.max(b_max))),
        (a, b) => a.or(b),
    }
}

/// Ingests datasets for one event into a [`GeometryStore`].
pub struct Ingester {
    store: Arc<dyn GeometryStore>,
    event: Event,
    config: IngestConfig,
}

impl Ingester {
    pub fn new(store: Arc<dyn GeometryStore>, event: Event, config: IngestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, event, config })
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn GeometryStore> {
        &self.store
    }

    /// Ingest one dataset as its own pass.
    ///
    /// Every `(variable, timestamp)` the dataset covers is rebuilt from
    /// scratch. The outcome is written to the ingest log either way.
    pub async fn ingest(&self, manifest: &ManifestDataset) -> Result<IngestReport> {
        self.ingest_parts(std::slice::from_ref(manifest)).await
    }

    /// Ingest several datasets that split one run (e.g. by region) as a
    /// single pass. Polygons with the same variable, timestamp and value
    /// across parts are merged into one record.
    #[instrument(skip(self, manifests), fields(event = %self.event.id, parts = manifests.len()))]
    pub async fn ingest_parts(&self, manifests: &[ManifestDataset]) -> Result<IngestReport> {
        let writer = GeometryStoreWriter::new(self.store.clone()).with_point_batch_size(self.config.point_batch_size);
        let result = self.run(manifests, &writer).await;

        for manifest in manifests {
            let path = manifest.path.display().to_string();
            let entry = match &result {
                Ok(_) => IngestLogEntry::success(&self.event.id, path),
                Err(e) => IngestLogEntry::failure(&self.event.id, path, e.to_string()),
            };
            if let Err(e) = self.store.log_ingestion(entry).await {
                warn!(error = %e, "Failed to write ingest log entry");
            }
        }

        match result {
            Ok(mut report) => {
                report.writes = writer.stats().await;
                info!(
                    variables = report.variables.len(),
                    polygons = report.polygon_count(),
                    points = report.point_count(),
                    skipped = report.skipped.len(),
                    "Ingestion complete"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    variable = e.variable().unwrap_or("-"),
                    date = ?e.date(),
                    "Ingestion failed"
                );
                Err(e)
            }
        }
    }

    async fn run(&self, manifests: &[ManifestDataset], writer: &GeometryStoreWriter) -> Result<IngestReport> {
        let mut report = IngestReport {
            datasets: manifests.iter().map(|m| m.path.clone()).collect(),
            ..Default::default()
        };
        let parts = manifests.iter().map(OpenDataset::open).collect::<Result<Vec<_>>>()?;

        let mut names: Vec<&str> = Vec::new();
        for manifest in manifests {
            for name in &manifest.variables {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }

        for name in names {
            let spec = match variable::resolve(name) {
                Ok(spec) => spec,
                Err(e) if self.config.strict_variables => return Err(e.into()),
                Err(e) => {
                    warn!(variable = name, error = %e, "Skipping unknown variable");
                    report.skipped.push(name.to_string());
                    continue;
                }
            };
            let variable_report = self.ingest_variable(writer, spec, &parts).await?;
            report.variables.push(variable_report);
        }
        Ok(report)
    }

    #[instrument(skip(self, writer, spec, parts), fields(variable = spec.name))]
    async fn ingest_variable(
        &self,
        writer: &GeometryStoreWriter,
        spec: &'static VariableSpec,
        parts: &[OpenDataset<'_>],
    ) -> Result<VariableReport> {
        let record = self.store.get_or_create_variable(&self.event.id, spec).await?;
        let parts: Vec<&OpenDataset<'_>> = parts.iter().filter(|p| p.declares(spec.name)).collect();
        let field_error = |date, source| IngestionError::Field {
            variable: spec.name.to_string(),
            date,
            source,
        };

        let mut range = None;
        for part in &parts {
            if !part.reader.has_variable(spec.name) {
                return Err(field_error(None, LoadError::MissingVariable(spec.name.to_string())));
            }
            range = merge_ranges(range, part.reader.value_range(spec.name).map_err(|e| field_error(None, e))?);
        }
        let domain = ColorDomain::from_range(range);

        info!(
            kind = spec.geo_kind.as_str(),
            temporal = spec.temporal_kind.as_str(),
            min = domain.min,
            max = domain.max,
            "Processing variable"
        );

        let mut report = VariableReport {
            name: spec.name.to_string(),
            ..Default::default()
        };
        let mut steps: BTreeMap<Option<DateTime<Utc>>, Vec<PartStep<'_, '_>>> = BTreeMap::new();
        for &part in &parts {
            for (time_index, date) in part.steps(spec).map_err(|e| field_error(None, e))? {
                steps.entry(date).or_default().push(PartStep { part, time_index });
            }
        }
        for (date, members) in steps {
            self.ingest_date(writer, &record, domain, date, &members, &mut report)
                .await?;
        }

        self.store.update_color_bar(record.id, &legend(domain)).await?;
        Ok(report)
    }

    /// Process one timestamp across every part that covers it.
    ///
    /// All fields are loaded first so polygon variables share one level set
    /// built from their combined range; equal bands from different parts then
    /// carry equal values and merge in the writer.
    async fn ingest_date(
        &self,
        writer: &GeometryStoreWriter,
        record: &VariableRecord,
        domain: ColorDomain,
        date: Option<DateTime<Utc>>,
        members: &[PartStep<'_, '_>],
        report: &mut VariableReport,
    ) -> Result<()> {
        let name = record.name();
        let mut loaded = Vec::with_capacity(members.len());
        let mut range = None;
        for member in members {
            let mut stage = StageTracker::new(name, date);
            stage.advance(Stage::Loading)?;
            let field = member
                .part
                .reader
                .field(name, member.time_index)
                .map_err(|source| IngestionError::Field {
                    variable: name.to_string(),
                    date,
                    source,
                })?;
            range = merge_ranges(range, field.domain());
            loaded.push((stage, member, field));
        }
        report.steps += 1;

        let levels = match record.spec.geo_kind {
            GeoKind::Polygon => Some(self.config.levels.levels_for(range).map_err(|source| {
                IngestionError::Contour {
                    variable: name.to_string(),
                    date,
                    source,
                }
            })?),
            GeoKind::Point { .. } => None,
        };

        let mut written = 0;
        for (stage, member, field) in loaded {
            written += self
                .ingest_step(writer, record, stage, member, &field, levels.as_ref(), domain, report)
                .await?;
        }
        if written == 0 {
            warn!(variable = name, ?date, "Timestamp produced no features");
            report.empty_steps += 1;
        }
        Ok(())
    }

    /// Contour or point one loaded field. Returns the number of features written.
    #[allow(clippy::too_many_arguments)]
    async fn ingest_step(
        &self,
        writer: &GeometryStoreWriter,
        record: &VariableRecord,
        mut stage: StageTracker<'_>,
        member: &PartStep<'_, '_>,
        field: &Field,
        levels: Option<&ContourLevels>,
        domain: ColorDomain,
        report: &mut VariableReport,
    ) -> Result<u64> {
        let name = record.name();
        let date = stage.date();
        let part = member.part;
        let field_error = |variable: &str, source| IngestionError::Field {
            variable: variable.to_string(),
            date,
            source,
        };
        let storage_error = |source| IngestionError::Storage {
            variable: name.to_string(),
            date,
            source,
        };

        let written = match (record.spec.geo_kind, levels) {
            (GeoKind::Polygon, Some(levels)) => {
                stage.advance(Stage::Contouring)?;
                let geometries = self
                    .contour_field(&part.layout, field, levels)
                    .map_err(|source| IngestionError::Contour {
                        variable: name.to_string(),
                        date,
                        source,
                    })?;

                stage.advance(Stage::Coloring)?;
                let colored: Vec<_> = geometries
                    .into_iter()
                    .map(|g| {
                        let color = color_for(g.level, domain);
                        (g, color)
                    })
                    .collect();

                writer.reset(record, date).await.map_err(storage_error)?;
                let count = colored.len();
                for (geometry, color) in colored {
                    writer
                        .upsert_polygon(record, date, geometry.level, geometry.geometry, color)
                        .await
                        .map_err(storage_error)?;
                }
                report.polygons += count;
                count as u64
            }
            (GeoKind::Polygon, None) => {
                return Err(IngestionError::InvalidConfig(format!(
                    "no contour levels for polygon variable {}",
                    name
                )))
            }
            (GeoKind::Point { companion }, _) => {
                stage.advance(Stage::Pointing)?;
                let other = part
                    .reader
                    .field(companion, member.time_index)
                    .map_err(|e| field_error(companion, e))?;
                let samples = build_points(
                    NamedValues {
                        name,
                        values: &field.values,
                    },
                    NamedValues {
                        name: companion,
                        values: &other.values,
                    },
                    part.layout.locations(),
                    &self.event.region,
                )
                .map_err(|e| field_error(name, e))?;

                // Point features carry no color of their own.
                stage.advance(Stage::Coloring)?;

                writer.reset(record, date).await.map_err(storage_error)?;
                let count = writer
                    .write_points(record, date, samples)
                    .await
                    .map_err(storage_error)?;
                report.points += count;
                count
            }
        };

        stage.advance(Stage::Persisted)?;
        Ok(written)
    }

    /// Contour one field and assemble every non-empty level.
    fn contour_field(
        &self,
        layout: &Layout,
        field: &Field,
        levels: &ContourLevels,
    ) -> ContourResult<Vec<LevelGeometry>> {
        let bands = match layout {
            Layout::Grid(coords) => {
                let grid = StructuredGrid::new(&coords.x, &coords.y, &field.values)?;
                contour_grid(&grid, levels, self.config.grid_sampling)
            }
            Layout::Mesh(mesh) => contour_mesh(mesh, &field.values, levels)?,
        };

        let options = AssemblyOptions {
            region: Some(&self.event.region),
            min_area_m2: self.config.min_polygon_area_m2,
            ..Default::default()
        };
        let mut geometries = Vec::new();
        for band in &bands {
            if band.is_empty() {
                continue;
            }
            match assemble_band(band, &options) {
                Some(geometry) => geometries.push(geometry),
                None => warn!(
                    variable = %field.name,
                    level = band.level,
                    "Contour level produced no polygons"
                ),
            }
        }
        debug!(
            variable = %field.name,
            levels = levels.len(),
            kept = geometries.len(),
            "Contoured field"
        );
        Ok(geometries)
    }
}
