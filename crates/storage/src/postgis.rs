//! PostgreSQL + PostGIS backed store.
//!
//! Geometry goes in and out as GeoJSON (`ST_GeomFromGeoJSON` /
//! `ST_AsGeoJSON`). Polygon records keep a planar envelope in `bbox` for the
//! first phase of spatial lookups. Point records are bulk loaded with
//! `COPY ... FROM STDIN` and carry a geohash instead of a bbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use psa_common::variable::resolve;
use psa_common::{BoundingBox, Color, ColorStop, GeoJsonGeometry, VariableSpec};
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolCopyExt, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StorageError, StorageResult};
use crate::models::{DataRecord, IngestLogEntry, NewRecord, RecordGeometry, VariableRecord};
use crate::store::{GeometryStore, MergeFn, UpsertOutcome};

/// Columns written by the point COPY, in order.
const COPY_POINTS_SQL: &str =
    "COPY psa_data (id, variable_id, date, geo, geo_hash, value, meta, color) FROM STDIN WITH (FORMAT text)";

const SELECT_RECORD_COLUMNS: &str = "SELECT id, variable_id, date, ST_AsGeoJSON(geo) AS geo_json, geo_hash, \
     ST_XMin(bbox) AS bbox_min_x, ST_YMin(bbox) AS bbox_min_y, ST_XMax(bbox) AS bbox_max_x, ST_YMax(bbox) AS bbox_max_y, \
     value, meta, color FROM psa_data";

/// Database-backed [`GeometryStore`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store connection from database URL.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Database(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> StorageResult<()> {
        // Split SQL statements and execute them individually
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| StorageError::Database(format!("Migration failed: {}", e)))?;
            }
        }
        info!("Database schema is up to date");
        Ok(())
    }

    async fn insert_record(tx: &mut Transaction<'_, Postgres>, record: DataRecord) -> StorageResult<()> {
        let geo_json = record.geometry.to_geojson().to_json_string()?;
        let bbox = record.bbox;
        sqlx::query(
            r#"
            INSERT INTO psa_data (id, variable_id, date, geo, geo_hash, bbox, value, meta, color)
            VALUES (
                $1, $2, $3,
                ST_SetSRID(ST_GeomFromGeoJSON($4), 4326),
                $5,
                CASE WHEN $6::float8 IS NULL THEN NULL ELSE ST_MakeEnvelope($6, $7, $8, $9, 4326) END,
                $10, $11, $12
            )
            "#,
        )
        .bind(record.id)
        .bind(record.variable_id)
        .bind(record.date)
        .bind(geo_json)
        .bind(record.geo_hash)
        .bind(bbox.map(|b| b.min_x))
        .bind(bbox.map(|b| b.min_y))
        .bind(bbox.map(|b| b.max_x))
        .bind(bbox.map(|b| b.max_y))
        .bind(record.value)
        .bind(Value::Object(record.meta))
        .bind(record.color.map(|c| c.to_hex()))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl GeometryStore for PgStore {
    async fn get_or_create_variable(
        &self,
        event_id: &str,
        spec: &'static VariableSpec,
    ) -> StorageResult<VariableRecord> {
        sqlx::query(
            r#"
            INSERT INTO psa_variables (id, event_id, name, geo_kind, temporal_kind, units, color_bar, auto_displayed)
            VALUES ($1, $2, $3, $4, $5, $6, '[]'::jsonb, $7)
            ON CONFLICT (event_id, name) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event_id)
        .bind(spec.name)
        .bind(spec.geo_kind.as_str())
        .bind(spec.temporal_kind.as_str())
        .bind(spec.unit.as_str())
        .bind(spec.auto_displayed)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, VariableRow>(
            "SELECT id, event_id, name, color_bar FROM psa_variables WHERE event_id = $1 AND name = $2",
        )
        .bind(event_id)
        .bind(spec.name)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update_color_bar(&self, variable_id: Uuid, color_bar: &[ColorStop]) -> StorageResult<()> {
        let result = sqlx::query("UPDATE psa_variables SET color_bar = $2 WHERE id = $1")
            .bind(variable_id)
            .bind(serde_json::to_value(color_bar)?)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("variable {}", variable_id)));
        }
        Ok(())
    }

    async fn variables(&self, event_id: &str) -> StorageResult<Vec<VariableRecord>> {
        let rows = sqlx::query_as::<_, VariableRow>(
            "SELECT id, event_id, name, color_bar FROM psa_variables WHERE event_id = $1 ORDER BY name",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn delete_variable(&self, variable_id: Uuid) -> StorageResult<()> {
        // Records go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM psa_variables WHERE id = $1")
            .bind(variable_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("variable {}", variable_id)));
        }
        Ok(())
    }

    async fn delete_records(&self, variable_id: Uuid, date: Option<DateTime<Utc>>) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM psa_data WHERE variable_id = $1 AND date IS NOT DISTINCT FROM $2")
            .bind(variable_id)
            .bind(date)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_polygon(&self, record: NewRecord, merge: MergeFn) -> StorageResult<UpsertOutcome> {
        let key = record.key();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, ST_AsGeoJSON(geo) FROM psa_data \
             WHERE variable_id = $1 AND date IS NOT DISTINCT FROM $2 AND value = $3 \
             LIMIT 1 FOR UPDATE",
        )
        .bind(key.variable_id)
        .bind(key.date)
        .bind(key.value)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some((id, geo_json)) => {
                let current = RecordGeometry::from_geojson(&GeoJsonGeometry::parse(&geo_json)?)?;
                let merged = merge(&key, current, record.geometry)?;
                let bbox = merged.bbox();
                sqlx::query(
                    r#"
                    UPDATE psa_data SET
                        geo = ST_SetSRID(ST_GeomFromGeoJSON($2), 4326),
                        bbox = CASE WHEN $3::float8 IS NULL THEN NULL ELSE ST_MakeEnvelope($3, $4, $5, $6, 4326) END,
                        meta = meta || $7,
                        color = COALESCE($8, color)
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(merged.to_geojson().to_json_string()?)
                .bind(bbox.map(|b| b.min_x))
                .bind(bbox.map(|b| b.min_y))
                .bind(bbox.map(|b| b.max_x))
                .bind(bbox.map(|b| b.max_y))
                .bind(Value::Object(record.meta))
                .bind(record.color.map(|c| c.to_hex()))
                .execute(&mut *tx)
                .await?;
                UpsertOutcome::Merged
            }
            None => {
                Self::insert_record(&mut tx, record.into_record()).await?;
                UpsertOutcome::Inserted
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn insert_points(&self, records: Vec<NewRecord>) -> StorageResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut buffer = String::with_capacity(records.len() * 128);
        for record in records {
            copy_row(&mut buffer, &record.into_record())?;
        }

        let mut copy = self.pool.copy_in_raw(COPY_POINTS_SQL).await?;
        copy.send(buffer.into_bytes()).await?;
        let rows = copy.finish().await?;
        debug!(rows, "Copied point records");
        Ok(rows)
    }

    async fn records(&self, variable_id: Uuid, date: Option<DateTime<Utc>>) -> StorageResult<Vec<DataRecord>> {
        let sql = format!(
            "{} WHERE variable_id = $1 AND date IS NOT DISTINCT FROM $2 ORDER BY value",
            SELECT_RECORD_COLUMNS
        );
        let mut rows = sqlx::query_as::<_, DataRow>(&sql)
            .bind(variable_id)
            .bind(date)
            .fetch(&self.pool);

        let mut records = Vec::new();
        while let Some(row) = rows.try_next().await? {
            records.push(DataRecord::try_from(row)?);
        }
        Ok(records)
    }

    async fn records_covering(&self, variable_id: Uuid, lon: f64, lat: f64) -> StorageResult<Vec<DataRecord>> {
        // Envelope filter first (index-backed), exact test second.
        let sql = format!(
            "{} WHERE variable_id = $1 \
             AND (bbox IS NULL OR bbox && ST_SetSRID(ST_MakePoint($2, $3), 4326)) \
             AND ST_Intersects(geo, ST_SetSRID(ST_MakePoint($2, $3), 4326)) \
             ORDER BY date NULLS FIRST, value",
            SELECT_RECORD_COLUMNS
        );
        let mut rows = sqlx::query_as::<_, DataRow>(&sql)
            .bind(variable_id)
            .bind(lon)
            .bind(lat)
            .fetch(&self.pool);

        let mut records = Vec::new();
        while let Some(row) = rows.try_next().await? {
            records.push(DataRecord::try_from(row)?);
        }
        Ok(records)
    }

    async fn log_ingestion(&self, entry: IngestLogEntry) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO psa_ingest_log (id, event_id, dataset_path, success, exception, date) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(&entry.event_id)
        .bind(&entry.dataset_path)
        .bind(entry.success)
        .bind(&entry.exception)
        .bind(entry.date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ingest_log(&self, event_id: &str) -> StorageResult<Vec<IngestLogEntry>> {
        let rows = sqlx::query_as::<_, (String, String, bool, Option<String>, DateTime<Utc>)>(
            "SELECT event_id, dataset_path, success, exception, date FROM psa_ingest_log \
             WHERE event_id = $1 ORDER BY date",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(event_id, dataset_path, success, exception, date)| IngestLogEntry {
                event_id,
                dataset_path,
                success,
                exception,
                date,
            })
            .collect())
    }
}

/// Escape a value for COPY text format.
fn copy_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

const COPY_NULL: &str = "\\N";

/// Append one tab-separated COPY row.
fn copy_row(buffer: &mut String, record: &DataRecord) -> StorageResult<()> {
    let meta = serde_json::to_string(&record.meta)?;
    let fields = [
        record.id.to_string(),
        record.variable_id.to_string(),
        record.date.map_or_else(|| COPY_NULL.to_string(), |d| d.to_rfc3339()),
        record.geometry.to_ewkt(),
        record
            .geo_hash
            .as_deref()
            .map_or_else(|| COPY_NULL.to_string(), copy_escape),
        record.value.to_string(),
        copy_escape(&meta),
        record.color.map_or_else(|| COPY_NULL.to_string(), |c| c.to_hex()),
    ];
    buffer.push_str(&fields.join("\t"));
    buffer.push('\n');
    Ok(())
}

/// Internal row type for variable queries.
#[derive(FromRow)]
struct VariableRow {
    id: Uuid,
    event_id: String,
    name: String,
    color_bar: Value,
}

impl TryFrom<VariableRow> for VariableRecord {
    type Error = StorageError;

    fn try_from(row: VariableRow) -> Result<Self, Self::Error> {
        Ok(VariableRecord {
            id: row.id,
            event_id: row.event_id,
            spec: resolve(&row.name)?,
            color_bar: serde_json::from_value(row.color_bar)?,
        })
    }
}

/// Internal row type for record queries.
#[derive(FromRow)]
struct DataRow {
    id: Uuid,
    variable_id: Uuid,
    date: Option<DateTime<Utc>>,
    geo_json: String,
    geo_hash: Option<String>,
    bbox_min_x: Option<f64>,
    bbox_min_y: Option<f64>,
    bbox_max_x: Option<f64>,
    bbox_max_y: Option<f64>,
    value: f64,
    meta: Value,
    color: Option<String>,
}

impl TryFrom<DataRow> for DataRecord {
    type Error = StorageError;

    fn try_from(row: DataRow) -> Result<Self, Self::Error> {
        let bbox = match (row.bbox_min_x, row.bbox_min_y, row.bbox_max_x, row.bbox_max_y) {
            (Some(min_x), Some(min_y), Some(max_x), Some(max_y)) => Some(BoundingBox::new(min_x, min_y, max_x, max_y)),
            _ => None,
        };
        let meta = match row.meta {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(DataRecord {
            id: row.id,
            variable_id: row.variable_id,
            date: row.date,
            geometry: RecordGeometry::from_geojson(&GeoJsonGeometry::parse(&row.geo_json)?)?,
            bbox,
            geo_hash: row.geo_hash,
            value: row.value,
            meta,
            color: row.color.as_deref().and_then(|c| c.parse::<Color>().ok()),
        })
    }
}

const SCHEMA_SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS postgis;

CREATE TABLE IF NOT EXISTS psa_variables (
    id UUID PRIMARY KEY,
    event_id VARCHAR(100) NOT NULL,
    name VARCHAR(50) NOT NULL,
    geo_kind VARCHAR(20) NOT NULL,
    temporal_kind VARCHAR(20) NOT NULL,
    units VARCHAR(20) NOT NULL,
    color_bar JSONB NOT NULL DEFAULT '[]'::jsonb,
    auto_displayed BOOLEAN NOT NULL DEFAULT FALSE,

    UNIQUE(event_id, name)
);

CREATE TABLE IF NOT EXISTS psa_data (
    id UUID PRIMARY KEY,
    variable_id UUID NOT NULL REFERENCES psa_variables(id) ON DELETE CASCADE,
    date TIMESTAMPTZ NULL,
    geo GEOMETRY(Geometry, 4326) NOT NULL,
    geo_hash VARCHAR(20) NULL,
    bbox GEOMETRY(Polygon, 4326) NULL,
    value DOUBLE PRECISION NOT NULL,
    meta JSONB NOT NULL DEFAULT '{}'::jsonb,
    color VARCHAR(7) NULL
);

CREATE INDEX IF NOT EXISTS idx_psa_data_variable_date ON psa_data(variable_id, date);
CREATE INDEX IF NOT EXISTS idx_psa_data_variable_geo_hash ON psa_data(variable_id, geo_hash);
CREATE INDEX IF NOT EXISTS idx_psa_data_bbox ON psa_data USING GIST(bbox);

CREATE TABLE IF NOT EXISTS psa_ingest_log (
    id UUID PRIMARY KEY,
    event_id VARCHAR(100) NOT NULL,
    dataset_path TEXT NOT NULL,
    success BOOLEAN NOT NULL,
    exception TEXT NULL,
    date TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_psa_ingest_log_event ON psa_ingest_log(event_id, date DESC);
"#;
