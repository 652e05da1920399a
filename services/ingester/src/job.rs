//! Job files: the event plus the datasets to ingest for it.
//!
//! ```yaml
//! event:
//!   id: florence-2018
//!   name: Florence
//!   region: { type: Polygon, coordinates: [[[-80, 30], [-70, 30], [-70, 40], [-80, 30]]] }
//! config:
//!   levels: 25
//! datasets:
//!   - path: ${PSA_DATA_DIR}/fort.63.nc
//!     grid: { kind: unstructured, topology: element, start_index: 1 }
//!     variables: [water_level]
//!   - parts:
//!       - { path: west.nc, grid: { kind: structured }, variables: [water_level_max] }
//!       - { path: east.nc, grid: { kind: structured }, variables: [water_level_max] }
//! ```
//!
//! `${VAR}` and `${VAR:-default}` are expanded from the environment.
//! Relative dataset paths resolve against the job file's directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ingestion::IngestConfig;
use psa_common::{Event, ManifestDataset};
use serde::Deserialize;

/// One ingestion pass: a single dataset or the parts of a split run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum JobEntry {
    Single(ManifestDataset),
    Parts { parts: Vec<ManifestDataset> },
}

impl JobEntry {
    pub fn manifests(&self) -> &[ManifestDataset] {
        match self {
            JobEntry::Single(manifest) => std::slice::from_ref(manifest),
            JobEntry::Parts { parts } => parts,
        }
    }

    fn manifests_mut(&mut self) -> &mut [ManifestDataset] {
        match self {
            JobEntry::Single(manifest) => std::slice::from_mut(manifest),
            JobEntry::Parts { parts } => parts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobFile {
    pub event: Event,
    #[serde(default)]
    pub config: Option<IngestConfig>,
    pub datasets: Vec<JobEntry>,
}

impl JobFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read job file {:?}", path))?;
        let mut job = Self::parse(&content).with_context(|| format!("Failed to parse job file {:?}", path))?;
        if let Some(base) = path.parent() {
            job.resolve_paths(base);
        }
        Ok(job)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content)?;
        let job: Self = serde_yaml::from_str(&expanded)?;
        job.validate()?;
        Ok(job)
    }

    fn validate(&self) -> Result<()> {
        if self.datasets.is_empty() {
            anyhow::bail!("job for event {} lists no datasets", self.event.id);
        }
        for entry in &self.datasets {
            if entry.manifests().is_empty() {
                anyhow::bail!("job for event {} has an entry with no parts", self.event.id);
            }
            for manifest in entry.manifests() {
                manifest.validate()?;
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for entry in &mut self.datasets {
            for manifest in entry.manifests_mut() {
                if manifest.path.is_relative() {
                    manifest.path = base.join(&manifest.path);
                }
            }
        }
    }

    /// Job settings (or defaults) with `PSA_*` environment overrides.
    pub fn ingest_config(&self) -> Result<IngestConfig> {
        Ok(self.config.clone().unwrap_or_default().with_env()?)
    }

    pub fn manifest_count(&self) -> usize {
        self.datasets.iter().map(|e| e.manifests().len()).sum()
    }
}

/// Expand `${VAR}` and `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut expr = String::new();
            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(c) => expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", expr),
                }
            }
            result.push_str(&resolve_var_expr(&expr)?);
        } else {
            result.push(ch);
        }
    }
    Ok(result)
}

fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((name, default)) = expr.split_once(":-") {
        match std::env::var(name.trim()) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}
