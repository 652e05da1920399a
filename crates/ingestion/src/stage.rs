//! Per-key progress through one ingestion pass.
//!
//! Every `(variable, timestamp)` key moves through
//! `pending -> loading -> contouring | pointing -> coloring -> persisted`.
//! A later pass starts the key over at `pending`.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{IngestionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Loading,
    Contouring,
    Pointing,
    Coloring,
    Persisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Loading => "loading",
            Stage::Contouring => "contouring",
            Stage::Pointing => "pointing",
            Stage::Coloring => "coloring",
            Stage::Persisted => "persisted",
        }
    }

    pub fn can_advance_to(&self, next: Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Pending, Stage::Loading)
                | (Stage::Loading, Stage::Contouring)
                | (Stage::Loading, Stage::Pointing)
                | (Stage::Contouring, Stage::Coloring)
                | (Stage::Pointing, Stage::Coloring)
                | (Stage::Coloring, Stage::Persisted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == Stage::Persisted
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks one key's stage and rejects out-of-order transitions.
#[derive(Debug)]
pub struct StageTracker<'a> {
    variable: &'a str,
    date: Option<DateTime<Utc>>,
    stage: Stage,
}

impl<'a> StageTracker<'a> {
    pub fn new(variable: &'a str, date: Option<DateTime<Utc>>) -> Self {
        Self {
            variable,
            date,
            stage: Stage::Pending,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn advance(&mut self, next: Stage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(IngestionError::StageTransition {
                variable: self.variable.to_string(),
                date: self.date,
                from: self.stage.as_str(),
                to: next.as_str(),
            });
        }
        debug!(variable = self.variable, date = ?self.date, from = %self.stage, to = %next, "Stage transition");
        self.stage = next;
        Ok(())
    }
}
