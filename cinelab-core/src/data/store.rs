//! Stage artifact store.
//!
//! Layout: `{root}/{stage}.parquet` (or `analysis.json` for the analyze
//! stage) plus a `{stage}.meta.json` sidecar per stage.
//!
//! Features:
//! - Atomic writes (write to .tmp, rename into place)
//! - Completeness marker written only after the full artifact is on disk,
//!   so a partially-written artifact is never trusted by `has()`
//! - blake3 content hash over the exact bytes that land on disk
//! - The stage QualityReport travels with the artifact in the sidecar

use crate::quality::QualityReport;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Clean,
    Metrics,
    Analyze,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Extract, Stage::Clean, Stage::Metrics, Stage::Analyze];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Clean => "clean",
            Stage::Metrics => "metrics",
            Stage::Analyze => "analyze",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no artifact for stage '{stage}'")]
    NotFound { stage: Stage },

    #[error("artifact for stage '{stage}' is incomplete")]
    Incomplete { stage: Stage },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("metadata error: {0}")]
    Meta(String),
}

/// Metadata sidecar for a stage artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageMeta {
    pub stage: Stage,
    pub rows: usize,
    pub data_hash: String,
    pub written_at: chrono::NaiveDateTime,
    /// True only once the artifact file has been fully written and renamed
    /// into place. An interrupted write leaves this false or absent.
    pub complete: bool,
    pub quality: QualityReport,
}

/// The stage artifact store.
pub struct StageStore {
    root: PathBuf,
}

impl StageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, stage: Stage) -> PathBuf {
        match stage {
            Stage::Analyze => self.root.join("analysis.json"),
            s => self.root.join(format!("{}.parquet", s.as_str())),
        }
    }

    fn meta_path(&self, stage: Stage) -> PathBuf {
        self.root.join(format!("{}.meta.json", stage.as_str()))
    }

    /// True only for a complete artifact with a readable sidecar.
    pub fn has(&self, stage: Stage) -> bool {
        self.meta(stage).map(|m| m.complete).unwrap_or(false)
            && self.artifact_path(stage).exists()
    }

    /// Read the metadata sidecar for a stage, if any.
    pub fn meta(&self, stage: Stage) -> Option<StageMeta> {
        let content = fs::read_to_string(self.meta_path(stage)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Metadata for every stage, in execution order. For status displays.
    pub fn statuses(&self) -> Vec<(Stage, Option<StageMeta>)> {
        Stage::ALL.iter().map(|s| (*s, self.meta(*s))).collect()
    }

    /// Persist a stage table, overwriting any prior artifact of that stage.
    pub fn save_table(
        &self,
        stage: Stage,
        table: &DataFrame,
        quality: &QualityReport,
    ) -> Result<StageMeta, StoreError> {
        if stage == Stage::Analyze {
            return Err(StoreError::Meta(
                "analyze stage persists a report, not a table".to_string(),
            ));
        }

        // Serialize to a buffer first so the hash covers exactly the bytes
        // that land on disk.
        let mut buf: Vec<u8> = Vec::new();
        ParquetWriter::new(&mut buf)
            .finish(&mut table.clone())
            .map_err(|e| StoreError::Parquet(e.to_string()))?;

        self.write_artifact(stage, &buf, table.height(), quality)
    }

    /// Load a stage table. Errors if the artifact is missing or incomplete.
    pub fn load_table(&self, stage: Stage) -> Result<(DataFrame, StageMeta), StoreError> {
        let meta = self.meta(stage).ok_or(StoreError::NotFound { stage })?;
        if !meta.complete {
            return Err(StoreError::Incomplete { stage });
        }
        let file = fs::File::open(self.artifact_path(stage))
            .map_err(|_| StoreError::NotFound { stage })?;
        let table = ParquetReader::new(file)
            .finish()
            .map_err(|e| StoreError::Parquet(e.to_string()))?;
        if table.height() != meta.rows {
            return Err(StoreError::Incomplete { stage });
        }
        Ok((table, meta))
    }

    /// Persist the analyze-stage report as pretty JSON.
    pub fn save_report<T: Serialize>(
        &self,
        report: &T,
        quality: &QualityReport,
    ) -> Result<StageMeta, StoreError> {
        let buf = serde_json::to_vec_pretty(report)
            .map_err(|e| StoreError::Meta(e.to_string()))?;
        self.write_artifact(Stage::Analyze, &buf, quality.rows, quality)
    }

    /// Load the analyze-stage report.
    pub fn load_report<T: serde::de::DeserializeOwned>(
        &self,
    ) -> Result<(T, StageMeta), StoreError> {
        let stage = Stage::Analyze;
        let meta = self.meta(stage).ok_or(StoreError::NotFound { stage })?;
        if !meta.complete {
            return Err(StoreError::Incomplete { stage });
        }
        let content = fs::read_to_string(self.artifact_path(stage))
            .map_err(|_| StoreError::NotFound { stage })?;
        let report = serde_json::from_str(&content).map_err(|e| StoreError::Meta(e.to_string()))?;
        Ok((report, meta))
    }

    /// Write artifact bytes atomically, then mark the stage complete.
    fn write_artifact(
        &self,
        stage: Stage,
        bytes: &[u8],
        rows: usize,
        quality: &QualityReport,
    ) -> Result<StageMeta, StoreError> {
        fs::create_dir_all(&self.root)?;

        let path = self.artifact_path(stage);
        let tmp = path.with_extension(match stage {
            Stage::Analyze => "json.tmp",
            _ => "parquet.tmp",
        });
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            StoreError::Io(e)
        })?;

        // The completeness marker goes down last.
        let meta = StageMeta {
            stage,
            rows,
            data_hash: blake3::hash(bytes).to_hex().to_string(),
            written_at: chrono::Local::now().naive_local(),
            complete: true,
            quality: quality.clone(),
        };
        let meta_json =
            serde_json::to_string_pretty(&meta).map_err(|e| StoreError::Meta(e.to_string()))?;
        let meta_path = self.meta_path(stage);
        let meta_tmp = meta_path.with_extension("json.tmp");
        fs::write(&meta_tmp, meta_json)?;
        fs::rename(&meta_tmp, &meta_path).map_err(|e| {
            let _ = fs::remove_file(&meta_tmp);
            StoreError::Io(e)
        })?;

        Ok(meta)
    }
}
