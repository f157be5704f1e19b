//! Pipeline orchestration — staged execution with checkpoints and gating.
//!
//! Stages run strictly in order: extract → clean → metrics → analyze. Each
//! stage checks the store first (skip-existing resumption), validates its
//! output, applies the quality gate, and persists before handing off. A
//! resumed artifact is indistinguishable from a freshly computed one
//! downstream.
//!
//! Gating policy: a quality score below the configured gate logs a warning
//! and the run continues; only a completely empty artifact aborts. An
//! authentication rejection during extract aborts the whole run.

use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use thiserror::Error;

use cinelab_core::clean::{clean_table, CleanError};
use cinelab_core::data::{extract_records, CatalogProvider, Stage, StageMeta, StageStore, StoreError};
use cinelab_core::metrics::{derive_metrics, MetricError, ROI};
use cinelab_core::quality::{self, QualityReport, SchemaError};
use cinelab_core::table::{records_to_dataframe, CLEAN_REQUIRED, RAW_REQUIRED};

use crate::analysis::{build_report, AnalysisError, AnalysisReport, Headline};
use crate::config::PipelineConfig;

/// How many entries each ranking list in the analysis report carries.
const TOP_N: usize = 5;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("stage '{stage}' produced an empty artifact")]
    EmptyArtifact { stage: Stage },

    #[error("no complete artifact for stage '{stage}' — run that stage first")]
    MissingArtifact { stage: Stage },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("clean stage failed: {0}")]
    Clean(#[from] CleanError),

    #[error("metric stage failed: {0}")]
    Metric(#[from] MetricError),

    #[error("analyze stage failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("table error: {0}")]
    Table(String),
}

/// Terminal status of one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// A complete prior artifact was reused.
    Skipped,
    Succeeded,
    Failed,
}

/// Timing and quality for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub duration_secs: f64,
    pub rows: usize,
    pub quality_score_pct: f64,
}

/// Summary of one full pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub stages: Vec<StageReport>,
    /// Fetched records as a percentage of requested identifiers.
    pub success_rate_pct: Option<f64>,
    pub headline: Option<Headline>,
}

/// The stage orchestrator. Owns the store; the provider is passed in only
/// where network access is actually needed.
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    store: StageStore,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        let store = StageStore::new(&config.pipeline.data_dir);
        Self { config, store }
    }

    pub fn store(&self) -> &StageStore {
        &self.store
    }

    fn should_skip(&self, stage: Stage, force: bool) -> bool {
        !force && self.config.pipeline.skip_existing && self.store.has(stage)
    }

    /// Empty artifacts abort; low quality only warns.
    fn gate(&self, stage: Stage, quality: &QualityReport) -> Result<(), PipelineError> {
        if quality.rows == 0 {
            return Err(PipelineError::EmptyArtifact { stage });
        }
        if quality.score_pct < self.config.quality.min_score_pct {
            tracing::warn!(
                stage = %stage,
                score_pct = quality.score_pct,
                gate_pct = self.config.quality.min_score_pct,
                "quality score below gate, continuing"
            );
        }
        Ok(())
    }

    fn load_input(&self, stage: Stage) -> Result<(DataFrame, StageMeta), PipelineError> {
        if !self.store.has(stage) {
            return Err(PipelineError::MissingArtifact { stage });
        }
        Ok(self.store.load_table(stage)?)
    }

    fn skipped(stage: Stage, meta: &StageMeta, started: Instant) -> StageReport {
        StageReport {
            stage,
            status: StageStatus::Skipped,
            duration_secs: started.elapsed().as_secs_f64(),
            rows: meta.rows,
            quality_score_pct: meta.quality.score_pct,
        }
    }

    fn succeeded(stage: Stage, quality: &QualityReport, started: Instant) -> StageReport {
        StageReport {
            stage,
            status: StageStatus::Succeeded,
            duration_secs: started.elapsed().as_secs_f64(),
            rows: quality.rows,
            quality_score_pct: quality.score_pct,
        }
    }

    /// Extract stage: fetch all configured records, or reuse the artifact.
    pub fn run_extract(
        &self,
        provider: &dyn CatalogProvider,
        force: bool,
    ) -> Result<(DataFrame, StageReport), PipelineError> {
        let stage = Stage::Extract;
        let started = Instant::now();

        if self.should_skip(stage, force) {
            let (table, meta) = self.store.load_table(stage)?;
            tracing::info!(stage = %stage, rows = meta.rows, "reusing persisted artifact");
            return Ok((table, Self::skipped(stage, &meta, started)));
        }

        let summary = extract_records(provider, &self.config.catalog.record_ids)
            .map_err(|e| PipelineError::Authentication(e.to_string()))?;
        if summary.records.is_empty() {
            return Err(PipelineError::EmptyArtifact { stage });
        }
        tracing::info!(
            success_rate_pct = summary.success_rate(),
            "extraction success rate"
        );

        let table =
            records_to_dataframe(&summary.records).map_err(|e| PipelineError::Table(e.to_string()))?;
        let quality = quality::report_for(&table, &RAW_REQUIRED, &BTreeMap::new())?;
        self.gate(stage, &quality)?;
        self.store.save_table(stage, &table, &quality)?;

        Ok((table, Self::succeeded(stage, &quality, started)))
    }

    /// Clean stage. On a schema error, falls back to a prior complete clean
    /// artifact when resumption allows it.
    pub fn run_clean(&self, force: bool) -> Result<(DataFrame, StageReport), PipelineError> {
        let stage = Stage::Clean;
        let started = Instant::now();

        if self.should_skip(stage, force) {
            let (table, meta) = self.store.load_table(stage)?;
            tracing::info!(stage = %stage, rows = meta.rows, "reusing persisted artifact");
            return Ok((table, Self::skipped(stage, &meta, started)));
        }

        let (raw, _) = self.load_input(Stage::Extract)?;
        match clean_table(&raw) {
            Ok(outcome) => {
                let quality =
                    quality::report_for(&outcome.table, &CLEAN_REQUIRED, &outcome.coercion_errors)?;
                self.gate(stage, &quality)?;
                self.store.save_table(stage, &outcome.table, &quality)?;
                Ok((outcome.table, Self::succeeded(stage, &quality, started)))
            }
            Err(CleanError::Schema(e)) if self.config.pipeline.skip_existing && self.store.has(stage) => {
                tracing::warn!(error = %e, "schema error in clean stage, falling back to prior artifact");
                let (table, meta) = self.store.load_table(stage)?;
                Ok((table, Self::skipped(stage, &meta, started)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Metric stage: derive profit and ROI, flag outliers.
    pub fn run_metrics(&self, force: bool) -> Result<(DataFrame, StageReport), PipelineError> {
        let stage = Stage::Metrics;
        let started = Instant::now();

        if self.should_skip(stage, force) {
            let (table, meta) = self.store.load_table(stage)?;
            tracing::info!(stage = %stage, rows = meta.rows, "reusing persisted artifact");
            return Ok((table, Self::skipped(stage, &meta, started)));
        }

        let (clean, _) = self.load_input(Stage::Clean)?;
        let table = derive_metrics(&clean, self.config.quality.roi_budget_floor_musd)?;
        let mut quality = quality::report_for(&table, &CLEAN_REQUIRED, &BTreeMap::new())?;
        quality.outliers =
            quality::iqr_outliers(&table, ROI, self.config.quality.outlier_iqr_multiplier);
        if !quality.outliers.is_empty() {
            tracing::warn!(count = quality.outliers.len(), "flagged ROI outliers");
        }
        self.gate(stage, &quality)?;
        self.store.save_table(stage, &table, &quality)?;

        Ok((table, Self::succeeded(stage, &quality, started)))
    }

    /// Analyze stage: build and persist the report.
    pub fn run_analyze(&self, force: bool) -> Result<(AnalysisReport, StageReport), PipelineError> {
        let stage = Stage::Analyze;
        let started = Instant::now();

        if self.should_skip(stage, force) {
            let (report, meta) = self.store.load_report::<AnalysisReport>()?;
            tracing::info!(stage = %stage, "reusing persisted report");
            return Ok((report, Self::skipped(stage, &meta, started)));
        }

        let (metric_table, _) = self.load_input(Stage::Metrics)?;
        let report = build_report(&metric_table, TOP_N)?;
        let quality = quality::report_for(&metric_table, &CLEAN_REQUIRED, &BTreeMap::new())?;
        self.gate(stage, &quality)?;
        self.store.save_report(&report, &quality)?;

        Ok((report, Self::succeeded(stage, &quality, started)))
    }

    /// Run every stage in order and aggregate the run summary.
    pub fn run(
        &self,
        provider: &dyn CatalogProvider,
        force: bool,
    ) -> Result<PipelineRun, PipelineError> {
        let started_at = Utc::now();
        let timer = Instant::now();
        let mut stages = Vec::with_capacity(Stage::ALL.len());

        let (_, report) = self.run_extract(provider, force)?;
        let extracted_rows = report.rows;
        stages.push(report);

        let (_, report) = self.run_clean(force)?;
        stages.push(report);

        let (_, report) = self.run_metrics(force)?;
        stages.push(report);

        let (analysis, report) = self.run_analyze(force)?;
        stages.push(report);

        let requested = self.config.catalog.record_ids.len();
        let success_rate_pct =
            (requested > 0).then(|| extracted_rows as f64 / requested as f64 * 100.0);

        let run = PipelineRun {
            started_at,
            finished_at: Utc::now(),
            duration_secs: timer.elapsed().as_secs_f64(),
            stages,
            success_rate_pct,
            headline: Some(analysis.headline),
        };
        tracing::info!(
            duration_secs = run.duration_secs,
            success_rate_pct = run.success_rate_pct,
            "pipeline run complete"
        );
        Ok(run)
    }
}
