//! CineLab Runner — pipeline orchestration, analysis, and report export.
//!
//! This crate builds on `cinelab-core` to provide:
//! - The stage orchestrator (extract → clean → metrics → analyze) with
//!   skip-existing resumption and quality gating
//! - Read-only analysis projections over the metric table
//! - Run summary and CSV export
//! - TOML configuration with environment-provided credential

pub mod analysis;
pub mod config;
pub mod pipeline;
pub mod report;

pub use analysis::{AnalysisReport, DirectorStats, GroupStats, Headline, RankedEntry};
pub use config::{resolve_credential, ConfigError, PipelineConfig};
pub use pipeline::{Pipeline, PipelineError, PipelineRun, StageReport, StageStatus};
