//! CineLab Core — catalog retrieval, staged cleaning, and financial metrics.
//!
//! This crate contains the data layer of the pipeline:
//! - Retrieval client for the movie catalog API with retry/backoff
//! - Explicit retry state machine, independent of the HTTP call site
//! - Cleaning stage (type coercion, sentinel normalization, nested-field flattening)
//! - Metric derivation (profit, ROI with reliability threshold)
//! - Quality reporting (per-column profiles, score, outlier flags)
//! - Stage artifact store with atomic writes and completeness markers

pub mod clean;
pub mod data;
pub mod metrics;
pub mod quality;
pub mod table;
