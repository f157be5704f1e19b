//! Catalog provider trait, raw record payload, and structured fetch errors.
//!
//! The CatalogProvider trait abstracts over the remote catalog so the
//! extraction stage can be driven by a scripted provider in tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One fetched catalog entry, restricted to the fields the pipeline consumes.
///
/// Unknown fields in the API payload are dropped during deserialization —
/// the record shape is an explicit schema, not a passthrough of the upstream
/// document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(default)]
    pub budget: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub runtime: Option<f64>,
    #[serde(default)]
    pub popularity: Option<f64>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<f64>,
    #[serde(default)]
    pub genres: Vec<NamedEntry>,
    #[serde(default)]
    pub production_companies: Vec<NamedEntry>,
    #[serde(default)]
    pub belongs_to_collection: Option<NamedEntry>,
    #[serde(default)]
    pub credits: Option<Credits>,
}

/// A named catalog entity (genre, production company, collection).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedEntry {
    #[serde(default)]
    pub name: Option<String>,
}

/// Cast and crew lists attached to a record via `append_to_response=credits`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credits {
    #[serde(default)]
    pub cast: Vec<CastMember>,
    #[serde(default)]
    pub crew: Vec<CrewMember>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CastMember {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewMember {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
}

/// Transient failure classification: all of these are retried with backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransientKind {
    RateLimited,
    ServerError,
    Timeout,
    Connect,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransientKind::RateLimited => "rate limited",
            TransientKind::ServerError => "server error",
            TransientKind::Timeout => "timeout",
            TransientKind::Connect => "connection failed",
        };
        f.write_str(s)
    }
}

/// Structured per-record fetch errors.
///
/// Only `Authentication` is fatal to a batch; everything else is recoverable
/// at record granularity (skip and continue).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication rejected by catalog API: {0}")]
    Authentication(String),

    #[error("record {id} not found")]
    NotFound { id: u64 },

    #[error("record {id}: {kind} after {attempts} attempt(s)")]
    Exhausted {
        id: u64,
        kind: TransientKind,
        attempts: u32,
    },

    #[error("record {id}: undecodable response: {reason}")]
    Malformed { id: u64, reason: String },
}

impl FetchError {
    /// Fatal errors abort the whole batch; the rest skip one record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Authentication(_))
    }
}

/// Trait for catalog providers.
///
/// Implementations fetch one record at a time; retry, backoff, and pacing
/// are the provider's responsibility. The stage store sits above this trait.
pub trait CatalogProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch a single record by identifier.
    fn fetch(&self, id: u64) -> Result<RawRecord, FetchError>;
}
