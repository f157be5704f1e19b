//! Catalog retrieval and stage artifact persistence.

pub mod extract;
pub mod provider;
pub mod retry;
pub mod store;
pub mod tmdb;

pub use extract::{extract_records, ExtractionSummary};
pub use provider::{CatalogProvider, FetchError, RawRecord, TransientKind};
pub use retry::{run_with_retry, Attempt, RetryFailure, RetryOutcome, RetryPolicy};
pub use store::{Stage, StageMeta, StageStore, StoreError};
pub use tmdb::{ClientConfig, TmdbClient};
