//! Batch extraction — fetches all configured records in order.
//!
//! Per-record failures are collected and summarized, never raised; only an
//! authentication rejection aborts the batch, since every later request
//! would fail the same way.

use super::provider::{CatalogProvider, FetchError, RawRecord};

/// Result of a batch extraction.
#[derive(Debug)]
pub struct ExtractionSummary {
    /// Successfully fetched records, in request order.
    pub records: Vec<RawRecord>,
    /// Per-record failures, in request order.
    pub failures: Vec<(u64, FetchError)>,
    /// Identifiers requested, including failures.
    pub requested: usize,
}

impl ExtractionSummary {
    /// Successes as a percentage of everything requested.
    pub fn success_rate(&self) -> f64 {
        if self.requested == 0 {
            return 0.0;
        }
        self.records.len() as f64 / self.requested as f64 * 100.0
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Fetch every identifier in order, one request at a time.
///
/// Returns Err only on a fatal error (authentication); recoverable failures
/// are recorded in the summary and the batch continues.
pub fn extract_records(
    provider: &dyn CatalogProvider,
    ids: &[u64],
) -> Result<ExtractionSummary, FetchError> {
    let total = ids.len();
    let mut records = Vec::with_capacity(total);
    let mut failures: Vec<(u64, FetchError)> = Vec::new();

    for (i, &id) in ids.iter().enumerate() {
        tracing::info!(id, index = i + 1, total, "fetching record");
        match provider.fetch(id) {
            Ok(record) => records.push(record),
            Err(e) if e.is_fatal() => {
                tracing::error!(id, error = %e, "fatal fetch error, aborting batch");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(id, error = %e, "skipping record");
                failures.push((id, e));
            }
        }
    }

    tracing::info!(
        requested = total,
        fetched = records.len(),
        failed = failures.len(),
        "extraction batch complete"
    );

    Ok(ExtractionSummary {
        records,
        failures,
        requested: total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_of_empty_batch_is_zero() {
        let summary = ExtractionSummary {
            records: Vec::new(),
            failures: Vec::new(),
            requested: 0,
        };
        assert_eq!(summary.success_rate(), 0.0);
    }

    #[test]
    fn success_rate_counts_failures_in_denominator() {
        let summary = ExtractionSummary {
            records: vec![RawRecord::default(), RawRecord::default()],
            failures: vec![(99, FetchError::NotFound { id: 99 })],
            requested: 3,
        };
        assert!((summary.success_rate() - 66.666).abs() < 0.01);
        assert!(!summary.all_succeeded());
    }
}
