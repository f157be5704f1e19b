//! Batch extraction behavior against a scripted catalog provider.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use cinelab_core::data::{extract_records, CatalogProvider, FetchError, RawRecord, TransientKind};

/// Provider that replays a per-identifier script of outcomes.
struct ScriptedProvider {
    outcomes: RefCell<HashMap<u64, VecDeque<Result<RawRecord, FetchError>>>>,
    calls: RefCell<Vec<u64>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            outcomes: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn script(self, id: u64, outcome: Result<RawRecord, FetchError>) -> Self {
        self.outcomes
            .borrow_mut()
            .entry(id)
            .or_default()
            .push_back(outcome);
        self
    }

    fn calls(&self) -> Vec<u64> {
        self.calls.borrow().clone()
    }
}

impl CatalogProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(&self, id: u64) -> Result<RawRecord, FetchError> {
        self.calls.borrow_mut().push(id);
        self.outcomes
            .borrow_mut()
            .get_mut(&id)
            .and_then(|q| q.pop_front())
            .unwrap_or(Err(FetchError::NotFound { id }))
    }
}

fn record(id: u64, title: &str) -> RawRecord {
    RawRecord {
        id,
        title: Some(title.to_string()),
        budget: Some(200_000_000.0),
        revenue: Some(1_000_000_000.0),
        ..RawRecord::default()
    }
}

#[test]
fn missing_record_is_skipped_and_counted() {
    let provider = ScriptedProvider::new()
        .script(19995, Ok(record(19995, "Avatar")))
        .script(99999999, Err(FetchError::NotFound { id: 99999999 }))
        .script(140607, Ok(record(140607, "Star Wars: The Force Awakens")));

    let summary = extract_records(&provider, &[19995, 99999999, 140607]).unwrap();

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].0, 99999999);
    assert!(matches!(
        summary.failures[0].1,
        FetchError::NotFound { id: 99999999 }
    ));
    assert!((summary.success_rate() - 66.7).abs() < 0.1);
}

#[test]
fn records_come_back_in_request_order() {
    let provider = ScriptedProvider::new()
        .script(3, Ok(record(3, "c")))
        .script(1, Ok(record(1, "a")))
        .script(2, Ok(record(2, "b")));

    let summary = extract_records(&provider, &[3, 1, 2]).unwrap();

    let ids: Vec<u64> = summary.records.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![3, 1, 2]);
    assert!(summary.all_succeeded());
    assert_eq!(summary.success_rate(), 100.0);
}

#[test]
fn authentication_error_aborts_the_batch() {
    let provider = ScriptedProvider::new()
        .script(1, Ok(record(1, "a")))
        .script(
            2,
            Err(FetchError::Authentication("HTTP 401 for record 2".into())),
        )
        .script(3, Ok(record(3, "c")));

    let result = extract_records(&provider, &[1, 2, 3]);

    assert!(matches!(result, Err(FetchError::Authentication(_))));
    // Nothing after the fatal failure was requested.
    assert_eq!(provider.calls(), vec![1, 2]);
}

#[test]
fn exhausted_retries_fail_one_record_only() {
    let provider = ScriptedProvider::new()
        .script(1, Ok(record(1, "a")))
        .script(
            2,
            Err(FetchError::Exhausted {
                id: 2,
                kind: TransientKind::ServerError,
                attempts: 4,
            }),
        )
        .script(3, Ok(record(3, "c")));

    let summary = extract_records(&provider, &[1, 2, 3]).unwrap();

    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.failures.len(), 1);
    assert!(matches!(
        summary.failures[0].1,
        FetchError::Exhausted { attempts: 4, .. }
    ));
}
