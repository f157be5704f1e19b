//! Raw-table construction: fetched records to a Polars DataFrame.
//!
//! Nested fields (genres, companies, collection, credits) are stored as
//! JSON-encoded strings in the raw table and flattened during cleaning, so
//! the raw artifact is a faithful snapshot of what the client fetched.

use crate::data::provider::RawRecord;
use polars::prelude::*;

/// Columns required in the raw stage table.
pub const RAW_REQUIRED: [&str; 4] = ["id", "title", "budget", "revenue"];

/// Columns required after cleaning.
pub const CLEAN_REQUIRED: [&str; 4] = ["id", "title", "budget_musd", "revenue_musd"];

/// Convert fetched records to the raw stage table, preserving fetch order.
pub fn records_to_dataframe(records: &[RawRecord]) -> PolarsResult<DataFrame> {
    let ids: Vec<u64> = records.iter().map(|r| r.id).collect();
    let titles: Vec<Option<String>> = records.iter().map(|r| r.title.clone()).collect();
    let taglines: Vec<Option<String>> = records.iter().map(|r| r.tagline.clone()).collect();
    let overviews: Vec<Option<String>> = records.iter().map(|r| r.overview.clone()).collect();
    let release_dates: Vec<Option<String>> =
        records.iter().map(|r| r.release_date.clone()).collect();
    let languages: Vec<Option<String>> = records
        .iter()
        .map(|r| r.original_language.clone())
        .collect();
    let budgets: Vec<Option<f64>> = records.iter().map(|r| r.budget).collect();
    let revenues: Vec<Option<f64>> = records.iter().map(|r| r.revenue).collect();
    let runtimes: Vec<Option<f64>> = records.iter().map(|r| r.runtime).collect();
    let popularity: Vec<Option<f64>> = records.iter().map(|r| r.popularity).collect();
    let vote_averages: Vec<Option<f64>> = records.iter().map(|r| r.vote_average).collect();
    let vote_counts: Vec<Option<f64>> = records.iter().map(|r| r.vote_count).collect();

    let genres: Vec<Option<String>> = records
        .iter()
        .map(|r| serde_json::to_string(&r.genres).ok())
        .collect();
    let companies: Vec<Option<String>> = records
        .iter()
        .map(|r| serde_json::to_string(&r.production_companies).ok())
        .collect();
    let collections: Vec<Option<String>> = records
        .iter()
        .map(|r| {
            r.belongs_to_collection
                .as_ref()
                .and_then(|c| serde_json::to_string(c).ok())
        })
        .collect();
    let credits: Vec<Option<String>> = records
        .iter()
        .map(|r| {
            r.credits
                .as_ref()
                .and_then(|c| serde_json::to_string(c).ok())
        })
        .collect();

    DataFrame::new(vec![
        Column::new("id".into(), ids),
        Column::new("title".into(), titles),
        Column::new("tagline".into(), taglines),
        Column::new("overview".into(), overviews),
        Column::new("release_date".into(), release_dates),
        Column::new("original_language".into(), languages),
        Column::new("budget".into(), budgets),
        Column::new("revenue".into(), revenues),
        Column::new("runtime".into(), runtimes),
        Column::new("popularity".into(), popularity),
        Column::new("vote_average".into(), vote_averages),
        Column::new("vote_count".into(), vote_counts),
        Column::new("genres".into(), genres),
        Column::new("production_companies".into(), companies),
        Column::new("belongs_to_collection".into(), collections),
        Column::new("credits".into(), credits),
    ])
}
