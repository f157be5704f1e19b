//! Cleaning stage: type coercion, sentinel normalization, nested-field
//! flattening, and duplicate removal.
//!
//! Invariant on the output table: every numeric cell is either a valid
//! non-negative number or null — never a placeholder string, never a zero
//! standing in for "unreported". Row order follows the input, with later
//! duplicates on (id, title) dropped.

use crate::data::provider::{Credits, NamedEntry};
use crate::quality::SchemaError;
use crate::table::RAW_REQUIRED;
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("table error: {0}")]
    Table(String),

    #[error("input table is empty")]
    Empty,
}

/// Textual stand-ins for a missing value.
pub const TEXT_PLACEHOLDERS: [&str; 6] = [
    "",
    "N/A",
    "nan",
    "None",
    "No Data",
    "No overview available.",
];

/// Cleaned table plus per-column coercion error counts.
#[derive(Debug)]
pub struct CleanOutcome {
    pub table: DataFrame,
    pub coercion_errors: BTreeMap<String, usize>,
}

fn table_err(e: PolarsError) -> CleanError {
    CleanError::Table(e.to_string())
}

/// Run the full cleaning pass over a raw stage table.
pub fn clean_table(raw: &DataFrame) -> Result<CleanOutcome, CleanError> {
    if raw.height() == 0 {
        return Err(CleanError::Empty);
    }
    crate::quality::check_required_columns(raw, &RAW_REQUIRED)?;

    let rows = raw.height();
    let mut errors: BTreeMap<String, usize> = BTreeMap::new();

    let ids = read_u64(raw, "id")?;
    let titles = read_str(raw, "title")?;
    let taglines = clean_text(read_str(raw, "tagline")?);
    let overviews = clean_text(read_str(raw, "overview")?);
    let languages = read_str(raw, "original_language")?;

    // Date coercion: unparseable cells become null and are counted.
    let mut date_errors = 0usize;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let release_days: Vec<Option<i32>> = read_str(raw, "release_date")?
        .into_iter()
        .map(|cell| match cell {
            Some(s) if !s.trim().is_empty() => {
                match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                    Ok(d) => Some((d - epoch).num_days() as i32),
                    Err(_) => {
                        date_errors += 1;
                        None
                    }
                }
            }
            _ => None,
        })
        .collect();
    errors.insert("release_date".to_string(), date_errors);

    // Zero in a financial column means "unreported", not "free".
    let budget_musd: Vec<Option<f64>> = read_f64(raw, "budget")?
        .into_iter()
        .map(|v| match v {
            Some(x) if x > 0.0 => Some(x / 1_000_000.0),
            _ => None,
        })
        .collect();
    let revenue_musd: Vec<Option<f64>> = read_f64(raw, "revenue")?
        .into_iter()
        .map(|v| match v {
            Some(x) if x > 0.0 => Some(x / 1_000_000.0),
            _ => None,
        })
        .collect();
    let runtimes: Vec<Option<f64>> = read_f64(raw, "runtime")?
        .into_iter()
        .map(|v| v.filter(|x| *x > 0.0))
        .collect();

    // A rating backed by zero votes is not a rating.
    let vote_counts = read_f64(raw, "vote_count")?;
    let vote_averages: Vec<Option<f64>> = read_f64(raw, "vote_average")?
        .into_iter()
        .zip(vote_counts.iter())
        .map(|(avg, count)| match count {
            Some(c) if *c == 0.0 => None,
            _ => avg,
        })
        .collect();

    let popularity = read_f64(raw, "popularity")?;

    // Flatten nested JSON columns to pipe-joined name strings.
    let (genres, genre_errors) = map_json_column(read_str(raw, "genres")?, join_entry_names);
    errors.insert("genres".to_string(), genre_errors);
    let (companies, company_errors) =
        map_json_column(read_str(raw, "production_companies")?, join_entry_names);
    errors.insert("production_companies".to_string(), company_errors);
    let (collections, collection_errors) =
        map_json_column(read_str(raw, "belongs_to_collection")?, collection_name);
    errors.insert("belongs_to_collection".to_string(), collection_errors);

    // Derived columns from the credits payload.
    let credit_cells = read_str(raw, "credits")?;
    let mut credit_errors = 0usize;
    let mut cast: Vec<Option<String>> = Vec::with_capacity(rows);
    let mut crew: Vec<Option<String>> = Vec::with_capacity(rows);
    let mut directors: Vec<Option<String>> = Vec::with_capacity(rows);
    let mut cast_sizes: Vec<Option<u32>> = Vec::with_capacity(rows);
    let mut crew_sizes: Vec<Option<u32>> = Vec::with_capacity(rows);
    for cell in &credit_cells {
        let parsed = cell
            .as_deref()
            .map(serde_json::from_str::<Credits>)
            .transpose();
        match parsed {
            Ok(Some(credits)) => {
                cast.push(join_names(credits.cast.iter().map(|m| m.name.as_deref())));
                crew.push(join_names(credits.crew.iter().map(|m| m.name.as_deref())));
                directors.push(join_names(credits.crew.iter().filter_map(|m| {
                    (m.job.as_deref() == Some("Director")).then_some(m.name.as_deref())
                })));
                cast_sizes.push(Some(credits.cast.len() as u32));
                crew_sizes.push(Some(credits.crew.len() as u32));
            }
            Ok(None) => {
                cast.push(None);
                crew.push(None);
                directors.push(None);
                cast_sizes.push(None);
                crew_sizes.push(None);
            }
            Err(_) => {
                credit_errors += 1;
                cast.push(None);
                crew.push(None);
                directors.push(None);
                cast_sizes.push(None);
                crew_sizes.push(None);
            }
        }
    }
    errors.insert("credits".to_string(), credit_errors);

    let release_col = Column::new("release_date".into(), release_days)
        .cast(&DataType::Date)
        .map_err(table_err)?;

    let df = DataFrame::new(vec![
        Column::new("id".into(), ids),
        Column::new("title".into(), titles),
        Column::new("tagline".into(), taglines),
        release_col,
        Column::new("genres".into(), genres),
        Column::new("belongs_to_collection".into(), collections),
        Column::new("original_language".into(), languages),
        Column::new("budget_musd".into(), budget_musd),
        Column::new("revenue_musd".into(), revenue_musd),
        Column::new("production_companies".into(), companies),
        Column::new("vote_count".into(), vote_counts),
        Column::new("vote_average".into(), vote_averages),
        Column::new("popularity".into(), popularity),
        Column::new("runtime".into(), runtimes),
        Column::new("overview".into(), overviews),
        Column::new("cast".into(), cast),
        Column::new("cast_size".into(), cast_sizes),
        Column::new("crew".into(), crew),
        Column::new("crew_size".into(), crew_sizes),
        Column::new("directors".into(), directors),
    ])
    .map_err(table_err)?;

    // Stable dedupe on (id, title): first occurrence wins, order preserved.
    let deduped = df
        .lazy()
        .unique_stable(
            Some(vec!["id".into(), "title".into()]),
            UniqueKeepStrategy::First,
        )
        .collect()
        .map_err(table_err)?;

    let dropped = rows - deduped.height();
    if dropped > 0 {
        tracing::info!(dropped, "removed duplicate rows");
    }
    let total_coercion_errors: usize = errors.values().sum();
    if total_coercion_errors > 0 {
        tracing::warn!(total_coercion_errors, "cells failed coercion and were set missing");
    }

    Ok(CleanOutcome {
        table: deduped,
        coercion_errors: errors,
    })
}

// ── column readers ──────────────────────────────────────────────────

fn read_u64(df: &DataFrame, name: &str) -> Result<Vec<u64>, CleanError> {
    let col = df.column(name).map_err(table_err)?;
    let ca = col.u64().map_err(table_err)?;
    Ok((0..ca.len()).map(|i| ca.get(i).unwrap_or(0)).collect())
}

fn read_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, CleanError> {
    let col = df.column(name).map_err(table_err)?;
    let ca = col.f64().map_err(table_err)?;
    Ok((0..ca.len()).map(|i| ca.get(i)).collect())
}

fn read_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, CleanError> {
    let col = df.column(name).map_err(table_err)?;
    let ca = col.str().map_err(table_err)?;
    Ok((0..ca.len())
        .map(|i| ca.get(i).map(|s| s.to_string()))
        .collect())
}

// ── cell transforms ─────────────────────────────────────────────────

/// Trim text cells and null out the known placeholder tokens.
fn clean_text(cells: Vec<Option<String>>) -> Vec<Option<String>> {
    cells
        .into_iter()
        .map(|cell| {
            cell.and_then(|s| {
                let trimmed = s.trim();
                if TEXT_PLACEHOLDERS.contains(&trimmed) {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        })
        .collect()
}

/// Apply a JSON parser to each cell, counting parse failures.
fn map_json_column<F>(cells: Vec<Option<String>>, parser: F) -> (Vec<Option<String>>, usize)
where
    F: Fn(&str) -> Result<Option<String>, serde_json::Error>,
{
    let mut failures = 0usize;
    let out = cells
        .into_iter()
        .map(|cell| match cell {
            Some(s) => match parser(&s) {
                Ok(v) => v,
                Err(_) => {
                    failures += 1;
                    None
                }
            },
            None => None,
        })
        .collect();
    (out, failures)
}

fn join_entry_names(json: &str) -> Result<Option<String>, serde_json::Error> {
    let entries: Vec<NamedEntry> = serde_json::from_str(json)?;
    Ok(join_names(entries.iter().map(|e| e.name.as_deref())))
}

fn collection_name(json: &str) -> Result<Option<String>, serde_json::Error> {
    let entry: NamedEntry = serde_json::from_str(json)?;
    Ok(entry.name.filter(|n| !n.is_empty()))
}

/// Pipe-join present, non-empty names; None when nothing remains.
fn join_names<'a>(names: impl Iterator<Item = Option<&'a str>>) -> Option<String> {
    let joined: Vec<&str> = names.flatten().filter(|n| !n.is_empty()).collect();
    if joined.is_empty() {
        None
    } else {
        Some(joined.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{CastMember, CrewMember, RawRecord};
    use crate::table::records_to_dataframe;

    fn record(id: u64, title: &str) -> RawRecord {
        RawRecord {
            id,
            title: Some(title.to_string()),
            budget: Some(100_000_000.0),
            revenue: Some(300_000_000.0),
            release_date: Some("2009-12-18".to_string()),
            vote_average: Some(7.5),
            vote_count: Some(1000.0),
            ..RawRecord::default()
        }
    }

    fn clean(records: &[RawRecord]) -> CleanOutcome {
        let raw = records_to_dataframe(records).unwrap();
        clean_table(&raw).unwrap()
    }

    #[test]
    fn zero_budget_becomes_missing_and_rest_rescales() {
        let mut a = record(1, "a");
        a.budget = Some(0.0);
        let b = record(2, "b");

        let out = clean(&[a, b]);
        let budget = out.table.column("budget_musd").unwrap().f64().unwrap();
        assert_eq!(budget.get(0), None);
        assert_eq!(budget.get(1), Some(100.0));
    }

    #[test]
    fn zero_vote_count_invalidates_rating() {
        let mut a = record(1, "a");
        a.vote_count = Some(0.0);

        let out = clean(&[a]);
        let rating = out.table.column("vote_average").unwrap().f64().unwrap();
        assert_eq!(rating.get(0), None);
    }

    #[test]
    fn placeholder_text_is_cleared() {
        let mut a = record(1, "a");
        a.overview = Some("No overview available.".to_string());
        a.tagline = Some("   ".to_string());

        let out = clean(&[a]);
        let overview = out.table.column("overview").unwrap().str().unwrap();
        let tagline = out.table.column("tagline").unwrap().str().unwrap();
        assert_eq!(overview.get(0), None);
        assert_eq!(tagline.get(0), None);
    }

    #[test]
    fn unparseable_release_date_is_counted() {
        let mut a = record(1, "a");
        a.release_date = Some("not-a-date".to_string());
        let b = record(2, "b");

        let out = clean(&[a, b]);
        let dates = out.table.column("release_date").unwrap().date().unwrap();
        assert_eq!(dates.get(0), None);
        assert!(dates.get(1).is_some());
        assert_eq!(out.coercion_errors["release_date"], 1);
    }

    #[test]
    fn duplicates_drop_keeping_first() {
        let mut first = record(1, "same");
        first.revenue = Some(500_000_000.0);
        let second = record(1, "same");
        let third = record(2, "other");

        let out = clean(&[first, second, third]);
        assert_eq!(out.table.height(), 2);
        let revenue = out.table.column("revenue_musd").unwrap().f64().unwrap();
        assert_eq!(revenue.get(0), Some(500.0));
        let ids = out.table.column("id").unwrap().u64().unwrap();
        assert_eq!(ids.get(1), Some(2));
    }

    #[test]
    fn credits_flatten_to_cast_crew_and_directors() {
        let mut a = record(1, "a");
        a.credits = Some(Credits {
            cast: vec![
                CastMember {
                    name: Some("Sam Worthington".to_string()),
                },
                CastMember {
                    name: Some("Zoe Saldana".to_string()),
                },
            ],
            crew: vec![
                CrewMember {
                    name: Some("James Cameron".to_string()),
                    job: Some("Director".to_string()),
                },
                CrewMember {
                    name: Some("Mauro Fiore".to_string()),
                    job: Some("Director of Photography".to_string()),
                },
            ],
        });

        let out = clean(&[a]);
        let cast = out.table.column("cast").unwrap().str().unwrap();
        assert_eq!(cast.get(0), Some("Sam Worthington|Zoe Saldana"));
        let directors = out.table.column("directors").unwrap().str().unwrap();
        assert_eq!(directors.get(0), Some("James Cameron"));
        let cast_size = out.table.column("cast_size").unwrap().u32().unwrap();
        assert_eq!(cast_size.get(0), Some(2));
        let crew_size = out.table.column("crew_size").unwrap().u32().unwrap();
        assert_eq!(crew_size.get(0), Some(2));
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let raw = records_to_dataframe(&[record(1, "a")]).unwrap();
        let raw = raw.drop("budget").unwrap();
        let result = clean_table(&raw);
        assert!(matches!(result, Err(CleanError::Schema(_))));
    }

    #[test]
    fn empty_input_is_rejected() {
        let raw = records_to_dataframe(&[]).unwrap();
        assert!(matches!(clean_table(&raw), Err(CleanError::Empty)));
    }
}
