//! Read-only analysis projections over the metric table.
//!
//! Every function here is a pure projection: metric table in, serializable
//! statistics out. Nothing mutates the table, and ROI rankings only ever see
//! values the metric stage already deemed reliable (unreliable ROI is null).

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("table error: {0}")]
    Table(String),
}

fn table_err(e: PolarsError) -> AnalysisError {
    AnalysisError::Table(e.to_string())
}

/// One record in a ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
    pub id: u64,
    pub title: String,
    pub value: f64,
}

/// Headline records across the whole table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    pub highest_revenue: Option<RankedEntry>,
    pub highest_budget: Option<RankedEntry>,
    pub highest_profit: Option<RankedEntry>,
    pub lowest_profit: Option<RankedEntry>,
    pub highest_roi: Option<RankedEntry>,
    pub lowest_roi: Option<RankedEntry>,
    pub most_voted: Option<RankedEntry>,
    pub highest_rated: Option<RankedEntry>,
    pub lowest_rated: Option<RankedEntry>,
    pub most_popular: Option<RankedEntry>,
}

/// Aggregate statistics for one group (franchise or standalone).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStats {
    pub group: String,
    pub count: usize,
    pub mean_revenue_musd: Option<f64>,
    pub total_budget_musd: Option<f64>,
    pub mean_budget_musd: Option<f64>,
    pub median_roi: Option<f64>,
    pub mean_popularity: Option<f64>,
    pub mean_vote_count: Option<f64>,
}

/// Aggregate statistics for one director.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorStats {
    pub name: String,
    pub films: usize,
    pub total_revenue_musd: f64,
    pub mean_rating: Option<f64>,
}

/// The full analysis report persisted by the analyze stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub headline: Headline,
    pub groups: Vec<GroupStats>,
    pub top_directors_by_revenue: Vec<DirectorStats>,
    pub top_by_revenue: Vec<RankedEntry>,
    pub top_by_profit: Vec<RankedEntry>,
    pub top_by_roi: Vec<RankedEntry>,
}

/// Build the analysis report. `top_n` bounds every ranking list.
pub fn build_report(table: &DataFrame, top_n: usize) -> Result<AnalysisReport, AnalysisError> {
    let ids = read_ids(table)?;
    let titles = read_str(table, "title")?;
    let revenue = read_f64(table, "revenue_musd")?;
    let budget = read_f64(table, "budget_musd")?;
    let profit = read_f64(table, "profit_musd")?;
    let roi = read_f64(table, "roi")?;
    let votes = read_f64(table, "vote_count")?;
    let rating = read_f64(table, "vote_average")?;
    let popularity = read_f64(table, "popularity")?;
    let collections = read_str(table, "belongs_to_collection")?;
    let directors = read_str(table, "directors")?;

    let headline = Headline {
        highest_revenue: extreme(&ids, &titles, &revenue, true),
        highest_budget: extreme(&ids, &titles, &budget, true),
        highest_profit: extreme(&ids, &titles, &profit, true),
        lowest_profit: extreme(&ids, &titles, &profit, false),
        highest_roi: extreme(&ids, &titles, &roi, true),
        lowest_roi: extreme(&ids, &titles, &roi, false),
        most_voted: extreme(&ids, &titles, &votes, true),
        highest_rated: extreme(&ids, &titles, &rating, true),
        lowest_rated: extreme(&ids, &titles, &rating, false),
        most_popular: extreme(&ids, &titles, &popularity, true),
    };

    let groups = vec![
        group_stats(
            "franchise",
            &collections,
            true,
            &revenue,
            &budget,
            &roi,
            &popularity,
            &votes,
        ),
        group_stats(
            "standalone",
            &collections,
            false,
            &revenue,
            &budget,
            &roi,
            &popularity,
            &votes,
        ),
    ];

    Ok(AnalysisReport {
        headline,
        groups,
        top_directors_by_revenue: director_stats(&directors, &revenue, &rating, top_n),
        top_by_revenue: ranked(&ids, &titles, &revenue, top_n),
        top_by_profit: ranked(&ids, &titles, &profit, top_n),
        top_by_roi: ranked(&ids, &titles, &roi, top_n),
    })
}

// ── column readers ──────────────────────────────────────────────────

fn read_ids(df: &DataFrame) -> Result<Vec<u64>, AnalysisError> {
    let col = df.column("id").map_err(table_err)?;
    let ca = col.u64().map_err(table_err)?;
    Ok((0..ca.len()).map(|i| ca.get(i).unwrap_or(0)).collect())
}

fn read_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, AnalysisError> {
    let col = df.column(name).map_err(table_err)?;
    let ca = col.f64().map_err(table_err)?;
    Ok((0..ca.len()).map(|i| ca.get(i)).collect())
}

fn read_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, AnalysisError> {
    let col = df.column(name).map_err(table_err)?;
    let ca = col.str().map_err(table_err)?;
    Ok((0..ca.len())
        .map(|i| ca.get(i).map(|s| s.to_string()))
        .collect())
}

// ── projections ─────────────────────────────────────────────────────

fn entry(ids: &[u64], titles: &[Option<String>], index: usize, value: f64) -> RankedEntry {
    RankedEntry {
        id: ids[index],
        title: titles[index]
            .clone()
            .unwrap_or_else(|| "<unknown title>".to_string()),
        value,
    }
}

/// Row with the maximum (or minimum) present value in a column.
fn extreme(
    ids: &[u64],
    titles: &[Option<String>],
    values: &[Option<f64>],
    max: bool,
) -> Option<RankedEntry> {
    let mut best: Option<(usize, f64)> = None;
    for (i, value) in values.iter().enumerate() {
        let Some(v) = value else { continue };
        let better = match best {
            None => true,
            Some((_, b)) => {
                if max {
                    *v > b
                } else {
                    *v < b
                }
            }
        };
        if better {
            best = Some((i, *v));
        }
    }
    best.map(|(i, v)| entry(ids, titles, i, v))
}

/// Top-N rows by a column, descending, ties broken by input order.
fn ranked(
    ids: &[u64],
    titles: &[Option<String>],
    values: &[Option<f64>],
    n: usize,
) -> Vec<RankedEntry> {
    let mut present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    present.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    present
        .into_iter()
        .take(n)
        .map(|(i, v)| entry(ids, titles, i, v))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn group_stats(
    name: &str,
    collections: &[Option<String>],
    in_collection: bool,
    revenue: &[Option<f64>],
    budget: &[Option<f64>],
    roi: &[Option<f64>],
    popularity: &[Option<f64>],
    votes: &[Option<f64>],
) -> GroupStats {
    let members: Vec<usize> = collections
        .iter()
        .enumerate()
        .filter_map(|(i, c)| (c.is_some() == in_collection).then_some(i))
        .collect();

    let pick = |values: &[Option<f64>]| -> Vec<f64> {
        members.iter().filter_map(|&i| values[i]).collect()
    };

    let budgets = pick(budget);
    GroupStats {
        group: name.to_string(),
        count: members.len(),
        mean_revenue_musd: mean(&pick(revenue)),
        total_budget_musd: (!budgets.is_empty()).then(|| budgets.iter().sum()),
        mean_budget_musd: mean(&budgets),
        median_roi: median(&mut pick(roi)),
        mean_popularity: mean(&pick(popularity)),
        mean_vote_count: mean(&pick(votes)),
    }
}

/// Explode the pipe-joined directors column and aggregate per director.
fn director_stats(
    directors: &[Option<String>],
    revenue: &[Option<f64>],
    rating: &[Option<f64>],
    top_n: usize,
) -> Vec<DirectorStats> {
    struct Acc {
        films: usize,
        revenue: f64,
        rating_sum: f64,
        rating_count: usize,
    }
    let mut by_name: BTreeMap<String, Acc> = BTreeMap::new();

    for (i, cell) in directors.iter().enumerate() {
        let Some(cell) = cell else { continue };
        for name in cell.split('|').filter(|n| !n.is_empty()) {
            let acc = by_name.entry(name.to_string()).or_insert(Acc {
                films: 0,
                revenue: 0.0,
                rating_sum: 0.0,
                rating_count: 0,
            });
            acc.films += 1;
            acc.revenue += revenue[i].unwrap_or(0.0);
            if let Some(r) = rating[i] {
                acc.rating_sum += r;
                acc.rating_count += 1;
            }
        }
    }

    let mut stats: Vec<DirectorStats> = by_name
        .into_iter()
        .map(|(name, acc)| DirectorStats {
            name,
            films: acc.films,
            total_revenue_musd: acc.revenue,
            mean_rating: (acc.rating_count > 0).then(|| acc.rating_sum / acc.rating_count as f64),
        })
        .collect();
    stats.sort_by(|a, b| b.total_revenue_musd.total_cmp(&a.total_revenue_musd));
    stats.truncate(top_n);
    stats
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
