//! Data quality reporting: per-column profiles, quality score, outlier flags.
//!
//! The quality score is the mean percentage of non-missing cells across the
//! required columns. A required column that is present but fully null only
//! lowers the score; a required column missing from the table schema is a
//! SchemaError (fatal to the stage that produced the table).

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("required column '{0}' is missing from the table")]
    MissingColumn(String),
}

/// Missing-value profile for one column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub missing_pct: f64,
    /// Cells that failed type coercion during cleaning and were set missing.
    pub coercion_errors: usize,
}

/// One value flagged as an outlier. Flags are reported, never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierFlag {
    pub id: u64,
    pub title: Option<String>,
    pub column: String,
    pub value: f64,
}

/// Per-stage-artifact quality summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub rows: usize,
    pub columns: Vec<ColumnProfile>,
    /// Mean non-missing percentage over the required columns.
    pub score_pct: f64,
    pub outliers: Vec<OutlierFlag>,
}

/// Verify every required column exists in the table schema.
pub fn check_required_columns(table: &DataFrame, required: &[&str]) -> Result<(), SchemaError> {
    let schema = table.schema();
    for name in required {
        if !schema.contains(name) {
            return Err(SchemaError::MissingColumn(name.to_string()));
        }
    }
    Ok(())
}

/// Mean percentage of non-missing cells across the required columns.
pub fn quality_score(table: &DataFrame, required: &[&str]) -> f64 {
    if table.height() == 0 || required.is_empty() {
        return 0.0;
    }
    let rows = table.height() as f64;
    let mut total = 0.0;
    for name in required {
        let non_missing = match table.column(name) {
            Ok(col) => (table.height() - col.null_count()) as f64,
            Err(_) => 0.0,
        };
        total += non_missing / rows * 100.0;
    }
    total / required.len() as f64
}

/// Build the full report for a table. Fails if a required column is absent.
pub fn report_for(
    table: &DataFrame,
    required: &[&str],
    coercion_errors: &BTreeMap<String, usize>,
) -> Result<QualityReport, SchemaError> {
    check_required_columns(table, required)?;

    let rows = table.height();
    let columns = table
        .get_columns()
        .iter()
        .map(|col| ColumnProfile {
            name: col.name().to_string(),
            missing_pct: if rows == 0 {
                100.0
            } else {
                col.null_count() as f64 / rows as f64 * 100.0
            },
            coercion_errors: coercion_errors
                .get(col.name().as_str())
                .copied()
                .unwrap_or(0),
        })
        .collect();

    Ok(QualityReport {
        rows,
        columns,
        score_pct: quality_score(table, required),
        outliers: Vec::new(),
    })
}

/// Flag rows whose value in `column` sits more than `k` interquartile ranges
/// outside the quartiles. Needs at least four present values to say anything.
pub fn iqr_outliers(table: &DataFrame, column: &str, k: f64) -> Vec<OutlierFlag> {
    let Ok(col) = table.column(column) else {
        return Vec::new();
    };
    let Ok(values) = col.f64() else {
        return Vec::new();
    };

    let mut present: Vec<f64> = (0..values.len()).filter_map(|i| values.get(i)).collect();
    if present.len() < 4 {
        return Vec::new();
    }
    present.sort_by(|a, b| a.total_cmp(b));

    let q1 = percentile(&present, 0.25);
    let q3 = percentile(&present, 0.75);
    let iqr = q3 - q1;
    if iqr <= 0.0 {
        return Vec::new();
    }
    let lo = q1 - k * iqr;
    let hi = q3 + k * iqr;

    let ids = table.column("id").ok().and_then(|c| c.u64().ok());
    let titles = table.column("title").ok().and_then(|c| c.str().ok());

    let mut flags = Vec::new();
    for i in 0..values.len() {
        let Some(value) = values.get(i) else { continue };
        if value < lo || value > hi {
            flags.push(OutlierFlag {
                id: ids.and_then(|ca| ca.get(i)).unwrap_or(0),
                title: titles.and_then(|ca| ca.get(i)).map(|s| s.to_string()),
                column: column.to_string(),
                value,
            });
        }
    }
    flags
}

/// Linear-interpolation percentile over a sorted slice.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (pos - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(budget: Vec<Option<f64>>, revenue: Vec<Option<f64>>) -> DataFrame {
        let n = budget.len();
        DataFrame::new(vec![
            Column::new("id".into(), (1..=n as u64).collect::<Vec<_>>()),
            Column::new(
                "title".into(),
                (1..=n).map(|i| format!("m{i}")).collect::<Vec<_>>(),
            ),
            Column::new("budget".into(), budget),
            Column::new("revenue".into(), revenue),
        ])
        .unwrap()
    }

    #[test]
    fn fully_populated_required_columns_score_100() {
        let df = table(vec![Some(1.0), Some(2.0)], vec![Some(3.0), Some(4.0)]);
        let score = quality_score(&df, &["budget", "revenue"]);
        assert!((score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn one_fully_null_column_of_two_scores_50() {
        let df = table(vec![Some(1.0), Some(2.0)], vec![None, None]);
        let score = quality_score(&df, &["budget", "revenue"]);
        assert!((score - 50.0).abs() < 1e-9);
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let df = table(vec![Some(1.0)], vec![Some(2.0)]);
        let result = check_required_columns(&df, &["budget", "vote_average"]);
        assert!(matches!(result, Err(SchemaError::MissingColumn(c)) if c == "vote_average"));
    }

    #[test]
    fn report_profiles_every_column() {
        let df = table(vec![Some(1.0), None], vec![Some(3.0), Some(4.0)]);
        let report = report_for(&df, &["budget", "revenue"], &BTreeMap::new()).unwrap();
        assert_eq!(report.rows, 2);
        let budget = report.columns.iter().find(|c| c.name == "budget").unwrap();
        assert!((budget.missing_pct - 50.0).abs() < 1e-9);
        assert!((report.score_pct - 75.0).abs() < 1e-9);
    }

    #[test]
    fn iqr_flags_extreme_values_only() {
        let mut budget: Vec<Option<f64>> = (1..=11).map(|i| Some(i as f64)).collect();
        budget.push(Some(1000.0));
        let revenue = vec![Some(0.0); 12];
        let df = table(budget, revenue);

        let flags = iqr_outliers(&df, "budget", 3.0);
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].value, 1000.0);
        assert_eq!(flags[0].column, "budget");
    }

    #[test]
    fn iqr_needs_spread_and_enough_values() {
        let df = table(vec![Some(5.0); 6], vec![Some(1.0); 6]);
        assert!(iqr_outliers(&df, "budget", 3.0).is_empty());

        let df = table(vec![Some(1.0), Some(2.0)], vec![None, None]);
        assert!(iqr_outliers(&df, "budget", 3.0).is_empty());
    }
}
