//! Financial metric derivation — pure column math over the cleaned table.
//!
//! Profit is computed whenever budget and revenue are both present. ROI is
//! deliberately withheld below the reliability threshold: low-budget entries
//! have unreliable reporting and would distort ranking statistics. ROI is
//! never infinite and never NaN — any disqualifying input leaves it null.

use crate::quality::SchemaError;
use crate::table::CLEAN_REQUIRED;
use polars::prelude::*;
use thiserror::Error;

/// Column added for revenue minus budget, in millions.
pub const PROFIT: &str = "profit_musd";

/// Column added for revenue over budget, as a multiplier.
pub const ROI: &str = "roi";

#[derive(Debug, Error)]
pub enum MetricError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("table error: {0}")]
    Table(String),
}

/// Derive profit and ROI over a cleaned table, preserving row order.
///
/// `roi_budget_floor` is the minimum budget (in millions) for ROI to be
/// trusted; profit has no threshold.
pub fn derive_metrics(clean: &DataFrame, roi_budget_floor: f64) -> Result<DataFrame, MetricError> {
    crate::quality::check_required_columns(clean, &CLEAN_REQUIRED)?;

    let table_err = |e: PolarsError| MetricError::Table(e.to_string());

    let budgets = clean
        .column("budget_musd")
        .map_err(table_err)?
        .f64()
        .map_err(table_err)?;
    let revenues = clean
        .column("revenue_musd")
        .map_err(table_err)?
        .f64()
        .map_err(table_err)?;

    let rows = clean.height();
    let mut profit: Vec<Option<f64>> = Vec::with_capacity(rows);
    let mut roi: Vec<Option<f64>> = Vec::with_capacity(rows);

    for i in 0..rows {
        let budget = budgets.get(i);
        let revenue = revenues.get(i);

        profit.push(match (budget, revenue) {
            (Some(b), Some(r)) => Some(r - b),
            _ => None,
        });
        roi.push(match (budget, revenue) {
            (Some(b), Some(r)) if b > 0.0 && b >= roi_budget_floor => Some(r / b),
            _ => None,
        });
    }

    let mut table = clean.clone();
    table
        .with_column(Column::new(PROFIT.into(), profit))
        .map_err(table_err)?;
    table
        .with_column(Column::new(ROI.into(), roi))
        .map_err(table_err)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_table(budget: Vec<Option<f64>>, revenue: Vec<Option<f64>>) -> DataFrame {
        let n = budget.len();
        DataFrame::new(vec![
            Column::new("id".into(), (1..=n as u64).collect::<Vec<_>>()),
            Column::new(
                "title".into(),
                (1..=n).map(|i| format!("m{i}")).collect::<Vec<_>>(),
            ),
            Column::new("budget_musd".into(), budget),
            Column::new("revenue_musd".into(), revenue),
        ])
        .unwrap()
    }

    #[test]
    fn profit_needs_both_fields() {
        // Budget unreported (nulled during cleaning), revenue 500.
        let df = clean_table(vec![None], vec![Some(500.0)]);
        let out = derive_metrics(&df, 10.0).unwrap();

        assert_eq!(out.column(PROFIT).unwrap().f64().unwrap().get(0), None);
        assert_eq!(out.column(ROI).unwrap().f64().unwrap().get(0), None);
    }

    #[test]
    fn roi_withheld_below_reliability_threshold() {
        let df = clean_table(vec![Some(5.0)], vec![Some(50.0)]);
        let out = derive_metrics(&df, 10.0).unwrap();

        assert_eq!(out.column(PROFIT).unwrap().f64().unwrap().get(0), Some(45.0));
        assert_eq!(out.column(ROI).unwrap().f64().unwrap().get(0), None);
    }

    #[test]
    fn roi_present_at_and_above_threshold() {
        let df = clean_table(vec![Some(10.0), Some(237.0)], vec![Some(50.0), Some(2923.7)]);
        let out = derive_metrics(&df, 10.0).unwrap();

        let roi = out.column(ROI).unwrap().f64().unwrap();
        assert_eq!(roi.get(0), Some(5.0));
        assert!((roi.get(1).unwrap() - 12.336).abs() < 0.01);
    }

    #[test]
    fn zero_budget_never_divides() {
        // A zero that slipped past cleaning still must not produce inf/NaN.
        let df = clean_table(vec![Some(0.0)], vec![Some(500.0)]);
        let out = derive_metrics(&df, 0.0).unwrap();

        assert_eq!(out.column(ROI).unwrap().f64().unwrap().get(0), None);
    }

    #[test]
    fn missing_required_column_is_schema_error() {
        let df = clean_table(vec![Some(1.0)], vec![Some(2.0)]);
        let df = df.drop("revenue_musd").unwrap();
        assert!(matches!(
            derive_metrics(&df, 10.0),
            Err(MetricError::Schema(_))
        ));
    }
}
