//! Report export — run summary JSON and flat CSV of the metric table.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::path::Path;

use crate::pipeline::PipelineRun;

/// Write the run summary as pretty JSON.
pub fn write_run_summary(path: &Path, run: &PipelineRun) -> Result<()> {
    let json = serde_json::to_string_pretty(run).context("failed to serialize run summary")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write run summary to {}", path.display()))?;
    Ok(())
}

const CSV_COLUMNS: [&str; 13] = [
    "id",
    "title",
    "release_date",
    "genres",
    "directors",
    "budget_musd",
    "revenue_musd",
    "profit_musd",
    "roi",
    "vote_count",
    "vote_average",
    "popularity",
    "runtime",
];

/// Export the metric table as CSV for external analysis tools.
///
/// Missing cells export as empty fields, never as placeholder text.
pub fn write_metrics_csv(path: &Path, table: &DataFrame) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create metrics CSV {}", path.display()))?;

    writer
        .write_record(CSV_COLUMNS)
        .context("failed to write CSV header")?;

    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let height = table.height();
    for i in 0..height {
        let mut row: Vec<String> = Vec::with_capacity(CSV_COLUMNS.len());
        for name in CSV_COLUMNS {
            let Ok(col) = table.column(name) else {
                row.push(String::new());
                continue;
            };
            let cell = match col.dtype() {
                DataType::UInt64 => col
                    .u64()
                    .ok()
                    .and_then(|ca| ca.get(i))
                    .map(|v| v.to_string()),
                DataType::UInt32 => col
                    .u32()
                    .ok()
                    .and_then(|ca| ca.get(i))
                    .map(|v| v.to_string()),
                DataType::Float64 => col
                    .f64()
                    .ok()
                    .and_then(|ca| ca.get(i))
                    .map(|v| format!("{v:.4}")),
                DataType::Date => col.date().ok().and_then(|ca| ca.get(i)).map(|days| {
                    (epoch + chrono::Duration::days(days as i64)).to_string()
                }),
                _ => col
                    .str()
                    .ok()
                    .and_then(|ca| ca.get(i))
                    .map(|s| s.to_string()),
            };
            row.push(cell.unwrap_or_default());
        }
        writer.write_record(&row).context("failed to write CSV row")?;
    }

    writer.flush().context("failed to flush metrics CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cells_export_as_empty_fields() {
        let table = DataFrame::new(vec![
            Column::new("id".into(), vec![1u64, 2]),
            Column::new("title".into(), vec!["a", "b"]),
            Column::new("budget_musd".into(), vec![Some(10.0), None]),
            Column::new("revenue_musd".into(), vec![Some(50.0), Some(20.0)]),
            Column::new("profit_musd".into(), vec![Some(40.0), None]),
            Column::new("roi".into(), vec![Some(5.0), None]),
        ])
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.csv");
        write_metrics_csv(&path, &table).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next().unwrap(), CSV_COLUMNS.join(","));

        let second_row = lines.nth(1).unwrap();
        assert!(second_row.starts_with("2,b,"));
        assert!(second_row.contains(",20.0000,"));
        // Null budget, profit, and roi become empty fields.
        assert!(second_row.ends_with(",,,"));

        let first_row: Vec<&str> = content.lines().nth(1).unwrap().split(',').collect();
        assert_eq!(first_row[5], "10.0000");
        assert_eq!(first_row[8], "5.0000");
    }
}
