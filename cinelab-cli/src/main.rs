//! CineLab CLI — staged movie-catalog ingestion and analysis.
//!
//! Commands:
//! - `extract` — fetch configured records from the catalog API
//! - `clean` — run the cleaning stage over the extract artifact
//! - `metrics` — derive profit/ROI over the clean artifact
//! - `analyze` — build and persist the analysis report
//! - `run` — all stages in order, then export the run summary and CSV
//! - `status` — report persisted stage artifacts
//!
//! Exit code is non-zero on fatal failure only; quality warnings do not
//! change it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cinelab_core::data::TmdbClient;
use cinelab_runner::config::resolve_credential;
use cinelab_runner::pipeline::{Pipeline, PipelineRun, StageStatus};
use cinelab_runner::report::{write_metrics_csv, write_run_summary};
use cinelab_runner::PipelineConfig;

#[derive(Parser)]
#[command(name = "cinelab", about = "CineLab CLI — movie catalog ingestion and analysis")]
struct Cli {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Record identifiers, overriding the config.
    #[arg(long, global = true, value_delimiter = ',')]
    ids: Option<Vec<u64>>,

    /// Artifact directory, overriding the config.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Re-run stages even when a complete artifact exists.
    #[arg(long, global = true, default_value_t = false)]
    force: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch configured records from the catalog API.
    Extract,
    /// Run the cleaning stage over the extract artifact.
    Clean,
    /// Derive profit and ROI over the clean artifact.
    Metrics,
    /// Build and persist the analysis report.
    Analyze,
    /// Run all stages in order and export the run summary.
    Run,
    /// Report persisted stage artifacts.
    Status,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let pipeline = Pipeline::new(&config);

    match cli.command {
        Commands::Extract => {
            let client = build_client(&config)?;
            let (_, report) = pipeline.run_extract(&client, cli.force)?;
            print_stage(&report);
        }
        Commands::Clean => {
            let (_, report) = pipeline.run_clean(cli.force)?;
            print_stage(&report);
        }
        Commands::Metrics => {
            let (_, report) = pipeline.run_metrics(cli.force)?;
            print_stage(&report);
        }
        Commands::Analyze => {
            let (_, report) = pipeline.run_analyze(cli.force)?;
            print_stage(&report);
        }
        Commands::Run => {
            let client = build_client(&config)?;
            let run = pipeline.run(&client, cli.force)?;

            std::fs::create_dir_all(&config.pipeline.report_dir)
                .context("failed to create report directory")?;
            let summary_path = config.pipeline.report_dir.join("run_summary.json");
            write_run_summary(&summary_path, &run)?;
            let (metric_table, _) = pipeline
                .store()
                .load_table(cinelab_core::data::Stage::Metrics)?;
            let csv_path = config.pipeline.report_dir.join("metrics.csv");
            write_metrics_csv(&csv_path, &metric_table)?;

            print_run(&run);
            println!("Run summary: {}", summary_path.display());
            println!("Metrics CSV: {}", csv_path.display());
        }
        Commands::Status => print_status(&pipeline),
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(ids) = &cli.ids {
        config.catalog.record_ids = ids.clone();
    }
    if let Some(dir) = &cli.data_dir {
        config.pipeline.data_dir = dir.clone();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_client(config: &PipelineConfig) -> Result<TmdbClient> {
    let api_key = resolve_credential().context(
        "set TMDB_API_KEY in the environment or a .env file",
    )?;
    let client = TmdbClient::new(config.client_config(api_key))
        .context("failed to build catalog client")?;
    Ok(client)
}

fn print_stage(report: &cinelab_runner::StageReport) {
    let status = match report.status {
        StageStatus::Skipped => "skipped (reused artifact)",
        StageStatus::Succeeded => "succeeded",
        StageStatus::Failed => "failed",
    };
    println!(
        "{}: {status} — {} rows, quality {:.1}%, {:.2}s",
        report.stage, report.rows, report.quality_score_pct, report.duration_secs
    );
}

fn print_run(run: &PipelineRun) {
    println!();
    println!("=== Pipeline Run ===");
    println!("Duration:       {:.2}s", run.duration_secs);
    if let Some(rate) = run.success_rate_pct {
        println!("Success rate:   {rate:.1}%");
    }
    println!();
    for stage in &run.stages {
        print_stage(stage);
    }

    if let Some(headline) = &run.headline {
        println!();
        println!("--- Headline ---");
        print_entry("Highest revenue", &headline.highest_revenue, "M");
        print_entry("Highest budget", &headline.highest_budget, "M");
        print_entry("Highest profit", &headline.highest_profit, "M");
        print_entry("Lowest profit", &headline.lowest_profit, "M");
        print_entry("Highest ROI", &headline.highest_roi, "x");
        print_entry("Lowest ROI", &headline.lowest_roi, "x");
        print_entry("Most voted", &headline.most_voted, " votes");
        print_entry("Highest rated", &headline.highest_rated, "");
        print_entry("Most popular", &headline.most_popular, "");
    }
    println!();
}

fn print_entry(label: &str, entry: &Option<cinelab_runner::RankedEntry>, unit: &str) {
    if let Some(e) = entry {
        println!("{label:<16} {} ({:.2}{unit})", e.title, e.value);
    }
}

fn print_status(pipeline: &Pipeline) {
    println!("{:<10} {:<10} {:>8} {:>10}  {}", "Stage", "State", "Rows", "Quality", "Written");
    println!("{}", "-".repeat(60));
    for (stage, meta) in pipeline.store().statuses() {
        match meta {
            Some(meta) if meta.complete => println!(
                "{:<10} {:<10} {:>8} {:>9.1}%  {}",
                stage.to_string(),
                "complete",
                meta.rows,
                meta.quality.score_pct,
                meta.written_at
            ),
            Some(_) => println!("{:<10} {:<10}", stage.to_string(), "incomplete"),
            None => println!("{:<10} {:<10}", stage.to_string(), "absent"),
        }
    }
}
