use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod bulk;
mod calc;
mod chemistry;
mod config;
mod db;
mod models;
mod report;
mod store;
mod validation;

use config::AppConfig;
use db::PgStore;

#[derive(Parser)]
#[command(name = "wastewater-mrv")]
#[command(about = "CO2 removal MRV calculations for wastewater treatment plants", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo ops data and calcium readings
    Seed,
    /// Import normalized plant operations rows from a CSV file
    ImportOps {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import normalized lab readings from a CSV file
    ImportReadings {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Calculate and store CO2 removal for every ops date in range
    Calculate {
        #[arg(long = "plant", required = true)]
        plants: Vec<String>,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        /// Print the summaries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the derivation for one plant-day without storing it
    Day {
        #[arg(long)]
        plant: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Generate a markdown report from stored calculations
    Report {
        #[arg(long)]
        plant: String,
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    info!(database = %config.redacted_database_url(), "connecting");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgStore::new(pool);

    match cli.command {
        Commands::InitDb => {
            db::init_db(store.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(store.pool()).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportOps { csv } => {
            let inserted = db::import_ops_csv(store.pool(), &csv).await?;
            println!("Inserted {inserted} ops rows from {}.", csv.display());
        }
        Commands::ImportReadings { csv } => {
            let inserted = db::import_readings_csv(store.pool(), &csv).await?;
            println!("Inserted {inserted} lab readings from {}.", csv.display());
        }
        Commands::Calculate {
            plants,
            start,
            end,
            json,
        } => {
            let mut summaries = Vec::new();
            for plant_id in plants.iter() {
                let (_, summary) =
                    bulk::bulk_calculate(&store, &config.calc, plant_id, start, end)
                        .await
                        .with_context(|| format!("bulk calculation failed for {plant_id}"))?;
                summaries.push(summary);
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
                return Ok(());
            }

            for summary in summaries.iter() {
                println!("=== {} ===", summary.plant_id);
                println!(
                    "{} dates considered, {} calculated, {} skipped",
                    summary.total_dates_considered,
                    summary.calculated_count,
                    summary.skipped_count
                );
                for (flag, count) in summary.quality_flags.iter() {
                    println!("- {flag}: {count}");
                }
                for (flag, count) in summary.skip_reasons.iter() {
                    println!("- skipped ({flag}): {count}");
                }
                println!("  Total CO2: {:.2} MT", summary.total_co2_removed_metric_tons);
                println!("  Avg daily: {:.4} MT/day", summary.average_daily_co2_removed());
            }

            let grand_total: f64 = summaries
                .iter()
                .map(|summary| summary.total_co2_removed_metric_tons)
                .sum();
            println!("=== Grand Total CO2 Removed: {grand_total:.2} MT ===");
        }
        Commands::Day { plant, date } => {
            match calc::calculate(&store, &config.calc, &plant, date).await? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No calculation for {plant} on {date}; see warnings above."),
            }
        }
        Commands::Report {
            plant,
            start,
            end,
            out,
        } => {
            let records = db::fetch_calculations(store.pool(), &plant, start, end).await?;
            let report = report::build_report(&plant, start, end, &records);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
