use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

mod config;
mod error;
mod extract;
mod load;
mod logging;
mod mappings;
mod pipeline;
mod table;

use crate::config::Config;
use crate::pipeline::RunOptions;

#[derive(Parser)]
#[command(name = "northwind-etl")]
#[command(about = "Batch ETL pipeline enriching customer records with weather and region data")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: extract, enrich, check, aggregate, load
    Run {
        /// Disable the weather enrichment stage even if a credential is set
        #[arg(long)]
        skip_weather: bool,
        /// Append rows with null key fields to the DQ report
        #[arg(long)]
        log_null_rows: bool,
    },
    /// Extract the source record sets into the staging directory
    Extract,
    /// Summarize a previously staged enriched record set by region
    Aggregate,
}

fn fmt_temp(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}°C", v),
        None => "n/a".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Run {
            skip_weather,
            log_null_rows,
        } => {
            let options = RunOptions {
                skip_weather,
                log_null_rows,
            };
            let summary = pipeline::run(&config, &options).await?;

            println!("\n📊 Pipeline Results:");
            println!("   Customers: {}", summary.customers);
            println!("   Orders: {}", summary.orders);
            println!("   Enriched rows: {}", summary.enriched_rows);
            match &summary.weather {
                Some(stats) => {
                    println!(
                        "   Weather lookups: {} attempted, {} succeeded, {} failed, {} skipped",
                        stats.attempted, stats.succeeded, stats.failed, stats.skipped
                    );
                }
                None => println!("   Weather stage: disabled"),
            }
            for s in &summary.summaries {
                println!(
                    "   {}: customers={}, avg={}, min={}, max={}",
                    s.region.as_deref().unwrap_or("(no region)"),
                    s.customers,
                    fmt_temp(s.avg_temp_c),
                    fmt_temp(s.min_temp_c),
                    fmt_temp(s.max_temp_c)
                );
            }
            println!(
                "   Data quality: {}",
                if summary.dq_passed { "passed" } else { "FAILED" }
            );
            println!("   Report: {}", config.dq_report_path().display());

            if !summary.dq_passed {
                // the invoking orchestration layer decides what to do with
                // the failure; we only signal it
                error!("Data-quality gate failed, see the report log");
                std::process::exit(1);
            }
        }
        Commands::Extract => {
            let (customers, orders) = pipeline::extract_to_staging(&config)?;
            info!("Extraction complete");
            println!(
                "Extracted {} customers and {} orders into {}",
                customers,
                orders,
                config.staging_dir().display()
            );
        }
        Commands::Aggregate => {
            let summaries = pipeline::aggregate_from_staging(&config)?;
            println!("Wrote {} region summaries", summaries.len());
        }
    }

    Ok(())
}
