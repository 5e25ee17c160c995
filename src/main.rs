use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use lab_followup::config::Config;
use lab_followup::db::DatabaseManager;
use lab_followup::logging;
use lab_followup::pipeline::{Pipeline, PipelineResult, RunOptions};

#[derive(Parser)]
#[command(name = "lab_followup")]
#[command(about = "Flags abnormal lab results and builds a patient follow-up contact list")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full batch: load, classify, gate, and write the report
    Run {
        /// Path to a TOML config file (defaults to ./config.toml if present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Compute the report without writing the table or the spreadsheet
        #[arg(long)]
        dry_run: bool,
        /// Replace existing report table rows instead of appending
        #[arg(long)]
        replace: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the configuration and the reference tables it points at
    CheckConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn print_summary(result: &PipelineResult) {
    println!("\n📊 Run {}:", result.run_id);
    println!("   Rows loaded: {}", result.stats.rows_in);
    println!("   Malformed input rows: {}", result.malformed_input_rows);
    println!(
        "   Rows after test-count gate: {}",
        result.stats.rows_after_test_count_gate
    );
    println!("   Unknown test rows: {}", result.stats.unknown_test_rows);
    println!("   Invalid rows excluded: {}", result.stats.invalid_rows);
    for (name, count) in &result.stats.classifications {
        println!("   {}: {}", name, count);
    }
    println!("   Patients retained: {}", result.stats.retained_patients);
    println!("   Patients without contacts: {}", result.stats.missing_contacts);
    println!("   Report rows: {}", result.stats.report_rows);
    if let Some(table) = &result.report_table {
        println!(
            "   Table {}: {} rows appended",
            table, result.database_rows_written
        );
    }
    if let Some(path) = &result.spreadsheet {
        println!("   Spreadsheet: {}", path);
    }
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            dry_run,
            replace,
            json,
        } => {
            let config = Config::load(config.as_deref()).context("Failed to load configuration")?;
            let mut db = DatabaseManager::open(&config.database).with_context(|| {
                format!("Failed to open database {}", config.database.path.display())
            })?;

            let pipeline = Pipeline::new(&config);
            match pipeline.run(&mut db, RunOptions { dry_run, replace }) {
                Ok(result) => {
                    info!(run_id = %result.run_id, "Pipeline finished");
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        print_summary(&result);
                    }
                }
                Err(e) => {
                    error!("Pipeline failed: {}", e);
                    println!("❌ Pipeline failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::CheckConfig { config } => {
            let config = Config::load(config.as_deref()).context("Configuration is invalid")?;
            println!("✅ Configuration is valid\n");
            println!("{}", toml::to_string_pretty(&config)?);

            let db = DatabaseManager::open(&config.database)?;
            let ranges = db
                .load_reference_ranges()
                .context("Reference table could not be loaded")?;
            let contacts = db
                .load_contacts()
                .context("Contact table could not be loaded")?;
            println!("   Reference ranges: {}", ranges.len());
            println!("   Patients with contacts: {}", contacts.len());
        }
    }
    Ok(())
}
