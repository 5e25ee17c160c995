use std::path::PathBuf;

use clap::Parser;
use lab_followup::config::Config;
use lab_followup::db::DatabaseManager;

/// Delete every row from the follow-up report table
#[derive(Parser)]
#[command(name = "clear-report")]
struct Args {
    /// Path to a TOML config file (defaults to ./config.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;

    if !args.yes {
        println!(
            "⚠️  WARNING: This will delete ALL rows from {} in {}!",
            config.database.report_table,
            config.database.path.display()
        );
        println!("Press Enter to continue or Ctrl+C to cancel...");
        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;
    }

    println!("🗑️  Clearing report table...");
    let db = DatabaseManager::open(&config.database)?;
    let deleted = db.clear_report()?;

    println!("✅ Removed {} rows from {}", deleted, db.report_table());
    Ok(())
}
