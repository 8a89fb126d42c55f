// Household API - maintenance CLI
//
// The HTTP API lives in the `household-server` binary; this tool covers the
// offline chores: schema setup, statement previews and token cleanup.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use household_api::db::{self, users};
use household_api::logging::init_logging;
use household_api::{decode_statement, parse_statement, BankType};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "household", about = "Maintenance commands for the household API database")]
struct Cli {
    /// SQLite database file
    #[arg(long, env = "DATABASE_PATH", default_value = "household.db", global = true)]
    database_path: PathBuf,

    #[arg(long, env = "LOG_LEVEL", default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database file and every table, index and view
    InitDb,
    /// Parse a bank statement and print what an import would see
    PreviewCsv {
        /// MBANK or SANTANDER
        #[arg(long)]
        bank: String,
        file: PathBuf,
    },
    /// Delete expired and revoked refresh tokens
    CleanupTokens,
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level, false);

    match cli.command {
        Command::InitDb => run_init_db(&cli.database_path),
        Command::PreviewCsv { bank, file } => run_preview(&bank, &file),
        Command::CleanupTokens => run_cleanup(&cli.database_path),
    }
}

fn run_init_db(path: &Path) -> Result<()> {
    println!("🗄️  Household API - Database Setup");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!("\n🔧 Setting up database...");
    let conn = db::open_db(path)?;

    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    println!("✓ Database ready at {}", path.display());
    println!("✓ {} tables, WAL mode", tables);

    Ok(())
}

fn run_preview(bank: &str, file: &Path) -> Result<()> {
    let bank: BankType = bank.parse()?;
    println!("📂 Previewing {} statement: {}", bank.name(), file.display());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let content = decode_statement(&bytes);
    let transactions = parse_statement(bank, &content)?;

    if transactions.is_empty() {
        println!("⚠️  No transactions found. Check that the bank type matches the file.");
        return Ok(());
    }

    let mut income = 0.0;
    let mut expense = 0.0;
    for tx in &transactions {
        if tx.amount >= 0.0 {
            income += tx.amount;
        } else {
            expense += tx.amount;
        }
        println!("{}  {:>12.2}  {}", tx.date, tx.amount, tx.title);
    }

    println!("\n✓ {} transactions", transactions.len());
    println!("   Income:  {:.2}", income);
    println!("   Expense: {:.2}", expense.abs());
    Ok(())
}

fn run_cleanup(path: &Path) -> Result<()> {
    println!("🧹 Cleaning up refresh tokens...");
    let conn = db::open_db(path)?;
    let deleted = users::cleanup_refresh_tokens(&conn)?;
    println!("✓ Removed {} expired or revoked tokens", deleted);
    Ok(())
}
