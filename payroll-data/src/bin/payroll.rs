use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use payroll_core::db::{DbConfig, PayrollRepository, RepositoryRegistry};
use payroll_core::{PayrollPolicy, PayrollService};
use payroll_data::logging::init_tracing;
use payroll_data::{TaxSlabLoader, load_policy};
use payroll_db_sqlite::SqliteRepositoryFactory;
use tracing::info;

/// Payroll engine command line.
#[derive(Parser, Debug)]
#[command(name = "payroll")]
#[command(version, about, long_about = None)]
struct Args {
    /// Database location (file path, sqlx URL or `:memory:`)
    #[arg(short, long, default_value = "payroll.db")]
    db: String,

    /// Storage backend
    #[arg(short, long, default_value = "sqlite")]
    backend: String,

    /// TOML file overriding the default payroll policy
    #[arg(short, long)]
    policy: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load tax slab tables from a CSV file.
    ///
    /// Columns: fiscal_year, min_amount, max_amount (empty for the top
    /// slab), rate (percent), fixed_tax.
    LoadSlabs {
        #[arg(short, long)]
        file: PathBuf,

        /// Fiscal year to make the active table
        #[arg(short, long)]
        activate: Option<String>,
    },

    /// Generate payrolls for every active employee.
    Generate {
        #[arg(short, long)]
        month: u32,

        #[arg(short, long)]
        year: i32,

        /// Regenerate payrolls that already exist
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Print the tax summary for a month.
    TaxSummary {
        #[arg(short, long)]
        month: u32,

        #[arg(short, long)]
        year: i32,
    },
}

async fn open_repository(args: &Args) -> Result<Arc<dyn PayrollRepository>> {
    let mut registry = RepositoryRegistry::new();
    registry.register(Box::new(SqliteRepositoryFactory));

    if !registry.available_backends().contains(&args.backend.as_str()) {
        bail!(
            "Unknown backend '{}' (available: {})",
            args.backend,
            registry.available_backends().join(", ")
        );
    }

    let config = DbConfig {
        backend: args.backend.clone(),
        connection_string: args.db.clone(),
    };
    let repo = registry
        .create(&config)
        .await
        .with_context(|| format!("Failed to open database: {}", args.db))?;

    Ok(Arc::from(repo))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let policy = match &args.policy {
        Some(path) => load_policy(path)
            .with_context(|| format!("Failed to load policy: {}", path.display()))?,
        None => PayrollPolicy::default(),
    };

    let repo = open_repository(&args).await?;
    info!(backend = %args.backend, db = %args.db, "opened repository");

    match &args.command {
        Command::LoadSlabs { file, activate } => {
            let reader =
                File::open(file).with_context(|| format!("Failed to open: {}", file.display()))?;
            let records = TaxSlabLoader::parse(reader)
                .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;
            println!("Parsed {} records from CSV", records.len());

            let inserted = TaxSlabLoader::load(repo.as_ref(), &records, activate.as_deref())
                .await
                .context("Failed to load tax slabs into database")?;
            println!("Successfully loaded {} tax slabs into the database.", inserted);
        }
        Command::Generate { month, year, force } => {
            let service = PayrollService::new(repo, policy);
            let report = service
                .generate_monthly_payrolls(*month, *year, *force)
                .await
                .with_context(|| format!("Failed to generate payrolls for {}/{}", month, year))?;

            println!(
                "Payrolls for {}/{}: {} created, {} skipped, {} failed",
                report.month,
                report.year,
                report.created.len(),
                report.skipped.len(),
                report.failures.len()
            );
            for skipped in &report.skipped {
                println!(
                    "  skipped employee {} (payroll {} exists)",
                    skipped.employee_id, skipped.existing_payroll_id
                );
            }
            for failure in &report.failures {
                println!("  employee {} failed: {}", failure.employee_id, failure.error);
            }
            println!("Total earnings:   {}", report.totals.total_earnings);
            println!("Total income tax: {}", report.totals.total_income_tax);
            println!("Total net salary: {}", report.totals.total_net_salary);
        }
        Command::TaxSummary { month, year } => {
            let service = PayrollService::new(repo, policy);
            let summary = service
                .monthly_tax_summary(*month, *year)
                .await
                .with_context(|| format!("Failed to summarize {}/{}", month, year))?;

            println!("Tax summary for {}/{}", summary.month, summary.year);
            println!("Employees:        {}", summary.employee_count);
            println!("Total earnings:   {}", summary.total_earnings);
            println!("Taxable income:   {}", summary.total_taxable_income);
            println!("Income tax:       {}", summary.total_income_tax);
            println!("Net salary:       {}", summary.total_net_salary);
            for line in &summary.by_status {
                println!("  {:<10} {}", line.status.as_str(), line.count);
            }
        }
    }

    Ok(())
}
