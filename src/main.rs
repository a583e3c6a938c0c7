//! AquaBill - Command line entry point
//!
//! Records meter readings, issues bills and prints consumption and
//! billing reports against the local SQLite store.

use anyhow::{Context, Result};
use aquabill_lib::billing::BillingCalculator;
use aquabill_lib::core::{Config, Connection, MeterReading, PaymentStatus};
use aquabill_lib::db::{BillStore, Database};
use aquabill_lib::stats;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "aquabill", version, about = "Water utility billing and consumption reports")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (defaults to the user data directory)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the cost breakdown for a number of units
    Preview {
        units: f64,
        #[arg(long)]
        json: bool,
    },
    /// Record a meter reading and issue its bill
    Record {
        #[arg(long)]
        connection: i64,
        #[arg(long)]
        units: f64,
        /// Reading date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Owner of the connection, stored when the connection is new
        #[arg(long)]
        user: Option<i64>,
    },
    /// Mark a bill as paid
    Pay { bill_number: String },
    /// List bills with their current status
    Bills {
        #[arg(long)]
        json: bool,
    },
    /// Consumption and billing statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .unwrap_or_else(|e| {
        log::warn!("Failed to load config, using defaults: {}", e);
        Config::default()
    });

    let calculator = BillingCalculator::new(config.tariff);
    let symbol = config.general.currency_symbol.as_str();

    match cli.command {
        Command::Preview { units, json } => {
            let breakdown = calculator.preview_bill(units);
            if json {
                println!("{}", serde_json::to_string_pretty(&breakdown)?);
            } else {
                println!("Units:          {:.2}", breakdown.units_consumed);
                println!("Rate:           {}{:.2}/unit", symbol, breakdown.rate_per_unit);
                println!("Base amount:    {}{:.2}", symbol, breakdown.base_amount);
                println!("Tax ({:.0}%):      {}{:.2}", breakdown.tax_rate * 100.0, symbol, breakdown.tax_amount);
                println!("Service charge: {}{:.2}", symbol, breakdown.service_charge);
                println!("Total:          {}{:.2}", symbol, breakdown.total_amount);
            }
        }
        Command::Record { connection, units, date, user } => {
            let db = open_db(cli.db.as_deref())?;

            let water_connection = match db.get_connection(connection)? {
                Some(existing) => existing,
                None => {
                    let new_connection = Connection {
                        id: Some(connection),
                        user_id: user,
                        status: aquabill_lib::core::ConnectionStatus::Active,
                    };
                    db.upsert_connection(&new_connection)?;
                    log::info!("Registered new connection {}", connection);
                    new_connection
                }
            };

            let reading = MeterReading::new(connection, date, units);
            let (_, bill) = db
                .record_reading_with_bill(&reading, |stored| {
                    calculator.generate_bill(stored, &water_connection)
                })
                .context("Failed to record reading")?;

            println!("{}", serde_json::to_string_pretty(&bill)?);
        }
        Command::Pay { bill_number } => {
            let db = open_db(cli.db.as_deref())?;
            db.update_payment_status(&bill_number, PaymentStatus::Paid)
                .with_context(|| format!("Could not mark {} as paid", bill_number))?;
            println!("{} marked as paid", bill_number);
        }
        Command::Bills { json } => {
            let db = open_db(cli.db.as_deref())?;
            let bills = db.get_bills()?;

            if json {
                println!("{}", serde_json::to_string_pretty(&bills)?);
            } else {
                println!("{:<26} {:<10} {:<10} {:>10}  {}", "Bill", "Date", "Due", "Amount", "Status");
                for bill in &bills {
                    println!(
                        "{:<26} {:<10} {:<10} {:>10.2}  {}",
                        bill.bill_number,
                        bill.bill_date,
                        bill.due_date,
                        bill.amount,
                        calculator.status_of(bill)
                    );
                }
            }
        }
        Command::Stats { json } => {
            let db = open_db(cli.db.as_deref())?;
            let readings = db.get_all_readings()?;
            let bills = db.get_bills()?;

            let consumption = stats::consumption_stats(&readings);
            let billing = stats::billing_stats(&bills);
            let monthly = stats::monthly_consumption(&readings);
            let series: Vec<f64> = monthly.iter().map(|m| m.units).collect();
            let trend = stats::trend(&series);
            let smoothed = stats::moving_average(&series, config.general.moving_average_window);

            if json {
                let report = serde_json::json!({
                    "consumption": consumption,
                    "billing": billing,
                    "monthly": monthly,
                    "moving_average": smoothed,
                    "growth_rate": stats::growth_rate(&series),
                    "trend": trend,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("=== Consumption ===");
                println!("  Readings:  {}", consumption.count);
                println!("  Total:     {:.2}", consumption.total);
                println!("  Mean:      {:.2}  Median: {:.2}  Std dev: {:.2}", consumption.mean, consumption.median, consumption.std_dev);
                println!("  Range:     {:.2} .. {:.2}  (Q1 {:.2}, Q3 {:.2})", consumption.min, consumption.max, consumption.q25, consumption.q75);
                println!();
                println!("=== Billing ===");
                println!("  Bills:     {}", billing.total_bills);
                println!("  Total:     {}{:.2}  (avg {}{:.2})", symbol, billing.total_amount, symbol, billing.average_amount);
                println!("  Paid:      {}{:.2}", symbol, billing.paid_amount);
                println!("  Unpaid:    {}{:.2}", symbol, billing.unpaid_amount);
                println!("  Overdue:   {}{:.2}", symbol, billing.overdue_amount);
                println!("  Paid rate: {:.0}%", billing.payment_rate);
                println!();
                println!("=== Monthly ===");
                for month in &monthly {
                    println!("  {}  {:>10.2}  ({} readings)", month.month, month.units, month.readings);
                }
                println!(
                    "  Trend: {} (slope {:.2}, strength {:.3}), growth {:.2}%",
                    trend.trend.as_str(),
                    trend.slope,
                    trend.strength,
                    stats::growth_rate(&series)
                );
            }
        }
        Command::Config => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => Config::config_path()?,
            };
            println!("# {}", path.display());
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn open_db(path: Option<&Path>) -> Result<Database> {
    let db = match path {
        Some(path) => Database::open(path),
        None => Database::new(),
    }
    .context("Failed to initialize database")?;
    Ok(db)
}
