//! AquaBill - Demo CLI
//!
//! Walks through the billing engine end to end on sample data:
//! tariff setup, bill generation, SQLite persistence and reports.

use aquabill_lib::billing::BillingCalculator;
use aquabill_lib::core::{Connection, MeterReading, PaymentStatus, TariffConfig};
use aquabill_lib::db::{BillStore, Database, ReadingStore};
use aquabill_lib::stats;
use chrono::{Datelike, NaiveDate};

/// (connection, user, year, month, units)
const SAMPLE_READINGS: &[(i64, i64, i32, u32, f64)] = &[
    (101, 1, 2024, 1, 120.0),
    (102, 2, 2024, 1, 85.5),
    (101, 1, 2024, 2, 132.0),
    (102, 2, 2024, 2, 90.25),
    (101, 1, 2024, 3, 141.5),
    (102, 2, 2024, 3, 78.0),
    (103, 3, 2024, 3, 210.0),
    (101, 1, 2024, 4, 150.0),
    (102, 2, 2024, 4, 95.75),
    (103, 3, 2024, 4, 198.5),
];

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("==============================================");
    println!("   AquaBill - Demo CLI");
    println!("==============================================\n");

    // 1. Tariff
    println!("[1/4] Initializing Billing Calculator...");
    let calculator = BillingCalculator::new(TariffConfig::default());
    let tariff = calculator.tariff();
    println!("      Rate:           {:.2}/unit", tariff.rate_per_unit);
    println!("      Tax:            {:.0}%", tariff.tax_rate * 100.0);
    println!("      Service charge: {:.2}", tariff.service_charge);
    println!("      Due after:      {} days\n", tariff.due_days);

    // 2. Database
    println!("[2/4] Initializing SQLite Database (in memory)...");
    let db = match Database::open_in_memory() {
        Ok(d) => {
            println!("      Database initialized successfully\n");
            Some(d)
        }
        Err(e) => {
            println!("      Warning: Could not initialize database: {}", e);
            println!("      Continuing without persistence...\n");
            None
        }
    };

    // 3. Bills
    println!("[3/4] Generating bills...\n");
    println!("------------------------------------------------------------");
    println!("  Conn |    Date    |  Units  |   Base   |   Tax   |  Total");
    println!("------------------------------------------------------------");

    let mut readings = Vec::new();
    let mut connections: Vec<Connection> = Vec::new();

    for &(connection_id, user_id, year, month, units) in SAMPLE_READINGS {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, 15) else {
            continue;
        };
        let connection = Connection::new(connection_id, user_id);
        let mut reading = MeterReading::new(connection_id, date, units);

        if let Some(ref database) = db {
            if let Err(e) = database.upsert_connection(&connection) {
                eprintln!("Error storing connection: {}", e);
            }
            match database.insert_reading(&reading) {
                Ok(id) => reading.id = Some(id),
                Err(e) => eprintln!("Error storing reading: {}", e),
            }
        }

        if !connections.contains(&connection) {
            connections.push(connection);
        }
        readings.push(reading);
    }

    let mut bills = calculator.generate_bills(&readings, &connections);

    for bill in &mut bills {
        // Settle everything but the latest month, leave one early bill overdue
        if bill.bill_date.month() < 4 {
            bill.payment_status = if bill.connection_id == Some(102) && bill.bill_date.month() == 2 {
                PaymentStatus::Overdue
            } else {
                PaymentStatus::Paid
            };
        }

        println!(
            "  {:>4} | {} | {:>7.2} | {:>8.2} | {:>7.2} | {:>8.2}",
            bill.connection_id.unwrap_or_default(),
            bill.bill_date,
            bill.units_consumed,
            bill.base_amount,
            bill.tax_amount,
            bill.amount
        );

        if let Some(ref database) = db {
            if let Err(e) = database.insert_bill(bill) {
                eprintln!("Error storing bill: {}", e);
            }
        }
    }
    println!("------------------------------------------------------------\n");

    // 4. Reports
    println!("[4/4] Reports\n");

    let consumption = stats::consumption_stats(&readings);
    println!("=== Consumption ===\n");
    println!("  Readings:  {}", consumption.count);
    println!("  Total:     {:.2} units", consumption.total);
    println!("  Mean:      {:.2}   Median: {:.2}", consumption.mean, consumption.median);
    println!("  Std dev:   {:.2}", consumption.std_dev);
    println!("  Q1 / Q3:   {:.2} / {:.2}\n", consumption.q25, consumption.q75);

    let billing = stats::billing_stats(&bills);
    println!("=== Billing ===\n");
    println!("  Bills:     {}", billing.total_bills);
    println!("  Total:     {:.2}", billing.total_amount);
    println!("  Paid:      {:.2}", billing.paid_amount);
    println!("  Unpaid:    {:.2}", billing.unpaid_amount);
    println!("  Overdue:   {:.2}", billing.overdue_amount);
    println!("  Paid rate: {:.0}%\n", billing.payment_rate);

    println!("=== Monthly trend ===\n");
    let monthly = stats::monthly_consumption(&readings);
    let series: Vec<f64> = monthly.iter().map(|m| m.units).collect();
    for month in &monthly {
        println!("  {}  {:>8.2}", month.month, month.units);
    }
    let trend = stats::trend(&series);
    println!(
        "\n  Direction: {} (slope {:.2}, strength {:.3})",
        trend.trend.as_str(),
        trend.slope,
        trend.strength
    );
    println!("  Growth:    {:.2}%", stats::growth_rate(&series));
    println!("  3-month moving average: {:?}\n", stats::moving_average(&series, 3));

    let first_connection: Vec<f64> = readings
        .iter()
        .filter(|r| r.connection_id == Some(101))
        .map(|r| r.units_consumed)
        .collect();
    let months: Vec<f64> = readings
        .iter()
        .filter(|r| r.connection_id == Some(101))
        .map(|r| f64::from(r.reading_date.month()))
        .collect();
    println!(
        "  Connection 101 month/usage correlation: {:.3}\n",
        stats::correlation(&months, &first_connection)
    );

    println!("=== Bill status (today) ===\n");
    for bill in bills.iter().rev().take(3) {
        println!("  {}  due {}  {}", bill.bill_number, bill.due_date, calculator.status_of(bill));
    }
    println!();

    if let Some(ref database) = db {
        println!("=== Database Test ===\n");
        match (database.get_readings_count(), database.get_bills()) {
            (Ok(count), Ok(stored)) => {
                println!("  Readings stored: {}", count);
                println!("  Bills stored:    {}", stored.len());
                if let Some(latest) = stored.first() {
                    println!("  Latest bill:     {} ({:.2})", latest.bill_number, latest.amount);
                }
            }
            (Err(e), _) | (_, Err(e)) => println!("  Error querying database: {}", e),
        }
        println!();
    }

    println!("==============================================");
    println!("   Demo complete");
    println!("==============================================\n");
}
