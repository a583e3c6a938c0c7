//! Database module for persisting readings and bills
//!
//! Uses SQLite for local storage of:
//! - Connections
//! - Meter readings
//! - Generated bills
//!
//! Callers depend on the `ReadingStore` / `BillStore` traits so the
//! billing and statistics code never sees the storage backend.

use crate::core::{
    Bill, Connection as WaterConnection, ConnectionStatus, Error, MeterReading, PaymentStatus,
    Result,
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage for meter readings
pub trait ReadingStore {
    /// Insert a reading, returning its new id
    fn insert_reading(&self, reading: &MeterReading) -> Result<i64>;
    /// Readings dated within `[start, end]`, oldest first
    fn get_readings(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<MeterReading>>;
    /// All readings for one connection, oldest first
    fn get_readings_for_connection(&self, connection_id: i64) -> Result<Vec<MeterReading>>;
    fn get_readings_count(&self) -> Result<i64>;
}

/// Storage for generated bills
pub trait BillStore {
    /// Insert a bill, returning its new id
    fn insert_bill(&self, bill: &Bill) -> Result<i64>;
    /// All bills, newest bill date first
    fn get_bills(&self) -> Result<Vec<Bill>>;
    fn get_bill_by_number(&self, bill_number: &str) -> Result<Option<Bill>>;
    /// Change the stored payment status of a bill
    fn update_payment_status(&self, bill_number: &str, status: PaymentStatus) -> Result<()>;
}

/// Database manager
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database in the user's data directory
    pub fn new() -> Result<Self> {
        let db_path = Self::db_path()?;
        Self::open(&db_path)
    }

    /// Open (or create) a database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        log::info!("Opened database at {}", path.display());
        Ok(db)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Get the database file path
    pub fn db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))?;

        let app_dir = data_dir.join("aquabill");
        std::fs::create_dir_all(&app_dir)?;

        Ok(app_dir.join("data.db"))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS connections (
                id INTEGER PRIMARY KEY,
                user_id INTEGER,
                status TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meter_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                connection_id INTEGER,
                reading_date TEXT NOT NULL,
                units_consumed REAL NOT NULL
            );

            CREATE TABLE IF NOT EXISTS bills (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bill_number TEXT NOT NULL UNIQUE,
                bill_date TEXT NOT NULL,
                due_date TEXT NOT NULL,
                units_consumed REAL NOT NULL,
                rate_per_unit REAL NOT NULL,
                base_amount REAL NOT NULL,
                tax_amount REAL NOT NULL,
                service_charge REAL NOT NULL,
                amount REAL NOT NULL,
                payment_status TEXT NOT NULL,
                meter_reading_id INTEGER,
                connection_id INTEGER,
                user_id INTEGER,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_readings_date ON meter_readings(reading_date);
            CREATE INDEX IF NOT EXISTS idx_readings_connection ON meter_readings(connection_id);
            "#,
        )?;

        Ok(())
    }

    /// Insert or replace a connection. The connection must carry an id.
    pub fn upsert_connection(&self, connection: &WaterConnection) -> Result<()> {
        let id = connection
            .id
            .ok_or_else(|| Error::InvalidInput("connection has no id".to_string()))?;

        self.conn.execute(
            r#"INSERT INTO connections (id, user_id, status) VALUES (?1, ?2, ?3)
               ON CONFLICT(id) DO UPDATE SET user_id = ?2, status = ?3"#,
            params![id, connection.user_id, connection.status.as_str()],
        )?;

        Ok(())
    }

    /// Get a connection by id
    pub fn get_connection(&self, id: i64) -> Result<Option<WaterConnection>> {
        let connection = self
            .conn
            .query_row(
                "SELECT id, user_id, status FROM connections WHERE id = ?1",
                params![id],
                |row| {
                    let status: String = row.get(2)?;
                    Ok(WaterConnection {
                        id: Some(row.get(0)?),
                        user_id: row.get(1)?,
                        status: ConnectionStatus::parse(&status)
                            .ok_or_else(|| conversion_error(2, "connection status", &status))?,
                    })
                },
            )
            .optional()?;

        Ok(connection)
    }

    /// All known connections
    pub fn get_connections(&self) -> Result<Vec<WaterConnection>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, user_id, status FROM connections ORDER BY id ASC")?;

        let connections = stmt
            .query_map([], |row| {
                let status: String = row.get(2)?;
                Ok(WaterConnection {
                    id: Some(row.get(0)?),
                    user_id: row.get(1)?,
                    status: ConnectionStatus::parse(&status)
                        .ok_or_else(|| conversion_error(2, "connection status", &status))?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(connections)
    }

    /// Store a reading and the bill issued for it as one unit.
    ///
    /// `issue` receives the reading with its new id. If either insert
    /// fails nothing is kept.
    pub fn record_reading_with_bill<F>(&self, reading: &MeterReading, issue: F) -> Result<(MeterReading, Bill)>
    where
        F: FnOnce(&MeterReading) -> Bill,
    {
        let tx = self.conn.unchecked_transaction()?;

        let mut stored = reading.clone();
        stored.id = Some(self.insert_reading(reading)?);

        let mut bill = issue(&stored);
        bill.id = Some(self.insert_bill(&bill)?);

        tx.commit()?;
        log::info!("Recorded reading {:?} with bill {}", stored.id, bill.bill_number);
        Ok((stored, bill))
    }

    /// All readings, oldest first
    pub fn get_all_readings(&self) -> Result<Vec<MeterReading>> {
        self.query_readings(
            "SELECT id, connection_id, reading_date, units_consumed
             FROM meter_readings ORDER BY reading_date ASC, id ASC",
            params![],
        )
    }

    fn query_readings<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<MeterReading>> {
        let mut stmt = self.conn.prepare(sql)?;
        let readings = stmt
            .query_map(params, reading_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(readings)
    }
}

impl ReadingStore for Database {
    fn insert_reading(&self, reading: &MeterReading) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO meter_readings (connection_id, reading_date, units_consumed) VALUES (?1, ?2, ?3)",
            params![
                reading.connection_id,
                reading.reading_date.format(DATE_FORMAT).to_string(),
                reading.effective_units()
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_readings(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<MeterReading>> {
        self.query_readings(
            "SELECT id, connection_id, reading_date, units_consumed
             FROM meter_readings
             WHERE reading_date >= ?1 AND reading_date <= ?2
             ORDER BY reading_date ASC, id ASC",
            params![
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string()
            ],
        )
    }

    fn get_readings_for_connection(&self, connection_id: i64) -> Result<Vec<MeterReading>> {
        self.query_readings(
            "SELECT id, connection_id, reading_date, units_consumed
             FROM meter_readings
             WHERE connection_id = ?1
             ORDER BY reading_date ASC, id ASC",
            params![connection_id],
        )
    }

    fn get_readings_count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM meter_readings", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl BillStore for Database {
    fn insert_bill(&self, bill: &Bill) -> Result<i64> {
        self.conn.execute(
            r#"INSERT INTO bills (
                   bill_number, bill_date, due_date, units_consumed, rate_per_unit,
                   base_amount, tax_amount, service_charge, amount, payment_status,
                   meter_reading_id, connection_id, user_id, created_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                bill.bill_number,
                bill.bill_date.format(DATE_FORMAT).to_string(),
                bill.due_date.format(DATE_FORMAT).to_string(),
                bill.units_consumed,
                bill.rate_per_unit,
                bill.base_amount,
                bill.tax_amount,
                bill.service_charge,
                bill.amount,
                bill.payment_status.as_str(),
                bill.meter_reading_id,
                bill.connection_id,
                bill.user_id,
                bill.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    fn get_bills(&self) -> Result<Vec<Bill>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, bill_number, bill_date, due_date, units_consumed, rate_per_unit,
                    base_amount, tax_amount, service_charge, amount, payment_status,
                    meter_reading_id, connection_id, user_id, created_at
             FROM bills ORDER BY bill_date DESC, id DESC",
        )?;

        let bills = stmt
            .query_map([], bill_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(bills)
    }

    fn get_bill_by_number(&self, bill_number: &str) -> Result<Option<Bill>> {
        let bill = self
            .conn
            .query_row(
                "SELECT id, bill_number, bill_date, due_date, units_consumed, rate_per_unit,
                        base_amount, tax_amount, service_charge, amount, payment_status,
                        meter_reading_id, connection_id, user_id, created_at
                 FROM bills WHERE bill_number = ?1",
                params![bill_number],
                bill_from_row,
            )
            .optional()?;

        Ok(bill)
    }

    fn update_payment_status(&self, bill_number: &str, status: PaymentStatus) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE bills SET payment_status = ?1 WHERE bill_number = ?2",
            params![status.as_str(), bill_number],
        )?;

        if updated == 0 {
            return Err(Error::NotFound(format!("bill {}", bill_number)));
        }

        log::info!("Bill {} marked {}", bill_number, status);
        Ok(())
    }
}

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<MeterReading> {
    Ok(MeterReading {
        id: Some(row.get(0)?),
        connection_id: row.get(1)?,
        reading_date: date_column(row, 2)?,
        units_consumed: row.get(3)?,
    })
}

fn bill_from_row(row: &Row<'_>) -> rusqlite::Result<Bill> {
    let status: String = row.get(10)?;
    let created_at: String = row.get(14)?;

    Ok(Bill {
        id: Some(row.get(0)?),
        bill_number: row.get(1)?,
        bill_date: date_column(row, 2)?,
        due_date: date_column(row, 3)?,
        units_consumed: row.get(4)?,
        rate_per_unit: row.get(5)?,
        base_amount: row.get(6)?,
        tax_amount: row.get(7)?,
        service_charge: row.get(8)?,
        amount: row.get(9)?,
        payment_status: PaymentStatus::parse(&status)
            .ok_or_else(|| conversion_error(10, "payment status", &status))?,
        meter_reading_id: row.get(11)?,
        connection_id: row.get(12)?,
        user_id: row.get(13)?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(14, Type::Text, Box::new(e)))?,
    })
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let text: String = row.get(idx)?;
    NaiveDate::parse_from_str(&text, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn conversion_error(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("invalid {}: {}", what, value).into(),
    )
}
