//! Billing engine for water consumption
//!
//! Turns meter readings into bills and unit counts into cost previews.
//! Every monetary field is rounded to 2 decimals on its own before it
//! takes part in the next sum, so totals match previously issued bills
//! to the cent.

mod clock;

pub use clock::{Clock, FixedClock, SystemClock};

use crate::core::{
    coerce_number, round2, Bill, BillBreakdown, BillStatus, Connection, MeterReading, PaymentStatus,
    TariffConfig,
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Days before the due date during which an unpaid bill is "due soon"
const DUE_SOON_DAYS: f64 = 7.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Process-wide bill number sequence
static BILL_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// Billing calculator bound to one tariff
pub struct BillingCalculator {
    tariff: TariffConfig,
    clock: Box<dyn Clock>,
}

impl BillingCalculator {
    /// Create a new calculator with the given tariff
    pub fn new(tariff: TariffConfig) -> Self {
        Self::with_clock(tariff, Box::new(SystemClock))
    }

    /// Create a calculator reading time from a custom clock
    pub fn with_clock(tariff: TariffConfig, clock: Box<dyn Clock>) -> Self {
        Self { tariff, clock }
    }

    pub fn tariff(&self) -> &TariffConfig {
        &self.tariff
    }

    /// Generate a bill for a reading.
    ///
    /// Never fails. Negative consumption is not clamped and yields a
    /// negative amount. Missing connection ids stay `None` on the bill.
    pub fn generate_bill(&self, reading: &MeterReading, connection: &Connection) -> Bill {
        let units = reading.effective_units();
        let breakdown = self.preview_bill(units);
        let created_at = self.clock.now();
        let bill_date = reading.reading_date;

        let bill = Bill {
            id: None,
            bill_number: next_bill_number(created_at),
            bill_date,
            due_date: add_days(bill_date, self.tariff.due_days),
            units_consumed: units,
            rate_per_unit: breakdown.rate_per_unit,
            base_amount: breakdown.base_amount,
            tax_amount: breakdown.tax_amount,
            service_charge: breakdown.service_charge,
            amount: breakdown.total_amount,
            payment_status: PaymentStatus::Unpaid,
            meter_reading_id: reading.id,
            connection_id: connection.id.or(reading.connection_id),
            user_id: connection.user_id,
            created_at,
        };

        log::debug!(
            "Generated bill {} for {} units: {:.2}",
            bill.bill_number,
            units,
            bill.amount
        );

        bill
    }

    /// Generate one bill per reading, matching connections by id.
    ///
    /// Readings whose connection is unknown still get a bill, with no
    /// connection or user attached.
    pub fn generate_bills(&self, readings: &[MeterReading], connections: &[Connection]) -> Vec<Bill> {
        let by_id: HashMap<i64, &Connection> = connections
            .iter()
            .filter_map(|c| c.id.map(|id| (id, c)))
            .collect();

        let detached = Connection {
            id: None,
            user_id: None,
            status: crate::core::ConnectionStatus::Active,
        };

        readings
            .iter()
            .map(|reading| {
                let connection = match reading.connection_id.and_then(|id| by_id.get(&id)) {
                    Some(c) => *c,
                    None => {
                        log::warn!(
                            "No connection found for reading {:?}, billing without one",
                            reading.id
                        );
                        &detached
                    }
                };
                self.generate_bill(reading, connection)
            })
            .collect()
    }

    /// Cost breakdown for a number of units, rounded the same way as bills.
    /// Non-finite units count as zero.
    pub fn preview_bill(&self, units_consumed: f64) -> BillBreakdown {
        let units_consumed = coerce_number(units_consumed);
        let base_amount = round2(units_consumed * self.tariff.rate_per_unit);
        let tax_amount = round2(base_amount * self.tariff.tax_rate);
        let total_amount = round2(base_amount + tax_amount + self.tariff.service_charge);

        BillBreakdown {
            units_consumed,
            rate_per_unit: self.tariff.rate_per_unit,
            base_amount,
            service_charge: self.tariff.service_charge,
            tax_rate: self.tariff.tax_rate,
            tax_amount,
            total_amount,
        }
    }

    /// Display status of a bill as of the calculator's clock
    pub fn status_of(&self, bill: &Bill) -> BillStatus {
        derive_status(bill.due_date, bill.payment_status, self.clock.now())
    }
}

impl Default for BillingCalculator {
    fn default() -> Self {
        Self::new(TariffConfig::default())
    }
}

/// Derive a bill's display status from its due date and payment state.
///
/// `Paid` wins regardless of date. Otherwise the whole days left until
/// the due date (rounded up) decide: negative is overdue, up to a week
/// is due soon.
pub fn derive_status(due_date: NaiveDate, payment_status: PaymentStatus, now: DateTime<Utc>) -> BillStatus {
    if payment_status == PaymentStatus::Paid {
        return BillStatus::Paid;
    }

    let due = due_date.and_time(chrono::NaiveTime::MIN).and_utc();
    let diff_days = ((due - now).num_milliseconds() as f64 / MILLIS_PER_DAY).ceil();

    if diff_days < 0.0 {
        BillStatus::Overdue
    } else if diff_days <= DUE_SOON_DAYS {
        BillStatus::DueSoon
    } else {
        BillStatus::Unpaid
    }
}

fn add_days(date: NaiveDate, days: u32) -> NaiveDate {
    date.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MAX)
}

fn next_bill_number(created_at: DateTime<Utc>) -> String {
    let seq = BILL_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("BILL-{}-{:04}", created_at.timestamp_millis(), seq)
}
