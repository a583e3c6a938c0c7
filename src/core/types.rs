//! Common types used across the application

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A recorded water-meter consumption event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    /// Store id, `None` until persisted
    #[serde(default)]
    pub id: Option<i64>,
    /// Connection the meter belongs to
    #[serde(default)]
    pub connection_id: Option<i64>,
    /// Calendar date the meter was read
    pub reading_date: NaiveDate,
    /// Units consumed since the previous reading
    #[serde(default)]
    pub units_consumed: f64,
}

impl MeterReading {
    pub fn new(connection_id: i64, reading_date: NaiveDate, units_consumed: f64) -> Self {
        Self {
            id: None,
            connection_id: Some(connection_id),
            reading_date,
            units_consumed,
        }
    }

    /// Units as used in calculations. Non-finite values count as zero.
    ///
    /// Negative values are passed through untouched.
    pub fn effective_units(&self) -> f64 {
        coerce_number(self.units_consumed)
    }
}

/// Coerce a possibly malformed number to a usable value (NaN/inf -> 0)
pub fn coerce_number(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Status of a water connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Active,
    Inactive,
    Suspended,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Active => "Active",
            ConnectionStatus::Inactive => "Inactive",
            ConnectionStatus::Suspended => "Suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(ConnectionStatus::Active),
            "Inactive" => Some(ConnectionStatus::Inactive),
            "Suspended" => Some(ConnectionStatus::Suspended),
            _ => None,
        }
    }
}

/// A customer's water connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub status: ConnectionStatus,
}

impl Connection {
    pub fn new(id: i64, user_id: i64) -> Self {
        Self {
            id: Some(id),
            user_id: Some(user_id),
            status: ConnectionStatus::Active,
        }
    }
}

/// Stored payment state of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Overdue,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Overdue => "Overdue",
        }
    }

    /// Exact, case-sensitive match on the stored label
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unpaid" => Some(PaymentStatus::Unpaid),
            "Paid" => Some(PaymentStatus::Paid),
            "Overdue" => Some(PaymentStatus::Overdue),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display status derived from due date and payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillStatus {
    Paid,
    Overdue,
    #[serde(rename = "Due Soon")]
    DueSoon,
    Unpaid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Paid => "Paid",
            BillStatus::Overdue => "Overdue",
            BillStatus::DueSoon => "Due Soon",
            BillStatus::Unpaid => "Unpaid",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated bill. Never recomputed in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bill {
    /// Store id, `None` until persisted
    pub id: Option<i64>,
    pub bill_number: String,
    pub bill_date: NaiveDate,
    pub due_date: NaiveDate,
    pub units_consumed: f64,
    pub rate_per_unit: f64,
    pub base_amount: f64,
    pub tax_amount: f64,
    pub service_charge: f64,
    /// base + tax + service charge, each rounded first
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub meter_reading_id: Option<i64>,
    pub connection_id: Option<i64>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Cost preview for a number of units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillBreakdown {
    pub units_consumed: f64,
    pub rate_per_unit: f64,
    pub base_amount: f64,
    pub service_charge: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
}

/// Summary statistics over reading consumption
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionStats {
    pub count: usize,
    pub total: f64,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub q25: f64,
    pub q75: f64,
}

/// Summary statistics over a set of bills
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillingStats {
    pub total_bills: usize,
    pub total_amount: f64,
    pub average_amount: f64,
    pub paid_amount: f64,
    pub unpaid_amount: f64,
    pub overdue_amount: f64,
    /// Whole-number percentage of paid bills
    pub payment_rate: f64,
}

/// Direction of a linear trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Stable,
    Increasing,
    Decreasing,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Stable => "stable",
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
        }
    }
}

/// Result of a trend analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub trend: TrendDirection,
    pub slope: f64,
    pub strength: f64,
}

/// Total consumption for one calendar month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    /// Month key, `YYYY-MM`
    pub month: String,
    pub readings: usize,
    pub units: f64,
}
