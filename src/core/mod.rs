//! Core module - Domain types, configuration, and errors

mod config;
mod error;
mod math;
mod types;

pub use config::{Config, GeneralConfig, TariffConfig};
pub use error::{Error, Result};
pub use math::{round2, round3, round_to};
pub use types::{
    coerce_number, Bill, BillBreakdown, BillStatus, BillingStats, Connection, ConnectionStatus,
    ConsumptionStats, MeterReading, MonthlyTotal, PaymentStatus, TrendAnalysis, TrendDirection,
};
