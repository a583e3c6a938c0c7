//! AquaBill library
//!
//! Bill generation and consumption statistics for a water utility,
//! plus a SQLite store and TOML configuration for the binaries.

pub mod billing;
pub mod core;
pub mod db;
pub mod stats;
