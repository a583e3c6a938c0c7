//! Configuration management

use crate::core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub tariff: TariffConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

        let app_config_dir = config_dir.join("aquabill");

        if !app_config_dir.exists() {
            fs::create_dir_all(&app_config_dir)?;
        }

        Ok(app_config_dir.join("config.toml"))
    }

    /// Load configuration from disk, writing defaults on first run
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;

        config.tariff.warn_if_unusual();

        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Currency code (USD, EUR, INR, etc.)
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Currency symbol used in reports
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
    /// Window size for moving averages in reports
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
}

fn default_currency() -> String { "USD".to_string() }
fn default_currency_symbol() -> String { "$".to_string() }
fn default_moving_average_window() -> usize { 3 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            currency_symbol: default_currency_symbol(),
            moving_average_window: default_moving_average_window(),
        }
    }
}

/// Tariff governing bill computation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffConfig {
    /// Price per unit of water
    #[serde(default = "default_rate_per_unit")]
    pub rate_per_unit: f64,
    /// Tax applied to the base amount, as a fraction
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,
    /// Flat charge added to every bill
    #[serde(default = "default_service_charge")]
    pub service_charge: f64,
    /// Days between bill date and due date
    #[serde(default = "default_due_days")]
    pub due_days: u32,
}

fn default_rate_per_unit() -> f64 { 5.50 }
fn default_tax_rate() -> f64 { 0.08 }
fn default_service_charge() -> f64 { 10.00 }
fn default_due_days() -> u32 { 30 }

impl Default for TariffConfig {
    fn default() -> Self {
        Self {
            rate_per_unit: default_rate_per_unit(),
            tax_rate: default_tax_rate(),
            service_charge: default_service_charge(),
            due_days: default_due_days(),
        }
    }
}

impl TariffConfig {
    /// Log (but keep) values outside the documented ranges
    fn warn_if_unusual(&self) {
        if self.rate_per_unit <= 0.0 {
            log::warn!("Tariff rate_per_unit is not positive: {}", self.rate_per_unit);
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            log::warn!("Tariff tax_rate outside [0, 1): {}", self.tax_rate);
        }
        if self.service_charge < 0.0 {
            log::warn!("Tariff service_charge is negative: {}", self.service_charge);
        }
        if self.due_days == 0 {
            log::warn!("Tariff due_days is zero, bills are due on issue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tariff() {
        let tariff = TariffConfig::default();
        assert_eq!(tariff.rate_per_unit, 5.50);
        assert_eq!(tariff.tax_rate, 0.08);
        assert_eq!(tariff.service_charge, 10.00);
        assert_eq!(tariff.due_days, 30);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tariff]
            rate_per_unit = 7.25
            "#,
        )
        .unwrap();

        assert_eq!(config.tariff.rate_per_unit, 7.25);
        assert_eq!(config.tariff.tax_rate, 0.08);
        assert_eq!(config.general.moving_average_window, 3);
    }

    #[test]
    fn test_load_writes_defaults_then_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let first = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first, Config::default());

        let mut changed = first.clone();
        changed.tariff.due_days = 14;
        changed.general.currency = "EUR".into();
        changed.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, changed);
    }

    #[test]
    fn test_invalid_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "tariff = 3").unwrap();

        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
