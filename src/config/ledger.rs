//! Ledger policy configuration loading from ledger.toml
//!
//! Earn rate, bill limits, activation and expiry windows are program policy,
//! not hardcoded business law. Every field has a default matching the
//! loyalty program's published rules, so an absent file is valid.

use crate::errors::{Error, Result};
use chrono::{Duration, Months};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Default configuration file looked up by [`load_default_config`]
pub const DEFAULT_CONFIG_PATH: &str = "ledger.toml";

/// Longest accepted activation delay, one leap year
pub const MAX_ACTIVATION_DELAY_HOURS: i64 = 24 * 366;

/// Longest accepted lot lifetime
pub const MAX_EXPIRY_YEARS: u32 = 100;

/// Policy knobs for the ledger engine and sweepers
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Rupees of bill per point earned
    pub points_divisor: Decimal,
    /// Smallest purchase bill that earns points
    pub minimum_bill: Decimal,
    /// Largest bill accepted
    pub maximum_bill: Decimal,
    /// Delay between earning and activation
    pub activation_delay_hours: i64,
    /// Lifetime of a lot, counted from activation
    pub expiry_years: u32,
    /// Horizon for the "expiring soon" balance partition
    pub expiring_soon_days: i64,
    /// Interval between scheduled sweeps
    pub sweep_interval_secs: u64,
    /// Upper bound on one engine operation, storage included
    pub operation_timeout_ms: u64,
    /// Prefix of customer sequential codes
    pub customer_code_prefix: String,
    /// Zero-padded width of the numeric part of customer codes
    pub customer_code_width: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            points_divisor: Decimal::from(50),
            minimum_bill: Decimal::from(50),
            maximum_bill: Decimal::new(9_999_999_999, 2),
            activation_delay_hours: 24,
            expiry_years: 2,
            expiring_soon_days: 30,
            sweep_interval_secs: 3600,
            operation_timeout_ms: 5000,
            customer_code_prefix: "MGP".to_string(),
            customer_code_width: 6,
        }
    }
}

impl LedgerConfig {
    /// Checks that the configured values are mutually consistent.
    pub fn validate(&self) -> Result<()> {
        if self.points_divisor <= Decimal::ZERO {
            return Err(config_error("points_divisor must be positive"));
        }
        if self.minimum_bill < Decimal::ZERO || self.minimum_bill > self.maximum_bill {
            return Err(config_error(
                "minimum_bill must be non-negative and not above maximum_bill",
            ));
        }
        if !(0..=MAX_ACTIVATION_DELAY_HOURS).contains(&self.activation_delay_hours) {
            return Err(config_error(
                "activation_delay_hours must be between 0 and 8784",
            ));
        }
        if self.expiry_years > MAX_EXPIRY_YEARS {
            return Err(config_error("expiry_years must not exceed 100"));
        }
        if self.expiring_soon_days < 0 {
            return Err(config_error("expiring_soon_days must not be negative"));
        }
        if self.operation_timeout_ms == 0 || self.sweep_interval_secs == 0 {
            return Err(config_error(
                "operation_timeout_ms and sweep_interval_secs must be positive",
            ));
        }
        Ok(())
    }

    /// Delay between a lot being earned and it becoming spendable,
    /// `None` if the configured hours do not fit a [`Duration`]
    #[must_use]
    pub fn activation_delay(&self) -> Option<Duration> {
        Duration::try_hours(self.activation_delay_hours)
    }

    /// Lifetime of a lot after activation, in calendar months
    #[must_use]
    pub const fn expiry_months(&self) -> Months {
        Months::new(self.expiry_years.saturating_mul(12))
    }

    /// Horizon for the expiring-soon partition
    #[must_use]
    pub const fn expiring_soon(&self) -> Duration {
        Duration::days(self.expiring_soon_days)
    }

    /// Per-operation timeout
    #[must_use]
    pub const fn operation_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.operation_timeout_ms)
    }

    /// Interval between scheduled sweeps
    #[must_use]
    pub const fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

fn config_error(message: &str) -> Error {
    Error::Config {
        message: message.to_string(),
    }
}

/// Loads ledger configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read ([`Error::Io`])
/// - The TOML syntax is invalid
/// - The values fail [`LedgerConfig::validate`]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<LedgerConfig> {
    let contents = std::fs::read_to_string(path.as_ref())?;

    let config: LedgerConfig = toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse ledger config: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads `./ledger.toml` if present, otherwise returns the defaults
pub fn load_default_config() -> Result<LedgerConfig> {
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_config(DEFAULT_CONFIG_PATH)
    } else {
        tracing::info!("No {DEFAULT_CONFIG_PATH} found, using default ledger policy");
        Ok(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_match_program_rules() {
        let config = LedgerConfig::default();
        assert_eq!(config.points_divisor, dec!(50));
        assert_eq!(config.minimum_bill, dec!(50));
        assert_eq!(config.maximum_bill, dec!(99999999.99));
        assert_eq!(config.activation_delay(), Some(Duration::hours(24)));
        assert_eq!(config.expiry_months(), Months::new(24));
        assert_eq!(config.expiring_soon(), Duration::days(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
            activation_delay_hours = 48
            expiring_soon_days = 14
            customer_code_prefix = "LOY"
        "#;

        let config: LedgerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.activation_delay_hours, 48);
        assert_eq!(config.expiring_soon_days, 14);
        assert_eq!(config.customer_code_prefix, "LOY");
        // untouched fields keep their defaults
        assert_eq!(config.points_divisor, dec!(50));
        assert_eq!(config.expiry_years, 2);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = LedgerConfig {
            minimum_bill: dec!(500),
            maximum_bill: dec!(100),
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_rejects_zero_divisor() {
        let config = LedgerConfig {
            points_divisor: Decimal::ZERO,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_validate_caps_time_windows() {
        let config = LedgerConfig {
            activation_delay_hours: MAX_ACTIVATION_DELAY_HOURS,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_ok());

        for activation_delay_hours in [MAX_ACTIVATION_DELAY_HOURS + 1, i64::MAX, -1] {
            let config = LedgerConfig {
                activation_delay_hours,
                ..LedgerConfig::default()
            };
            assert!(matches!(config.validate(), Err(Error::Config { .. })));
        }

        let config = LedgerConfig {
            expiry_years: MAX_EXPIRY_YEARS + 1,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_activation_delay_out_of_range_is_none() {
        let config = LedgerConfig {
            activation_delay_hours: i64::MAX,
            ..LedgerConfig::default()
        };
        assert_eq!(config.activation_delay(), None);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("definitely/not/here.toml");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
