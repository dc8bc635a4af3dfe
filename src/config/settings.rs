//! Marketplace settings loading from config.toml
//!
//! Every section and field has a default, so an absent file or a partial file is
//! valid. The delivery fee table, retry policy, message preview length and the
//! maintenance windows all live here rather than in the engine code.

use crate::core::retry::RetryPolicy;
use crate::core::status::DeliveryMethod;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Longest archive or expiry window accepted, in days.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Longest run interval or cleanup time limit accepted, in seconds.
pub const MAX_SCHEDULE_SECS: u64 = 365 * 24 * 60 * 60;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Delivery fee table
    pub pricing: PricingSettings,
    /// Retry policy for contention-prone operations
    pub retry: RetrySettings,
    /// Messaging limits
    pub messaging: MessagingSettings,
    /// Cleanup job windows and scheduling
    pub maintenance: MaintenanceSettings,
}

/// Flat fee charged per delivery method
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingSettings {
    /// Buyer collects from the farm
    pub pickup_fee: f64,
    /// Local delivery
    pub delivery_fee: f64,
    /// Parcel shipping
    pub shipping_fee: f64,
}

impl Default for PricingSettings {
    fn default() -> Self {
        Self {
            pickup_fee: 0.0,
            delivery_fee: 5.0,
            shipping_fee: 10.0,
        }
    }
}

impl PricingSettings {
    /// Fee charged for the given delivery method.
    #[must_use]
    pub const fn fee_for(&self, method: DeliveryMethod) -> f64 {
        match method {
            DeliveryMethod::Pickup => self.pickup_fee,
            DeliveryMethod::Delivery => self.delivery_fee,
            DeliveryMethod::Shipping => self.shipping_fee,
        }
    }
}

/// Retry wrapper parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total number of invocations, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, doubled on each further retry
    pub base_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to each delay
    pub max_jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_jitter_ms: 100,
        }
    }
}

impl RetrySettings {
    /// Builds the runtime retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_jitter: Duration::from_millis(self.max_jitter_ms),
        }
    }
}

/// Messaging limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagingSettings {
    /// Characters of the last message kept as the conversation preview
    pub preview_length: usize,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            preview_length: 100,
        }
    }
}

/// Cleanup job windows and scheduling
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceSettings {
    /// Conversations idle for longer than this are archived for both participants
    pub conversation_archive_after_days: i64,
    /// Pending orders older than this are cancelled by the system
    pub pending_order_expiry_days: i64,
    /// Reason recorded on system cancellations
    pub auto_cancel_reason: String,
    /// How often the worker wakes up
    pub run_interval_secs: u64,
    /// Upper bound on one cleanup transaction
    pub max_run_secs: u64,
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            conversation_archive_after_days: 180,
            pending_order_expiry_days: 7,
            auto_cancel_reason: "Automatically cancelled: the order expired while pending"
                .to_string(),
            run_interval_secs: 3600,
            max_run_secs: 60,
        }
    }
}

impl MarketConfig {
    /// Rejects values the engine cannot operate with.
    pub fn validate(&self) -> Result<()> {
        let fees = [
            self.pricing.pickup_fee,
            self.pricing.delivery_fee,
            self.pricing.shipping_fee,
        ];
        if fees.iter().any(|fee| !fee.is_finite() || *fee < 0.0) {
            return Err(Error::Config {
                message: "Delivery fees must be finite and non-negative".to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "retry.max_attempts must be at least 1".to_string(),
            });
        }
        if self.messaging.preview_length == 0 {
            return Err(Error::Config {
                message: "messaging.preview_length must be positive".to_string(),
            });
        }
        let maintenance = &self.maintenance;
        if maintenance.conversation_archive_after_days <= 0
            || maintenance.pending_order_expiry_days <= 0
            || maintenance.run_interval_secs == 0
            || maintenance.max_run_secs == 0
        {
            return Err(Error::Config {
                message: "maintenance windows and intervals must be positive".to_string(),
            });
        }
        if maintenance.conversation_archive_after_days > MAX_WINDOW_DAYS
            || maintenance.pending_order_expiry_days > MAX_WINDOW_DAYS
        {
            return Err(Error::Config {
                message: format!("maintenance windows must not exceed {MAX_WINDOW_DAYS} days"),
            });
        }
        if maintenance.run_interval_secs > MAX_SCHEDULE_SECS
            || maintenance.max_run_secs > MAX_SCHEDULE_SECS
        {
            return Err(Error::Config {
                message: format!(
                    "maintenance intervals must not exceed {MAX_SCHEDULE_SECS} seconds"
                ),
            });
        }
        Ok(())
    }
}

/// Parses and validates configuration from a TOML string.
pub fn parse_config(contents: &str) -> Result<MarketConfig> {
    let config: MarketConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Returns
/// * `Ok(MarketConfig)` - Parsed configuration, or the defaults if the file does not exist
/// * `Err(Error)` - The file exists but cannot be read, parsed or validated
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MarketConfig> {
    let path = path.as_ref();
    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(MarketConfig::default());
    }

    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Loads configuration from `CONFIG_PATH`, or ./config.toml when unset.
pub fn load_default_config() -> Result<MarketConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [pricing]
            pickup_fee = 0.0
            delivery_fee = 7.5
            shipping_fee = 12.0

            [retry]
            max_attempts = 5
            base_delay_ms = 50
            max_jitter_ms = 20

            [messaging]
            preview_length = 40

            [maintenance]
            conversation_archive_after_days = 90
            pending_order_expiry_days = 3
            auto_cancel_reason = "expired"
            run_interval_secs = 600
            max_run_secs = 30
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.pricing.fee_for(DeliveryMethod::Delivery), 7.5);
        assert_eq!(config.pricing.fee_for(DeliveryMethod::Shipping), 12.0);
        assert_eq!(config.retry.policy().max_attempts, 5);
        assert_eq!(config.retry.policy().base_delay, Duration::from_millis(50));
        assert_eq!(config.messaging.preview_length, 40);
        assert_eq!(config.maintenance.pending_order_expiry_days, 3);
        assert_eq!(config.maintenance.auto_cancel_reason, "expired");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config("[pricing]\ndelivery_fee = 6.0\n").unwrap();
        assert_eq!(config.pricing.fee_for(DeliveryMethod::Pickup), 0.0);
        assert_eq!(config.pricing.fee_for(DeliveryMethod::Delivery), 6.0);
        assert_eq!(config.pricing.fee_for(DeliveryMethod::Shipping), 10.0);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.maintenance.conversation_archive_after_days, 180);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = parse_config("[pricing]\nshipping_fee = -1.0\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let result = parse_config("[retry]\nmax_attempts = 0\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let result = parse_config("[maintenance]\npending_order_expiry_days = 0\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
    }

    #[test]
    fn test_oversized_maintenance_windows_rejected() {
        let result = parse_config("[maintenance]\nconversation_archive_after_days = 100000000\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let result = parse_config("[maintenance]\npending_order_expiry_days = 36501\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let result = parse_config("[maintenance]\nrun_interval_secs = 10000000000000000\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));

        let config = parse_config("[maintenance]\nconversation_archive_after_days = 36500\n");
        assert_eq!(config.unwrap().maintenance.conversation_archive_after_days, 36_500);
    }

    #[test]
    fn test_unreadable_config_is_io_error() {
        // A directory exists but cannot be read as a file
        let result = load_config(std::env::temp_dir());
        assert!(matches!(result.unwrap_err(), Error::Io(_)));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        let result = parse_config("[pricing\n");
        assert!(matches!(result.unwrap_err(), Error::Config { message: _ }));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config("definitely/not/here/config.toml").unwrap();
        assert_eq!(config.messaging.preview_length, 100);
    }
}
