/// Database connection and schema creation
pub mod database;

/// Marketplace settings loaded from config.toml
pub mod settings;

pub use settings::{
    MaintenanceSettings, MarketConfig, MessagingSettings, PricingSettings, RetrySettings,
    load_config, load_default_config,
};
