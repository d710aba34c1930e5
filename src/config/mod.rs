//! Configuration module for the farming bot.
//!
//! Handles the account store, generated device identities
//! and bot-wide settings.

mod accounts;
mod device;
mod settings;

pub use accounts::{AccountConfig, AccountStore, ProxyConfig};
pub use device::DeviceIdentity;
pub use settings::{BotSettings, SESSION_EXTENSION, TelegramConfig};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_json::Error),
}
