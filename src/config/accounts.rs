//! Account store: one record per managed Telegram account.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ConfigError;
use super::device::DeviceIdentity;

/// Proxy settings bound to one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProxyConfig {
    /// Proxy scheme (`http`, `https` or `socks5`).
    pub scheme: String,

    /// Proxy host name or IP address.
    pub hostname: String,

    /// Proxy port.
    pub port: u16,

    /// Optional username for proxy authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password for proxy authentication.
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyConfig {
    /// Returns the proxy URL without credentials.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.hostname, self.port)
    }

    /// Returns the proxy URL with percent-encoded credentials, if any.
    #[must_use]
    pub fn url_with_credentials(&self) -> String {
        let Some(username) = self.username.as_deref() else {
            return self.url();
        };
        let password = self.password.as_deref().unwrap_or_default();
        format!(
            "{}://{}:{}@{}:{}",
            self.scheme,
            urlencoding::encode(username),
            urlencoding::encode(password),
            self.hostname,
            self.port
        )
    }
}

/// A single managed account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash.
    pub api_hash: String,

    /// Display title, also the session file name.
    pub app_title: String,

    /// Phone number used to register the session.
    pub phone_number: String,

    /// Emulated device model.
    #[serde(default)]
    pub device_model: Option<String>,

    /// User agent sent to the game API.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Optional proxy for both Telegram and game API traffic.
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

impl AccountConfig {
    /// Whether the device identity still has to be generated.
    #[must_use]
    pub fn needs_device(&self) -> bool {
        self.device_model.is_none() || self.user_agent.is_none()
    }

    /// Stores a generated device identity.
    pub fn apply_device(&mut self, device: DeviceIdentity) {
        self.user_agent = Some(device.user_agent);
        self.device_model = Some(device.device_model);
    }
}

/// All accounts keyed by their opaque integer id.
///
/// Reads and writes always replace the whole file.
#[derive(Debug, Clone, Default)]
pub struct AccountStore {
    path: PathBuf,
    accounts: BTreeMap<u32, AccountConfig>,
}

impl AccountStore {
    /// Loads the store from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!("Reading account store {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let accounts: BTreeMap<u32, AccountConfig> = serde_json::from_str(&content)?;

        Ok(Self {
            path: path.to_path_buf(),
            accounts,
        })
    }

    /// Writes the whole store back to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(&self.accounts)?;
        std::fs::write(&self.path, content)?;
        debug!("Updated account store {}", self.path.display());
        Ok(())
    }

    /// Generates device identities for accounts that miss one.
    ///
    /// Returns the number of updated accounts; the file is rewritten only
    /// when at least one account changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be saved.
    pub fn enrich_devices(&mut self) -> Result<usize, ConfigError> {
        let mut rng = rand::rng();
        let mut updated = 0;

        for account in self.accounts.values_mut().filter(|a| a.needs_device()) {
            account.apply_device(DeviceIdentity::generate(&mut rng));
            debug!("Updated device data for [{}]", account.app_title);
            updated += 1;
        }

        if updated > 0 {
            self.save()?;
        }
        Ok(updated)
    }

    /// Finds an account by its title.
    #[must_use]
    pub fn find_by_title(&self, title: &str) -> Option<&AccountConfig> {
        self.accounts.values().find(|a| a.app_title == title)
    }

    /// Iterates over all accounts in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &AccountConfig)> {
        self.accounts.iter().map(|(id, account)| (*id, account))
    }

    /// Returns the number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Checks if the store holds no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Creates an example store for users to reference.
    #[must_use]
    pub fn example(path: impl AsRef<Path>) -> Self {
        let mut accounts = BTreeMap::new();
        accounts.insert(
            1,
            AccountConfig {
                api_id: 123_456,
                api_hash: "0123456789abcdef0123456789abcdef".to_owned(),
                app_title: "main".to_owned(),
                phone_number: "+10000000000".to_owned(),
                device_model: None,
                user_agent: None,
                proxy: None,
            },
        );
        accounts.insert(
            2,
            AccountConfig {
                api_id: 123_456,
                api_hash: "0123456789abcdef0123456789abcdef".to_owned(),
                app_title: "second".to_owned(),
                phone_number: "+10000000001".to_owned(),
                device_model: None,
                user_agent: None,
                proxy: Some(ProxyConfig {
                    scheme: "socks5".to_owned(),
                    hostname: "127.0.0.1".to_owned(),
                    port: 1080,
                    username: Some("user".to_owned()),
                    password: Some("secret".to_owned()),
                }),
            },
        );

        Self {
            path: path.as_ref().to_path_buf(),
            accounts,
        }
    }
}
