//! Mini app launch data and the credential source built on it.

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use super::{TelegramError, TelegramSession, retry_flood_wait};
use crate::config::TelegramConfig;

/// Username of the game bot.
pub const GAME_BOT: &str = "BlumCryptoBot";

/// URL the game's mini app is opened with.
pub const GAME_APP_URL: &str = "https://telegram.blum.codes/";

/// Platform reported when opening the mini app.
const WEB_VIEW_PLATFORM: &str = "ios";

/// Produces a one-time authorization payload for the game API.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Returns a fresh, decoded `tgWebAppData` payload.
    async fn web_app_data(&self) -> Result<String, TelegramError>;
}

/// Mints payloads by opening the game's mini app through a Telegram session.
#[derive(Debug, Clone)]
pub struct WebAppCredentials {
    telegram: TelegramConfig,
    bot: String,
    url: String,
}

impl WebAppCredentials {
    /// Creates a source for the game bot using the given session.
    #[must_use]
    pub fn new(telegram: TelegramConfig) -> Self {
        Self {
            telegram,
            bot: GAME_BOT.to_owned(),
            url: GAME_APP_URL.to_owned(),
        }
    }

    async fn request_once(&self) -> Result<String, TelegramError> {
        debug!("Requesting web app data from @{}", self.bot);

        let session = TelegramSession::connect(&self.telegram).await?;
        let data = session
            .request_web_app_data(&self.bot, &self.url, WEB_VIEW_PLATFORM)
            .await;
        session.disconnect();
        data
    }
}

#[async_trait]
impl CredentialSource for WebAppCredentials {
    async fn web_app_data(&self) -> Result<String, TelegramError> {
        retry_flood_wait(move || self.request_once()).await
    }
}

/// Extracts `tgWebAppData` from a web view URL.
///
/// The value is percent-encoded twice inside the URL fragment.
pub fn extract_web_app_data(url: &str) -> Option<String> {
    let pattern = Regex::new(r"tgWebAppData=([^&]+)").ok()?;
    let raw = pattern.captures(url)?.get(1)?.as_str();

    let once = urlencoding::decode(raw).ok()?;
    let twice = urlencoding::decode(&once).ok()?;
    Some(twice.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_web_app_data_decodes_twice() {
        let url = "https://telegram.blum.codes/#tgWebAppData=query_id%3DAA%26user%3D%257B%2522id%2522%253A1%257D%26hash%3Dab&tgWebAppVersion=7.10&tgWebAppPlatform=ios";
        assert_eq!(
            extract_web_app_data(url).as_deref(),
            Some(r#"query_id=AA&user={"id":1}&hash=ab"#)
        );
    }

    #[test]
    fn test_extract_web_app_data_missing() {
        assert_eq!(extract_web_app_data("https://telegram.blum.codes/#tgWebAppVersion=7.10"), None);
    }
}
