//! Telegram client wrapper for one account session.

use std::sync::Arc;
use std::time::Duration;

use grammers_client::client::{LoginToken, PasswordToken};
use grammers_client::{sender, Client, InvocationError, SenderPool, SignInError};
use grammers_session::storages::SqliteSession;
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::webapp::extract_web_app_data;
use crate::config::TelegramConfig;

/// Re-export types for external use.
pub use grammers_client::client::{LoginToken as Token, PasswordToken as PwdToken};

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Password required for 2FA")]
    PasswordRequired(PasswordToken),

    #[error("Invalid password")]
    InvalidPassword(PasswordToken),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("API invocation error: {0}")]
    Invocation(String),

    #[error("Bot @{0} could not be resolved")]
    BotNotFound(String),

    #[error("No web app data found in URL: {0}")]
    MissingWebAppData(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        Self::classify(err.to_string(), Self::Invocation)
    }
}

impl TelegramError {
    /// Recognizes flood waits in an error message, otherwise wraps it with `other`.
    fn classify(message: String, other: fn(String) -> Self) -> Self {
        if (message.contains("FLOOD_WAIT") || message.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&message)
        {
            return Self::FloodWait(seconds);
        }
        other(message)
    }
}

/// Runs `operation`, sleeping through one flood wait before a single retry.
///
/// # Errors
///
/// Returns the operation's error, or the retry's error after a flood wait.
pub async fn retry_flood_wait<T, F, Fut>(mut operation: F) -> Result<T, TelegramError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TelegramError>>,
{
    match operation().await {
        Err(TelegramError::FloodWait(seconds)) => {
            warn!("Flood wait required, sleeping {} s before retrying", seconds);
            tokio::time::sleep(Duration::from_secs(seconds.into())).await;
            operation().await
        }
        result => result,
    }
}

/// Extracts flood wait seconds from an error message.
fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];

    for pattern in patterns {
        if let Some(idx) = err_msg.to_lowercase().find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = err_msg[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }
    None
}

/// Basic information about the signed-in user.
#[derive(Debug, Clone)]
pub struct SelfInfo {
    pub user_id: i64,
    pub username: Option<String>,
}

/// A connected Telegram session bound to one session file.
pub struct TelegramSession {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramSession {
    /// Opens the session file and connects to Telegram.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be opened or the connection fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        debug!("Connecting to Telegram with {}", config.session_path.display());

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let mut params = sender::ConnectionParams::default();
        if let Some(model) = &config.device_model {
            params.device_model.clone_from(model);
        }
        params.proxy_url.clone_from(&config.proxy_url);

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::with_configuration(Arc::clone(&session), config.api_id, params);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(Self {
            client,
            handle: handle.thin,
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Requests a login code to be sent to the phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn request_login_code(
        &self,
        phone: &str,
        api_hash: &str,
    ) -> Result<LoginToken, TelegramError> {
        info!("Requesting login code for phone: {}...", mask_phone(phone));

        self.client
            .request_login_code(phone, api_hash)
            .await
            .map_err(|e| TelegramError::classify(e.to_string(), TelegramError::SignInFailed))
    }

    /// Signs in with the login code.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn sign_in(&self, token: &LoginToken, code: &str) -> Result<(), TelegramError> {
        match self.client.sign_in(token, code).await {
            Ok(_user) => Ok(()),
            Err(SignInError::PasswordRequired(password_token)) => {
                debug!("2FA password required, hint: {:?}", password_token.hint());
                Err(TelegramError::PasswordRequired(password_token))
            }
            Err(SignInError::InvalidCode) => {
                Err(TelegramError::SignInFailed("Invalid code".to_owned()))
            }
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Checks the 2FA password.
    ///
    /// # Errors
    ///
    /// Returns an error if the password is invalid.
    pub async fn check_password(
        &self,
        password_token: PasswordToken,
        password: &str,
    ) -> Result<(), TelegramError> {
        match self.client.check_password(password_token, password).await {
            Ok(_user) => Ok(()),
            Err(SignInError::InvalidPassword(token)) => Err(TelegramError::InvalidPassword(token)),
            Err(e) => Err(TelegramError::SignInFailed(e.to_string())),
        }
    }

    /// Fetches the signed-in user, proving the session is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if not authorized or the API call fails.
    pub async fn get_me(&self) -> Result<SelfInfo, TelegramError> {
        if !self.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.client.invoke(&request).await?;
        match users.first() {
            Some(tl::enums::User::User(user)) => Ok(SelfInfo {
                user_id: user.id,
                username: user.username.clone(),
            }),
            _ => Err(TelegramError::NotAuthorized),
        }
    }

    /// Opens the bot's mini app and returns its decoded `tgWebAppData`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bot cannot be resolved, the web view request
    /// fails or the returned URL carries no web app data.
    pub async fn request_web_app_data(
        &self,
        bot_username: &str,
        url: &str,
        platform: &str,
    ) -> Result<String, TelegramError> {
        if !self.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        let (peer, bot) = self.resolve_bot(bot_username).await?;

        let request = tl::functions::messages::RequestWebView {
            silent: false,
            from_bot_menu: true,
            compact: false,
            fullscreen: false,
            peer,
            bot,
            url: Some(url.to_owned()),
            start_param: None,
            theme_params: None,
            platform: platform.to_owned(),
            reply_to: None,
            send_as: None,
        };

        let tl::enums::WebViewResult::Url(view) = self.client.invoke(&request).await?;
        debug!("Retrieved web view for @{}", bot_username);

        extract_web_app_data(&view.url)
            .ok_or_else(|| TelegramError::MissingWebAppData(view.url.clone()))
    }

    /// Resolves a bot username into its input peer and input user.
    async fn resolve_bot(
        &self,
        username: &str,
    ) -> Result<(tl::enums::InputPeer, tl::enums::InputUser), TelegramError> {
        let request = tl::functions::contacts::ResolveUsername {
            username: username.to_owned(),
            referer: None,
        };

        let tl::enums::contacts::ResolvedPeer::Peer(resolved) =
            self.client.invoke(&request).await?;

        resolved
            .users
            .into_iter()
            .find_map(|user| match user {
                tl::enums::User::User(user) if user.bot => {
                    let access_hash = user.access_hash.unwrap_or_default();
                    Some((
                        tl::enums::InputPeer::User(tl::types::InputPeerUser {
                            user_id: user.id,
                            access_hash,
                        }),
                        tl::enums::InputUser::User(tl::types::InputUser {
                            user_id: user.id,
                            access_hash,
                        }),
                    ))
                }
                _ => None,
            })
            .ok_or_else(|| TelegramError::BotNotFound(username.to_owned()))
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        debug!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

impl std::fmt::Debug for TelegramSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSession").finish_non_exhaustive()
    }
}

/// Masks a phone number for logging (shows last 4 digits).
fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() > 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_owned()
    }
}
