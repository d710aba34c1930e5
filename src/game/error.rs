//! Game API error taxonomy.

use thiserror::Error;

use crate::telegram::TelegramError;

/// Broad error classes used for logging and recovery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeout or connection failure.
    Transport,
    /// Non-2xx HTTP status.
    Protocol,
    /// Malformed data the game handed out (e.g. a bad game id).
    Validation,
    /// Anything else (undecodable bodies, missing state).
    Unclassified,
}

/// Errors raised while talking to the game API.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid gameId: {0}")]
    InvalidGameId(String),

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Failed to mint Telegram credentials: {0}")]
    Credentials(#[from] TelegramError),

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}

impl GameError {
    /// Returns the broad class of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout | Self::Connection(_) | Self::Transport(_) => ErrorKind::Transport,
            Self::Status { .. } => ErrorKind::Protocol,
            Self::InvalidGameId(_) => ErrorKind::Validation,
            Self::Decode { .. }
            | Self::MissingRefreshToken
            | Self::Credentials(_)
            | Self::ClientBuild(_) => ErrorKind::Unclassified,
        }
    }

    /// Whether the same request may succeed if sent again after a pause.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) | Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the access token was rejected.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }

    /// Whether the account itself is refused (banned or forbidden).
    ///
    /// Terminal errors stop the account instead of being retried.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Status { status: 403, .. })
    }

    pub(crate) fn decode(what: &str, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.to_owned(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for GameError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else if err.is_decode() {
            Self::decode("response body", err)
        } else if err.is_builder() {
            Self::ClientBuild(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
