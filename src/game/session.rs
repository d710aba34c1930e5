//! In-memory session state of one account worker.

use super::models::{LoginResponse, TokenPair};

/// Tokens returned by the mini app login (`{token: {access, refresh}}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginTokens {
    pub access: String,
    pub refresh: String,
}

impl From<LoginResponse> for LoginTokens {
    fn from(response: LoginResponse) -> Self {
        Self {
            access: response.token.access,
            refresh: response.token.refresh,
        }
    }
}

/// Tokens returned by a refresh (`{access, refresh}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokens {
    pub access: String,
    pub refresh: String,
}

impl From<TokenPair> for RefreshTokens {
    fn from(pair: TokenPair) -> Self {
        Self {
            access: pair.access,
            refresh: pair.refresh,
        }
    }
}

/// Where a token pair came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tokens {
    Login(LoginTokens),
    Refresh(RefreshTokens),
}

/// State owned by exactly one worker for one wake cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    /// End of the current farming cycle, milliseconds since epoch.
    pub farming_end_ms: i64,
    /// Mini-game credits available.
    pub play_passes: u32,
    /// Last seen available balance.
    pub balance: f64,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            // Eligible for a farming claim until the balance says otherwise.
            farming_end_ms: 1,
            play_passes: 0,
            balance: 0.0,
        }
    }
}

impl SessionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces both tokens with the given pair.
    pub fn apply_tokens(&mut self, tokens: Tokens) {
        let (access, refresh) = match tokens {
            Tokens::Login(t) => (t.access, t.refresh),
            Tokens::Refresh(t) => (t.access, t.refresh),
        };
        self.access_token = Some(access);
        self.refresh_token = Some(refresh);
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    /// Current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// The `Authorization` header value derived from the latest access token.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.access_token.as_ref().map(|t| format!("Bearer {t}"))
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}
