//! Game API endpoint catalog.

/// Base URL of the game service.
pub const GAME_BASE_URL: &str = "https://game-domain.blum.codes/api/v1/";

/// Base URL of the user service.
pub const USER_BASE_URL: &str = "https://user-domain.blum.codes/api/v1/";

/// Auth provider used for mini app logins.
const AUTH_PROVIDER: &str = "PROVIDER_TELEGRAM_MINI_APP";

/// Resolves endpoint URLs against the two service bases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    game: String,
    user: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(GAME_BASE_URL, USER_BASE_URL)
    }
}

impl Endpoints {
    /// Creates a catalog from explicit base URLs.
    #[must_use]
    pub fn new(game: &str, user: &str) -> Self {
        Self {
            game: with_trailing_slash(game),
            user: with_trailing_slash(user),
        }
    }

    /// Serves both services from one base (used against mock servers).
    #[must_use]
    pub fn single(base: &str) -> Self {
        Self::new(base, base)
    }

    pub fn auth(&self) -> String {
        format!("{}auth/provider/{AUTH_PROVIDER}", self.user)
    }

    pub fn refresh(&self) -> String {
        format!("{}auth/refresh", self.user)
    }

    pub fn balance(&self) -> String {
        format!("{}user/balance", self.game)
    }

    pub fn now(&self) -> String {
        format!("{}time/now", self.game)
    }

    pub fn farming_claim(&self) -> String {
        format!("{}farming/claim", self.game)
    }

    pub fn farming_start(&self) -> String {
        format!("{}farming/start", self.game)
    }

    pub fn friends_balance(&self) -> String {
        format!("{}friends/balance", self.user)
    }

    pub fn friends_claim(&self) -> String {
        format!("{}friends/claim", self.user)
    }

    pub fn game_play(&self) -> String {
        format!("{}game/play", self.game)
    }

    pub fn game_claim(&self) -> String {
        format!("{}game/claim", self.game)
    }

    pub fn daily(&self) -> String {
        format!("{}daily-reward?offset=420", self.game)
    }
}

fn with_trailing_slash(base: &str) -> String {
    if base.ends_with('/') {
        base.to_owned()
    } else {
        format!("{base}/")
    }
}
