//! One account's wake cycle.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{Instrument, error, info, info_span, warn};

use super::steps::{self, GamePacing, pause, random_between};
use super::{ErrorKind, GameApi, GameError, SessionState};
use crate::config::BotSettings;
use crate::telegram::CredentialSource;

/// Timing of a wake cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacing {
    /// Random sleep before the cycle starts.
    pub startup_delay: (Duration, Duration),
    /// Pause between consecutive steps.
    pub step_pause: Duration,
    pub games: GamePacing,
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_settings(&BotSettings::default())
    }
}

impl Pacing {
    #[must_use]
    pub fn from_settings(settings: &BotSettings) -> Self {
        let min = settings.startup_delay_min_minutes;
        let max = settings.startup_delay_max_minutes.max(min);
        Self {
            startup_delay: (Duration::from_secs(min * 60), Duration::from_secs(max * 60)),
            step_pause: Duration::from_secs(1),
            games: GamePacing::default(),
        }
    }

    /// No sleeping anywhere.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            startup_delay: (Duration::ZERO, Duration::ZERO),
            step_pause: Duration::ZERO,
            games: GamePacing::none(),
        }
    }
}

/// How a wake cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// Aborted by an error of the given class; the account runs again next iteration.
    Failed(ErrorKind),
    /// The game refused the account; it should not be scheduled again.
    Terminated(String),
}

/// Runs the steps of one account in order, owning its session state.
pub struct AccountWorker<C> {
    title: String,
    api: GameApi,
    credentials: C,
    pacing: Pacing,
    rng: StdRng,
}

impl<C: CredentialSource> AccountWorker<C> {
    pub fn new(title: impl Into<String>, api: GameApi, credentials: C, pacing: Pacing) -> Self {
        Self {
            title: title.into(),
            api,
            credentials,
            pacing,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Replaces the random source (deterministic runs).
    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Sleeps the startup delay, then runs one cycle.
    ///
    /// Never fails: every error is logged and reported as an outcome.
    pub async fn run(mut self) -> CycleOutcome {
        let span = info_span!("account", title = %self.title);
        async move {
            let delay = random_between(&mut self.rng, self.pacing.startup_delay);
            info!("Session sleep for {} min", delay.as_secs() / 60);
            pause(delay).await;

            match self.run_cycle().await {
                Ok(state) => {
                    info!("Cycle finished | Balance: {}", state.balance);
                    CycleOutcome::Completed
                }
                Err(err) if err.is_terminal() => {
                    error!("Account refused by the game: {}", err);
                    CycleOutcome::Terminated(err.to_string())
                }
                Err(err) => {
                    error!("Cycle aborted ({:?}): {}", err.kind(), err);
                    CycleOutcome::Failed(err.kind())
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Login, refresh, balance, daily, farming, referrals, games.
    pub async fn run_cycle(&mut self) -> Result<SessionState, GameError> {
        let api = &self.api;
        let step_pause = self.pacing.step_pause;
        let mut state = SessionState::new();

        steps::login(api, &mut state, &self.credentials).await?;
        pause(step_pause).await;

        if let Err(err) = steps::refresh(api, &mut state).await {
            if err.is_terminal() {
                return Err(err);
            }
            warn!("Token refresh failed: {}", err);
        }
        steps::fetch_balance(api, &mut state).await?;
        pause(step_pause).await;

        steps::claim_daily(api, &state).await?;
        pause(step_pause).await;

        steps::farm(api, &mut state, step_pause).await?;
        pause(step_pause).await;

        steps::claim_referral(api, &mut state).await?;
        pause(step_pause).await;

        steps::play_games(api, &mut state, &mut self.rng, &self.pacing.games).await?;
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Endpoints, GameHttpClient, RetryPolicy};
    use crate::telegram::TelegramError;
    use async_trait::async_trait;
    use httpmock::prelude::*;
    use serde_json::json;

    struct StaticCredentials(Option<&'static str>);

    #[async_trait]
    impl CredentialSource for StaticCredentials {
        async fn web_app_data(&self) -> Result<String, TelegramError> {
            self.0
                .map(str::to_owned)
                .ok_or_else(|| TelegramError::MissingWebAppData("static source".to_owned()))
        }
    }

    fn worker(server: &MockServer, credentials: StaticCredentials) -> AccountWorker<StaticCredentials> {
        let http = GameHttpClient::new(Some("test-agent"), None, Duration::from_secs(5)).unwrap();
        let api = GameApi::new(http, Endpoints::single(&server.base_url()), RetryPolicy::immediate(2));
        AccountWorker::new("acc1", api, credentials, Pacing::none()).with_rng(StdRng::seed_from_u64(9))
    }

    fn mock_login(server: &MockServer) {
        server.mock(|when, then| {
            when.method(POST)
                .path("/auth/provider/PROVIDER_TELEGRAM_MINI_APP")
                .json_body(json!({"query": "user=1&hash=h"}));
            then.status(200).json_body(json!({"token": {"access": "A0", "refresh": "R0"}}));
        });
        server.mock(|when, then| {
            when.method(POST).path("/auth/refresh");
            then.status(200).json_body(json!({"access": "A1", "refresh": "R1"}));
        });
    }

    fn mock_balance(server: &MockServer, passes: u32) {
        server.mock(|when, then| {
            when.method(GET).path("/user/balance");
            then.status(200).json_body(json!({
                "availableBalance": "10",
                "playPasses": passes,
                "farming": {"endTime": 1000}
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/daily-reward");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).path("/time/now");
            then.status(200).json_body(json!({"now": 500}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/friends/balance");
            then.status(200).json_body(json!({"amountForClaim": "0", "usedInvitation": 0}));
        });
    }

    #[test]
    fn test_default_pacing() {
        let pacing = Pacing::default();
        assert_eq!(pacing.startup_delay.0, Duration::from_secs(40 * 60));
        assert_eq!(pacing.startup_delay.1, Duration::from_secs(130 * 60));
        assert_eq!(pacing.step_pause, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_full_cycle_completes() {
        let server = MockServer::start();
        mock_login(&server);
        mock_balance(&server, 0);
        let play = server.mock(|when, then| {
            when.method(POST).path("/game/play");
            then.status(200).json_body(json!({"gameId": "x"}));
        });

        let outcome = worker(&server, StaticCredentials(Some("user=1&hash=h"))).run().await;

        assert_eq!(outcome, CycleOutcome::Completed);
        assert_eq!(play.calls(), 0);
    }

    #[tokio::test]
    async fn test_refreshed_token_is_used_after_refresh_step() {
        let server = MockServer::start();
        mock_login(&server);
        mock_balance(&server, 0);

        let mut worker = worker(&server, StaticCredentials(Some("user=1&hash=h")));
        let state = worker.run_cycle().await.unwrap();

        assert_eq!(state.authorization_header().as_deref(), Some("Bearer A1"));
        assert_eq!(state.farming_end_ms, 1000);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_the_cycle() {
        let server = MockServer::start();
        mock_login(&server);

        let outcome = worker(&server, StaticCredentials(None)).run().await;
        assert_eq!(outcome, CycleOutcome::Failed(ErrorKind::Unclassified));
    }

    #[tokio::test]
    async fn test_forbidden_login_terminates_account() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/auth/provider/PROVIDER_TELEGRAM_MINI_APP");
            then.status(403).body("forbidden");
        });

        let outcome = worker(&server, StaticCredentials(Some("q"))).run().await;
        assert!(matches!(outcome, CycleOutcome::Terminated(_)));
    }

    #[tokio::test]
    async fn test_invalid_game_id_fails_with_validation() {
        let server = MockServer::start();
        mock_login(&server);
        mock_balance(&server, 50);
        server.mock(|when, then| {
            when.method(POST).path("/game/play");
            then.status(200).json_body(json!({"gameId": "not-a-uuid"}));
        });
        let claim = server.mock(|when, then| {
            when.method(POST).path("/game/claim");
            then.status(200).body("OK");
        });

        let outcome = worker(&server, StaticCredentials(Some("user=1&hash=h"))).run().await;

        assert_eq!(outcome, CycleOutcome::Failed(ErrorKind::Validation));
        assert_eq!(claim.calls(), 0);
    }
}
