//! Game API calls and the authenticated-call contract.
//!
//! Every authenticated call goes through [`GameApi::call`]:
//! 1. a terminal error (403) is returned immediately;
//! 2. the first other failure triggers exactly one token refresh;
//! 3. transport errors, 5xx, 429 and 401 are retried with backoff until the
//!    policy's attempt budget runs out;
//! 4. anything still failing is logged and swallowed (`Ok(None)`).

use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, error, warn};

use super::http::{ApiBody, ApiRequest, GameHttpClient, RawResponse};
use super::models::{LoginResponse, TokenPair};
use super::session::{LoginTokens, RefreshTokens, SessionState, Tokens};
use super::{Endpoints, ErrorKind, GameError, RetryPolicy};

/// Game API bound to one account's HTTP client.
#[derive(Debug, Clone)]
pub struct GameApi {
    http: GameHttpClient,
    endpoints: Endpoints,
    retry: RetryPolicy,
}

impl GameApi {
    #[must_use]
    pub fn new(http: GameHttpClient, endpoints: Endpoints, retry: RetryPolicy) -> Self {
        Self {
            http,
            endpoints,
            retry,
        }
    }

    #[must_use]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Exchanges a mini app payload for tokens.
    ///
    /// # Errors
    ///
    /// Returns the last error once transient failures exhaust the budget,
    /// or the first non-transient one.
    pub async fn login(&self, query: &str) -> Result<LoginTokens, GameError> {
        let request = ApiRequest::post_json(self.endpoints.auth(), json!({ "query": query }));
        let response: LoginResponse = self.send_retrying(&request, None).await?.parse("login")?;
        Ok(response.into())
    }

    /// Trades a refresh token for a new token pair.
    ///
    /// # Errors
    ///
    /// Same policy as [`GameApi::login`].
    pub async fn refresh(&self, refresh_token: &str) -> Result<RefreshTokens, GameError> {
        let request =
            ApiRequest::post_json(self.endpoints.refresh(), json!({ "refresh": refresh_token }));
        let pair: TokenPair = self.send_retrying(&request, None).await?.parse("refresh")?;
        Ok(pair.into())
    }

    /// Refreshes the session's tokens in place.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::MissingRefreshToken`] before the first login.
    pub async fn refresh_session(&self, state: &mut SessionState) -> Result<(), GameError> {
        let Some(refresh_token) = state.refresh_token().map(str::to_owned) else {
            return Err(GameError::MissingRefreshToken);
        };
        let tokens = self.refresh(&refresh_token).await?;
        state.apply_tokens(Tokens::Refresh(tokens));
        debug!("Refreshed tokens");
        Ok(())
    }

    /// Authenticated call decoding the body into `T`.
    ///
    /// `Ok(None)` means the call failed and was recovered locally.
    ///
    /// # Errors
    ///
    /// Returns terminal errors and undecodable bodies.
    pub async fn call<T: DeserializeOwned>(
        &self,
        state: &mut SessionState,
        request: &ApiRequest,
        what: &str,
    ) -> Result<Option<T>, GameError> {
        match self.call_body(state, request, what).await? {
            Some(body) => body.parse(what).map(Some),
            None => Ok(None),
        }
    }

    /// Authenticated call whose body is irrelevant; returns whether it succeeded.
    ///
    /// # Errors
    ///
    /// Returns terminal errors.
    pub async fn call_ignoring_body(
        &self,
        state: &mut SessionState,
        request: &ApiRequest,
        what: &str,
    ) -> Result<bool, GameError> {
        Ok(self.call_body(state, request, what).await?.is_some())
    }

    async fn call_body(
        &self,
        state: &mut SessionState,
        request: &ApiRequest,
        what: &str,
    ) -> Result<Option<ApiBody>, GameError> {
        let mut refreshed = false;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let authorization = state.authorization_header();
            let err = match self.http.send(request, authorization.as_deref()).await {
                Ok(body) => return Ok(Some(body)),
                Err(err) => err,
            };

            if err.is_terminal() || err.kind() == ErrorKind::Unclassified {
                return Err(err);
            }
            error!(
                "{} failed (attempt {}/{}): {}",
                what, attempt, self.retry.max_attempts, err
            );

            if !refreshed {
                refreshed = true;
                if let Err(refresh_err) = self.refresh_session(state).await {
                    if refresh_err.is_terminal() {
                        return Err(refresh_err);
                    }
                    warn!("Token refresh failed: {}", refresh_err);
                }
            }

            let recoverable = err.is_retryable() || err.is_unauthorized();
            if !recoverable || !self.retry.allows_retry(attempt) {
                return Ok(None);
            }
            self.pause_before_retry(attempt).await;
        }
    }

    /// Authenticated request without status handling or recovery.
    ///
    /// # Errors
    ///
    /// Returns transport failures.
    pub async fn send_raw(
        &self,
        state: &SessionState,
        request: &ApiRequest,
    ) -> Result<RawResponse, GameError> {
        let authorization = state.authorization_header();
        self.http.send_raw(request, authorization.as_deref()).await
    }

    /// Unauthenticated request retried on transient failures only.
    async fn send_retrying(
        &self,
        request: &ApiRequest,
        authorization: Option<&str>,
    ) -> Result<ApiBody, GameError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.http.send(request, authorization).await {
                Ok(body) => return Ok(body),
                Err(err) if err.is_retryable() && self.retry.allows_retry(attempt) => {
                    warn!("{} failed, retrying: {}", request.url(), err);
                    self.pause_before_retry(attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn pause_before_retry(&self, attempt: usize) {
        let delay = {
            let mut rng = rand::rng();
            self.retry.delay_for(attempt, &mut rng)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
