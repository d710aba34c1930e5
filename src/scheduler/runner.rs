//! Worker pool runner.
//!
//! Each iteration:
//! 1. Reload the account store
//! 2. Pick accounts with a session file that the game has not refused
//! 3. Build one worker per account and spawn it on a `JoinSet`
//! 4. Await every worker, then log the iteration summary
//!
//! A panicking worker is logged and counted; it never aborts its siblings.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::PoolState;
use crate::config::{AccountConfig, AccountStore, BotSettings, TelegramConfig};
use crate::game::{AccountWorker, Endpoints, GameApi, GameError, GameHttpClient, Pacing, RetryPolicy};
use crate::telegram::{SessionDirectory, WebAppCredentials};

/// Wait before retrying when nothing could be scheduled.
const IDLE_WAIT: Duration = Duration::from_secs(60);

/// Messages that can be sent to the pool.
#[derive(Debug, Clone)]
pub enum PoolMessage {
    /// Stop the pool; running workers are dropped.
    Shutdown,
}

/// Runs every configured account concurrently, forever.
pub struct WorkerPool {
    settings: BotSettings,
    sessions: SessionDirectory,
    endpoints: Endpoints,
    pacing: Pacing,
    state: PoolState,
}

impl WorkerPool {
    #[must_use]
    pub fn new(settings: BotSettings) -> Self {
        let sessions = SessionDirectory::new(settings.sessions_dir());
        let pacing = Pacing::from_settings(&settings);
        Self {
            settings,
            sessions,
            endpoints: Endpoints::default(),
            pacing,
            state: PoolState::new(),
        }
    }

    /// Overrides the game endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Overrides the cycle timing.
    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Runs iterations until a shutdown message arrives.
    pub async fn run(&mut self, mut rx: mpsc::Receiver<PoolMessage>) {
        info!("Worker pool started");

        loop {
            tokio::select! {
                () = self.run_iteration() => {}
                msg = rx.recv() => {
                    match msg {
                        Some(PoolMessage::Shutdown) | None => {
                            info!("Worker pool shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Runs one iteration over all eligible accounts.
    pub async fn run_iteration(&mut self) {
        let store = match AccountStore::load(self.settings.config_path()) {
            Ok(store) => store,
            Err(e) => {
                error!("Failed to load accounts: {}", e);
                tokio::time::sleep(IDLE_WAIT).await;
                return;
            }
        };

        self.state.begin_iteration();
        let mut workers = JoinSet::new();

        for account in self.runnable_accounts(&store) {
            match self.build_worker(account) {
                Ok(worker) => {
                    let title = worker.title().to_owned();
                    workers.spawn(async move { (title, worker.run().await) });
                }
                Err(e) => error!("Skipping [{}]: {}", account.app_title, e),
            }
        }

        if workers.is_empty() {
            warn!("No accounts to run, waiting {} s", IDLE_WAIT.as_secs());
            tokio::time::sleep(IDLE_WAIT).await;
            return;
        }
        info!("Started {} workers", workers.len());

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok((title, outcome)) => {
                    debug!("[{}] finished: {:?}", title, outcome);
                    self.state.record(&title, &outcome);
                }
                Err(e) => {
                    error!("Worker task failed: {}", e);
                    self.state.record_panic();
                }
            }
        }

        let summary = self.state.finish_iteration();
        info!(
            "Iteration {} done with {} workers: {} completed, {} failed, {} terminated, {} panicked",
            self.state.iterations,
            summary.total(),
            summary.completed,
            summary.failed,
            summary.terminated,
            summary.panicked
        );
        for (title, reason) in self.state.terminated() {
            warn!("[{}] is terminated: {}", title, reason);
        }
    }

    /// Accounts that have a session file and were not refused by the game.
    pub fn runnable_accounts<'a>(&self, store: &'a AccountStore) -> Vec<&'a AccountConfig> {
        store
            .iter()
            .map(|(_, account)| account)
            .filter(|account| {
                if self.state.is_terminated(&account.app_title) {
                    debug!("[{}] is terminated, skipping", account.app_title);
                    return false;
                }
                if !self.sessions.exists(&account.app_title) {
                    warn!("[{}] has no session file, skipping", account.app_title);
                    return false;
                }
                true
            })
            .collect()
    }

    fn build_worker(&self, account: &AccountConfig) -> Result<AccountWorker<WebAppCredentials>, GameError> {
        let http = GameHttpClient::new(
            account.user_agent.as_deref(),
            account.proxy.as_ref(),
            self.settings.request_timeout(),
        )?;
        let retry = RetryPolicy::new(
            self.settings.retry_max_attempts,
            Duration::from_millis(self.settings.retry_base_delay_ms),
        );
        let api = GameApi::new(http, self.endpoints.clone(), retry);
        let credentials =
            WebAppCredentials::new(TelegramConfig::for_account(account, self.sessions.path()));

        Ok(AccountWorker::new(
            account.app_title.clone(),
            api,
            credentials,
            self.pacing.clone(),
        ))
    }

    /// Gets a reference to the pool state.
    #[must_use]
    pub const fn state(&self) -> &PoolState {
        &self.state
    }

    /// Gets a mutable reference to the pool state.
    pub fn state_mut(&mut self) -> &mut PoolState {
        &mut self.state
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("data_dir", &self.settings.data_dir)
            .field("iterations", &self.state.iterations)
            .finish_non_exhaustive()
    }
}
