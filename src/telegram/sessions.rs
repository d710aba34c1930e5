//! Session file directory: discovery, validation and cleanup.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use super::TelegramSession;
use crate::config::{AccountConfig, SESSION_EXTENSION, TelegramConfig};
use crate::logging::LogControl;

/// Directory holding one `<title>.session` file per account.
#[derive(Debug, Clone)]
pub struct SessionDirectory {
    dir: PathBuf,
}

impl SessionDirectory {
    /// Creates a handle for the given directory.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates the directory if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure(&self) -> std::io::Result<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            debug!("Created sessions folder {}", self.dir.display());
        }
        Ok(())
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Path of the session file for a title.
    #[must_use]
    pub fn path_for(&self, title: &str) -> PathBuf {
        self.dir.join(format!("{title}{SESSION_EXTENSION}"))
    }

    /// Whether a session file exists for the title.
    #[must_use]
    pub fn exists(&self, title: &str) -> bool {
        self.path_for(title).is_file()
    }

    /// Lists session names (file names without extension), sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list(&self) -> std::io::Result<Vec<String>> {
        let mut names: Vec<String> = std::fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .filter_map(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(SESSION_EXTENSION))
                    .map(str::to_owned)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Deletes the session file for a title.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    pub fn remove(&self, title: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.path_for(title))
    }

    /// Returns the configured accounts that still lack a session file.
    pub fn missing<'a>(
        &self,
        accounts: impl IntoIterator<Item = &'a AccountConfig>,
    ) -> Vec<&'a AccountConfig> {
        accounts
            .into_iter()
            .filter(|account| !self.exists(&account.app_title))
            .collect()
    }
}

/// Result of a validation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Sessions that answered with their own user.
    pub valid: Vec<String>,
    /// Sessions whose files were deleted.
    pub removed: Vec<String>,
    /// Invalid sessions whose files could not be deleted.
    pub failed: Vec<String>,
}

/// Validates every session with a configured account and deletes the broken ones.
///
/// Log verbosity is lowered to warnings for the duration of the pass.
pub async fn validate_sessions<'a>(
    sessions: &SessionDirectory,
    accounts: impl IntoIterator<Item = &'a AccountConfig>,
    logs: &LogControl,
) -> ValidationReport {
    validate_with(sessions, accounts, logs, |config| async move {
        is_session_valid(&config).await
    })
    .await
}

async fn validate_with<'a, F, Fut>(
    sessions: &SessionDirectory,
    accounts: impl IntoIterator<Item = &'a AccountConfig>,
    logs: &LogControl,
    mut check: F,
) -> ValidationReport
where
    F: FnMut(TelegramConfig) -> Fut,
    Fut: Future<Output = bool>,
{
    let accounts: Vec<&AccountConfig> = accounts
        .into_iter()
        .filter(|account| sessions.exists(&account.app_title))
        .collect();

    let mut report = ValidationReport::default();
    let progress = ProgressBar::new(accounts.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("Validating {bar:30.cyan} {pos}/{len} sessions") {
        progress.set_style(style);
    }

    {
        let _quiet = logs.quiet();
        for account in accounts {
            let title = account.app_title.clone();
            let config = TelegramConfig::for_account(account, sessions.path());

            if check(config).await {
                report.valid.push(title);
            } else if let Err(e) = sessions.remove(&title) {
                warn!("Could not remove invalid session [{}]: {}", title, e);
                report.failed.push(title);
            } else {
                report.removed.push(title);
            }
            progress.inc(1);
        }
    }
    progress.finish_and_clear();

    for title in &report.removed {
        info!("Removed invalid session file [{}]", title);
    }
    report
}

async fn is_session_valid(config: &TelegramConfig) -> bool {
    let session = match TelegramSession::connect(config).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Session validation failed: {}", e);
            return false;
        }
    };

    let result = session.get_me().await;
    session.disconnect();

    match result {
        Ok(me) => {
            debug!(
                "Session validation successful for user {} (@{})",
                me.user_id,
                me.username.as_deref().unwrap_or("-")
            );
            true
        }
        Err(e) => {
            warn!("Session validation failed: {}", e);
            false
        }
    }
}
