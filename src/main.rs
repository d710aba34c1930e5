//! Blum User Bot - Main Entry Point
//!
//! Registers missing Telegram sessions, validates the existing ones and
//! then farms the game for every configured account.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Input, Password};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use blum_user_bot::config::{AccountConfig, AccountStore, BotSettings, TelegramConfig};
use blum_user_bot::logging::{LogControl, init_logging};
use blum_user_bot::scheduler::{PoolMessage, WorkerPool};
use blum_user_bot::telegram::{
    SessionDirectory, TelegramError, TelegramSession, retry_flood_wait, validate_sessions,
};

/// Telegram userbot farming the Blum mini app.
#[derive(Parser, Debug)]
#[command(name = "blum_bot")]
#[command(about = "Farm the Blum mini app with many Telegram accounts")]
#[command(version)]
struct Args {
    /// Directory holding config.json and the sessions folder.
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Do not validate existing sessions before starting.
    #[arg(long)]
    skip_validation: bool,

    /// Generate an example account store and exit.
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let logs = init_logging(&args.log_level);

    if args.generate_config {
        return generate_example_config(&args.data_dir);
    }

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let settings = BotSettings::from_env_with_defaults(args.data_dir.clone());
    let sessions = SessionDirectory::new(settings.sessions_dir());
    sessions
        .ensure()
        .context("Failed to create sessions directory")?;

    let mut store = AccountStore::load(settings.config_path())
        .with_context(|| format!("Failed to load {}", settings.config_path().display()))?;
    info!("Loaded {} accounts", store.len());

    let updated = store
        .enrich_devices()
        .context("Failed to save generated device data")?;
    if updated > 0 {
        info!("Generated device data for {} accounts", updated);
    }

    register_missing(&store, &sessions).await?;

    if args.skip_validation {
        info!("Skipping session validation");
    } else {
        check_sessions(&store, &sessions, &logs).await?;
    }

    let (pool_tx, pool_rx) = mpsc::channel::<PoolMessage>(1);
    let mut pool = WorkerPool::new(settings);

    info!("Starting worker pool...");
    let pool_handle = tokio::spawn(async move {
        pool.run(pool_rx).await;
    });

    info!("Bot is running. Use Ctrl+C to stop.");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
    }

    info!("Shutting down...");
    let _ = pool_tx.send(PoolMessage::Shutdown).await;
    let _ = pool_handle.await;

    Ok(())
}

/// Validates every session, then registers the ones that were removed.
async fn check_sessions(
    store: &AccountStore,
    sessions: &SessionDirectory,
    logs: &LogControl,
) -> Result<()> {
    let accounts = store.iter().map(|(_, account)| account);
    let report = validate_sessions(sessions, accounts, logs).await;

    info!(
        "Sessions checked: {} valid, {} removed",
        report.valid.len(),
        report.removed.len()
    );
    for title in &report.removed {
        warn!("Removed invalid session [{}]", title);
    }
    for title in &report.failed {
        warn!("Invalid session [{}] could not be removed", title);
    }

    register_missing(store, sessions).await
}

/// Interactively signs in every account that has no session file yet.
async fn register_missing(store: &AccountStore, sessions: &SessionDirectory) -> Result<()> {
    let missing = sessions.missing(store.iter().map(|(_, account)| account));
    if missing.is_empty() {
        return Ok(());
    }

    info!("{} accounts need a Telegram session", missing.len());
    for account in missing {
        register_account(account, sessions)
            .await
            .with_context(|| format!("Failed to register [{}]", account.app_title))?;
    }
    Ok(())
}

/// Creates the session file of one account.
async fn register_account(account: &AccountConfig, sessions: &SessionDirectory) -> Result<()> {
    let config = TelegramConfig::for_account(account, sessions.path());
    let session = TelegramSession::connect(&config)
        .await
        .context("Failed to connect to Telegram")?;

    let result = if session
        .is_authorized()
        .await
        .context("Failed to check authorization")?
    {
        Ok(())
    } else {
        authenticate(&session, account).await
    };

    session.disconnect();
    match &result {
        Ok(()) => info!("Session [{}] registered", account.app_title),
        Err(_) => {
            if let Err(e) = sessions.remove(&account.app_title) {
                debug!("Could not remove unfinished session [{}]: {}", account.app_title, e);
            }
        }
    }
    result
}

/// Handles Telegram authentication for the account's phone number.
async fn authenticate(session: &TelegramSession, account: &AccountConfig) -> Result<()> {
    info!("Authentication required for [{}]", account.app_title);

    let token = retry_flood_wait(move || {
        session.request_login_code(&account.phone_number, &account.api_hash)
    })
    .await
    .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt(format!("Enter the login code for {}", account.app_title))
        .interact_text()?;

    let mut password_token = match session.sign_in(&token, &code).await {
        Ok(()) => return Ok(()),
        Err(TelegramError::PasswordRequired(password_token)) => password_token,
        Err(e) => return Err(e).context("Authentication failed"),
    };

    info!("Two-factor authentication is enabled");
    loop {
        let hint = password_token.hint().unwrap_or("no hint");
        info!("Password hint: {}", hint);

        let password: String = Password::new()
            .with_prompt("Enter your 2FA password")
            .interact()?;

        match session.check_password(password_token, &password).await {
            Ok(()) => {
                info!("Successfully signed in with 2FA!");
                return Ok(());
            }
            Err(TelegramError::InvalidPassword(token)) => {
                warn!("Invalid password, try again");
                password_token = token;
            }
            Err(e) => return Err(e).context("2FA authentication failed"),
        }
    }
}

/// Writes an example account store.
fn generate_example_config(data_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let path = data_dir.join("config.example.json");
    AccountStore::example(&path).save()?;

    println!("✓ Example account store written to: {}", path.display());
    println!("\nTo use this bot:");
    println!("1. Copy config.example.json to config.json in the same folder");
    println!("2. Fill in api_id, api_hash, app_title and phone_number per account");
    println!("3. Optionally add a proxy block to an account");
    println!("4. Run: blum_bot");

    Ok(())
}
