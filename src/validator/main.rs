//! Standalone validator for Telegram session files.
//!
//! Connects every configured account's session, deletes the ones that no
//! longer authorize and exits non-zero when anything was removed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use blum_user_bot::config::{AccountStore, BotSettings};
use blum_user_bot::logging::init_logging;
use blum_user_bot::telegram::{SessionDirectory, validate_sessions};

/// Session file validator.
#[derive(Parser, Debug)]
#[command(name = "validate_sessions")]
#[command(about = "Validates the Telegram sessions of the configured accounts")]
#[command(version)]
struct Args {
    /// Directory holding config.json and the sessions folder.
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    /// List every session with its result.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let logs = init_logging(&args.log_level);

    let settings = BotSettings {
        data_dir: args.data_dir,
        ..BotSettings::default()
    };
    let config_path = settings.config_path();
    println!("Validating sessions for: {}", config_path.display());

    let store = match AccountStore::load(&config_path) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("✗ Failed to load account store: {e}");
            return ExitCode::FAILURE;
        }
    };

    let sessions = SessionDirectory::new(settings.sessions_dir());
    let missing: Vec<&str> = sessions
        .missing(store.iter().map(|(_, account)| account))
        .into_iter()
        .map(|account| account.app_title.as_str())
        .collect();

    let report = validate_sessions(&sessions, store.iter().map(|(_, a)| a), &logs).await;

    if args.verbose {
        for title in &report.valid {
            println!("  ✓ {title}");
        }
        for title in &report.removed {
            println!("  ✗ {title} (session removed)");
        }
        for title in &report.failed {
            println!("  ✗ {title} (invalid, could not be removed)");
        }
        for title in &missing {
            println!("  - {title} (no session file)");
        }
    }

    println!();
    let total = store.len();

    if !report.failed.is_empty() {
        println!(
            "✗ Could not remove {} invalid session(s): {}",
            report.failed.len(),
            report.failed.join(", ")
        );
    }

    if report.removed.is_empty() && report.failed.is_empty() {
        println!("✓ {} of {total} sessions are valid", report.valid.len());
        if !missing.is_empty() {
            println!("  ({} account(s) still need to be registered)", missing.len());
        }
        ExitCode::SUCCESS
    } else {
        if !report.removed.is_empty() {
            println!(
                "✗ Removed {} invalid session(s): {}",
                report.removed.len(),
                report.removed.join(", ")
            );
        }
        println!("  Valid: {}/{total}", report.valid.len());
        println!("  Run blum_bot to register them again.");
        ExitCode::FAILURE
    }
}
