//! Telegram client wrapper module.
//!
//! Provides session registration, validation and the mini app
//! credential source used to log into the game.

mod client;
mod sessions;
mod webapp;

pub use client::{
    PwdToken as PasswordToken, SelfInfo, TelegramError, TelegramSession, Token as LoginToken,
    retry_flood_wait,
};
pub use sessions::{SessionDirectory, ValidationReport, validate_sessions};
pub use webapp::{
    CredentialSource, GAME_APP_URL, GAME_BOT, WebAppCredentials, extract_web_app_data,
};
