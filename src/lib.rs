//! Blum User Bot Library
//!
//! A Telegram userbot that farms the Blum mini app across many accounts.
//!
//! This crate provides the core functionality for:
//! - Loading the account store and generating device identities
//! - Registering and validating Telegram sessions via `MTProto`
//! - Minting mini app credentials and talking to the game API
//! - Running one farming worker per account on a schedule

pub mod config;
pub mod game;
pub mod logging;
pub mod scheduler;
pub mod telegram;
