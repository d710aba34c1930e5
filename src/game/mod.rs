//! Game API client and the per-account farming worker.

mod api;
mod endpoints;
mod error;
mod http;
pub mod models;
mod retry;
mod session;
pub mod steps;
mod worker;

pub use api::GameApi;
pub use endpoints::{Endpoints, GAME_BASE_URL, USER_BASE_URL};
pub use error::{ErrorKind, GameError};
pub use http::{ApiBody, ApiRequest, GameHttpClient, RawResponse};
pub use retry::RetryPolicy;
pub use session::{LoginTokens, RefreshTokens, SessionState, Tokens};
pub use worker::{AccountWorker, CycleOutcome, Pacing};
