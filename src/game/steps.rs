//! The individual steps of one wake cycle.
//!
//! Each step takes the account's [`GameApi`] and the worker-owned
//! [`SessionState`] explicitly. Failures recovered by the call contract show
//! up as a `Skipped` outcome; only terminal, validation and unclassified
//! errors leave a step as `Err`.

use std::ops::RangeInclusive;
use std::time::Duration;

use chrono::{Local, TimeZone};
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::{Uuid, Variant, Version};

use super::api::GameApi;
use super::http::ApiRequest;
use super::models::{
    BalanceResponse, DailyResponse, FarmingClaimResponse, FarmingStartResponse,
    FriendsBalanceResponse, FriendsClaimResponse, GamePlayResponse, NowResponse,
};
use super::session::{SessionState, Tokens};
use super::GameError;
use crate::telegram::CredentialSource;

/// Number of games a session aims for.
pub const ROUND_COUNT: RangeInclusive<u32> = 1..=15;

/// Points reported for a finished game.
pub const GAME_POINTS: RangeInclusive<u32> = 180..=230;

/// Waits between game calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePacing {
    /// How long a game "lasts" before it is claimed.
    pub duration: (Duration, Duration),
    /// Pause after a claim before the next game.
    pub gap: (Duration, Duration),
}

impl Default for GamePacing {
    fn default() -> Self {
        Self {
            duration: (Duration::from_secs(30), Duration::from_secs(40)),
            gap: (Duration::from_secs(2), Duration::from_secs(5)),
        }
    }
}

impl GamePacing {
    /// No waiting at all.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            duration: (Duration::ZERO, Duration::ZERO),
            gap: (Duration::ZERO, Duration::ZERO),
        }
    }
}

/// Uniformly picks a duration in `[low, high]`.
pub fn random_between<R: Rng + ?Sized>(rng: &mut R, (low, high): (Duration, Duration)) -> Duration {
    if high <= low {
        return low;
    }
    Duration::from_secs_f64(rng.random_range(low.as_secs_f64()..=high.as_secs_f64()))
}

/// Sleeps unless the duration is zero.
pub async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Mints Telegram credentials and logs in to the game.
///
/// Any failure here ends the cycle.
pub async fn login<C: CredentialSource + ?Sized>(
    api: &GameApi,
    state: &mut SessionState,
    credentials: &C,
) -> Result<(), GameError> {
    debug!("Requesting Telegram web app data");
    let query = credentials.web_app_data().await?;
    let tokens = api.login(&query).await?;
    state.apply_tokens(Tokens::Login(tokens));
    debug!("Logged in to the game");
    Ok(())
}

/// Explicit token refresh step.
pub async fn refresh(api: &GameApi, state: &mut SessionState) -> Result<(), GameError> {
    api.refresh_session(state).await
}

/// Reads balance, passes and the farming end time into the state.
///
/// Returns `false` when the balance could not be fetched.
pub async fn fetch_balance(api: &GameApi, state: &mut SessionState) -> Result<bool, GameError> {
    let request = ApiRequest::get(api.endpoints().balance());
    let Some(balance) = api.call::<BalanceResponse>(state, &request, "balance").await? else {
        return Ok(false);
    };

    state.balance = balance.available_balance;
    state.play_passes = balance.play_passes;
    state.farming_end_ms = balance.farming.map_or(0, |f| f.end_time);

    info!("Balance: {} | Games: {}", state.balance, state.play_passes);
    Ok(true)
}

/// Result of the daily reward step.
#[derive(Debug, Clone, PartialEq)]
pub enum DailyOutcome {
    /// No reward offered (or the check failed).
    Unavailable,
    /// Reward offered but the claim was refused.
    NotClaimed,
    Claimed { day: u32, passes: u32, points: f64 },
}

/// Checks for a daily reward and claims it.
///
/// The daily endpoints bypass the call contract: a non-200 answer simply
/// means there is nothing to claim.
pub async fn claim_daily(api: &GameApi, state: &SessionState) -> Result<DailyOutcome, GameError> {
    let check = match api.send_raw(state, &ApiRequest::get(api.endpoints().daily())).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Daily reward check failed: {}", err);
            return Ok(DailyOutcome::Unavailable);
        }
    };
    if !check.is_ok() {
        debug!("No daily reward (status {})", check.status);
        return Ok(DailyOutcome::Unavailable);
    }

    let daily: DailyResponse = check.body.parse("daily reward")?;
    let Some(day) = daily.days.last() else {
        return Ok(DailyOutcome::Unavailable);
    };

    let claim = match api.send_raw(state, &ApiRequest::post(api.endpoints().daily())).await {
        Ok(response) => response,
        Err(err) => {
            warn!("Daily reward claim failed: {}", err);
            return Ok(DailyOutcome::NotClaimed);
        }
    };
    if !claim.is_ok() {
        debug!("Daily reward claim refused (status {})", claim.status);
        return Ok(DailyOutcome::NotClaimed);
    }

    info!(
        "Claim Daily | Day: {} | Games: {} | Points: {}",
        day.original, day.reward.passes, day.reward.points
    );
    Ok(DailyOutcome::Claimed {
        day: day.original,
        passes: day.reward.passes,
        points: day.reward.points,
    })
}

/// Result of the farming step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmOutcome {
    /// The current cycle has not ended yet.
    NotReady,
    /// Claimed and restarted; carries the new end time.
    Restarted { end_time_ms: i64 },
    /// A call failed and was recovered.
    Skipped,
}

/// Whether the farming cycle ending at `end_ms` can be claimed at `now_ms`.
#[must_use]
pub const fn should_claim_farm(end_ms: i64, now_ms: i64) -> bool {
    end_ms < now_ms
}

/// Claims finished farming and starts the next cycle.
pub async fn farm(
    api: &GameApi,
    state: &mut SessionState,
    pause_between: Duration,
) -> Result<FarmOutcome, GameError> {
    let endpoints = api.endpoints();
    let Some(now) = api
        .call::<NowResponse>(state, &ApiRequest::get(endpoints.now()), "server time")
        .await?
    else {
        return Ok(FarmOutcome::Skipped);
    };

    if !should_claim_farm(state.farming_end_ms, now.now) {
        debug!("Farming ends at {}", format_clock(state.farming_end_ms));
        return Ok(FarmOutcome::NotReady);
    }

    let Some(claim) = api
        .call::<FarmingClaimResponse>(state, &ApiRequest::post(endpoints.farming_claim()), "farming claim")
        .await?
    else {
        return Ok(FarmOutcome::Skipped);
    };
    state.balance = claim.available_balance;
    info!("Claim farming | Balance: {}", state.balance);

    pause(pause_between).await;

    let Some(start) = api
        .call::<FarmingStartResponse>(state, &ApiRequest::post(endpoints.farming_start()), "farming start")
        .await?
    else {
        return Ok(FarmOutcome::Skipped);
    };
    state.farming_end_ms = start.end_time;
    info!("Start farming | Claim at {}", format_clock(start.end_time));

    Ok(FarmOutcome::Restarted {
        end_time_ms: start.end_time,
    })
}

/// Result of the referral step.
#[derive(Debug, Clone, PartialEq)]
pub enum ReferralOutcome {
    /// Nothing accrued or nobody invited.
    Nothing,
    Claimed { amount: f64 },
    /// Accrued but not claimable yet.
    Pending { amount: f64, claim_at_ms: i64 },
    Skipped,
}

/// Whether referral points exist at all.
#[allow(clippy::float_cmp)]
fn has_referral_points(friends: &FriendsBalanceResponse) -> bool {
    friends.amount_for_claim != 0.0 && friends.used_invitation != 0
}

/// Claims referral points once they become claimable.
pub async fn claim_referral(
    api: &GameApi,
    state: &mut SessionState,
) -> Result<ReferralOutcome, GameError> {
    let endpoints = api.endpoints();
    let Some(friends) = api
        .call::<FriendsBalanceResponse>(state, &ApiRequest::get(endpoints.friends_balance()), "friends balance")
        .await?
    else {
        return Ok(ReferralOutcome::Skipped);
    };

    if !has_referral_points(&friends) {
        return Ok(ReferralOutcome::Nothing);
    }

    if friends.can_claim {
        let Some(claim) = api
            .call::<FriendsClaimResponse>(state, &ApiRequest::post(endpoints.friends_claim()), "friends claim")
            .await?
        else {
            return Ok(ReferralOutcome::Skipped);
        };
        info!("Claim friends points: {}", claim.claim_balance);
        return Ok(ReferralOutcome::Claimed {
            amount: claim.claim_balance,
        });
    }

    info!(
        "Friends: {} | Points: {} | Claim at {}",
        friends.used_invitation,
        friends.amount_for_claim,
        format_clock(friends.can_claim_at)
    );
    Ok(ReferralOutcome::Pending {
        amount: friends.amount_for_claim,
        claim_at_ms: friends.can_claim_at,
    })
}

pub fn draw_round_count<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(ROUND_COUNT)
}

pub fn draw_points<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.random_range(GAME_POINTS)
}

/// Accepts only canonical, lowercase, hyphenated version-4 UUIDs.
pub fn validate_game_id(game_id: &str) -> Result<Uuid, GameError> {
    match Uuid::parse_str(game_id) {
        Ok(uuid)
            if uuid.get_version() == Some(Version::Random)
                && uuid.get_variant() == Variant::RFC4122
                && uuid.hyphenated().to_string() == game_id =>
        {
            Ok(uuid)
        }
        _ => Err(GameError::InvalidGameId(game_id.to_owned())),
    }
}

/// Plays a random number of games if enough passes are available.
///
/// Returns the number of games claimed. An invalid game id aborts the step
/// before the game is claimed.
pub async fn play_games<R: Rng + Send + ?Sized>(
    api: &GameApi,
    state: &mut SessionState,
    rng: &mut R,
    pacing: &GamePacing,
) -> Result<u32, GameError> {
    let rounds = draw_round_count(rng);
    if state.play_passes < rounds {
        debug!("Not enough passes ({} < {})", state.play_passes, rounds);
        return Ok(0);
    }

    info!("Start playing {} games", rounds);
    let endpoints = api.endpoints();
    let mut played = 0;

    for _ in 0..rounds {
        let Some(play) = api
            .call::<GamePlayResponse>(state, &ApiRequest::post(endpoints.game_play()), "game start")
            .await?
        else {
            break;
        };
        let game_id = validate_game_id(&play.game_id)?;

        pause(random_between(rng, pacing.duration)).await;

        let points = draw_points(rng);
        let request = ApiRequest::post_json(
            endpoints.game_claim(),
            json!({ "gameId": game_id.hyphenated().to_string(), "points": points }),
        );
        if !api.call_ignoring_body(state, &request, "game claim").await? {
            warn!("Game {} was not claimed", game_id);
            pause(random_between(rng, pacing.gap)).await;
            continue;
        }

        state.play_passes = state.play_passes.saturating_sub(1);
        played += 1;
        info!("Finish play in game | Reward: {}", points);

        pause(random_between(rng, pacing.gap)).await;
    }

    Ok(played)
}

/// Formats a millisecond timestamp as local `HH:MM:SS`.
pub fn format_clock(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map_or_else(|| ms.to_string(), |t| t.format("%H:%M:%S").to_string())
}
