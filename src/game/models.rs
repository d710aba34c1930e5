//! Response payloads of the game API.
//!
//! Numbers arrive either as JSON numbers or as decimal strings, so numeric
//! fields go through the lenient deserializers below.

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// `POST auth/provider/..` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: TokenPair,
}

/// `GET user/balance` answer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    #[serde(default, deserialize_with = "amount")]
    pub available_balance: f64,
    #[serde(default)]
    pub play_passes: u32,
    #[serde(default)]
    pub farming: Option<FarmingInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingInfo {
    #[serde(default, deserialize_with = "millis")]
    pub end_time: i64,
}

/// `GET time/now` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct NowResponse {
    #[serde(deserialize_with = "millis")]
    pub now: i64,
}

/// `POST farming/claim` answer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingClaimResponse {
    #[serde(default, deserialize_with = "amount")]
    pub available_balance: f64,
}

/// `POST farming/start` answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingStartResponse {
    #[serde(deserialize_with = "millis")]
    pub end_time: i64,
}

/// `GET friends/balance` answer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsBalanceResponse {
    #[serde(default, deserialize_with = "amount")]
    pub amount_for_claim: f64,
    #[serde(default)]
    pub can_claim: bool,
    #[serde(default)]
    pub used_invitation: u32,
    #[serde(default, deserialize_with = "millis")]
    pub can_claim_at: i64,
}

/// `POST friends/claim` answer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsClaimResponse {
    #[serde(default, deserialize_with = "amount")]
    pub claim_balance: f64,
}

/// `POST game/play` answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePlayResponse {
    pub game_id: String,
}

/// `GET daily-reward` answer.
#[derive(Debug, Clone, Deserialize)]
pub struct DailyResponse {
    #[serde(default)]
    pub days: Vec<DailyDay>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyDay {
    pub original: u32,
    pub reward: DailyReward,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DailyReward {
    #[serde(default)]
    pub passes: u32,
    #[serde(default, deserialize_with = "amount")]
    pub points: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Text(String),
}

#[allow(clippy::cast_possible_truncation)]
fn millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) => Ok(v),
        Lenient::Float(v) => Ok(v as i64),
        Lenient::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|v| v as i64))
                .map_err(|_| de::Error::custom(format!("invalid timestamp: {s}")))
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Lenient::deserialize(deserializer)? {
        Lenient::Int(v) => Ok(v as f64),
        Lenient::Float(v) => Ok(v),
        Lenient::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid amount: {s}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_balance_accepts_strings_and_numbers() {
        let balance: BalanceResponse = serde_json::from_value(json!({
            "availableBalance": "100.5",
            "playPasses": 20,
            "farming": {"endTime": "1000"}
        }))
        .unwrap();
        assert!((balance.available_balance - 100.5).abs() < f64::EPSILON);
        assert_eq!(balance.play_passes, 20);
        assert_eq!(balance.farming.unwrap().end_time, 1000);

        let numeric: BalanceResponse = serde_json::from_value(json!({
            "availableBalance": 100,
            "playPasses": 0,
            "farming": {"endTime": 1_700_000_000_000_i64}
        }))
        .unwrap();
        assert_eq!(numeric.farming.unwrap().end_time, 1_700_000_000_000);
    }

    #[test]
    fn test_balance_without_farming() {
        let balance: BalanceResponse = serde_json::from_value(json!({})).unwrap();
        assert!(balance.farming.is_none());
        assert_eq!(balance.play_passes, 0);
    }

    #[test]
    fn test_friends_defaults() {
        let friends: FriendsBalanceResponse =
            serde_json::from_value(json!({"amountForClaim": "0"})).unwrap();
        assert!(friends.amount_for_claim.abs() < f64::EPSILON);
        assert!(!friends.can_claim);
        assert_eq!(friends.used_invitation, 0);
    }

    #[test]
    fn test_invalid_timestamp_rejected() {
        assert!(serde_json::from_value::<NowResponse>(json!({"now": "soon"})).is_err());
    }
}
