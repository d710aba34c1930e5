//! Generated device identities for accounts without one.

use rand::Rng;
use rand::seq::IndexedRandom;
use regex::Regex;

const IOS_VERSIONS: &[(&str, &str)] = &[
    ("16_6", "16.6"),
    ("17_2", "17.2"),
    ("17_4", "17.4"),
    ("17_5", "17.5"),
    ("18_0", "18.0"),
    ("18_1", "18.1"),
];

const MODEL_SUFFIXES: &[&str] = &["", "Pro", "Max", "Pro Max"];

/// User agent and device model emulated by one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub user_agent: String,
    pub device_model: String,
}

impl DeviceIdentity {
    /// Generates a random mobile Safari identity on iOS.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (os, safari) = IOS_VERSIONS
            .choose(rng)
            .copied()
            .unwrap_or(("17_4", "17.4"));
        let user_agent = format!(
            "Mozilla/5.0 (iPhone; CPU iPhone OS {os} like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/{safari} Mobile/15E148 Safari/604.1"
        );

        let device = device_from_user_agent(&user_agent).unwrap_or("iPhone");
        let number = rng.random_range(11..=15);
        let suffix = MODEL_SUFFIXES.choose(rng).copied().unwrap_or_default();
        let device_model = format!("{device} {number} {suffix}").trim().to_owned();

        Self {
            user_agent,
            device_model,
        }
    }
}

/// Extracts the device token from a user agent (`(iPhone; ...` gives `iPhone`).
fn device_from_user_agent(user_agent: &str) -> Option<&str> {
    let pattern = Regex::new(r"\(([^;]+);").ok()?;
    pattern
        .captures(user_agent)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_device_from_user_agent() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X)";
        assert_eq!(device_from_user_agent(ua), Some("iPhone"));
        assert_eq!(device_from_user_agent("curl/8.0"), None);
    }

    #[test]
    fn test_generated_identity_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let device = DeviceIdentity::generate(&mut rng);
            assert!(device.user_agent.contains("iPhone OS"));
            assert!(device.device_model.starts_with("iPhone 1"));
            assert_eq!(device.device_model, device.device_model.trim());

            let number: u32 = device.device_model.split_whitespace().nth(1).unwrap().parse().unwrap();
            assert!((11..=15).contains(&number));
        }
    }
}
