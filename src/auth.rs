//! Telegram WebApp login verification.
//!
//! The routing layer hands the raw `initData` query string to
//! [`LoginVerifier::verify`]; on success it gets a [`VerifiedIdentity`] that
//! can be passed by value into [`crate::TransactionCoordinator::onboard`].
//! Verification is always enforced; the engine never accepts an unverified
//! identity.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{AppResult, DomainError};

type HmacSha256 = Hmac<Sha256>;

/// Identity extracted from a login payload whose signature checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub telegram_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub photo_url: String,
}

#[derive(Debug, Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginVerifier {
    bot_token: String,
}

impl LoginVerifier {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
        }
    }

    /// Verify a Telegram `initData` string and extract the user identity.
    ///
    /// The signature scheme: every `key=value` pair except `hash` is
    /// percent-decoded, sorted by key and joined with `\n`; the expected hash
    /// is HMAC-SHA256 of that string, keyed with
    /// `HMAC-SHA256(key = bot_token, msg = "WebAppData")`.
    pub fn verify(&self, init_data: &str) -> AppResult<VerifiedIdentity> {
        if init_data.is_empty() {
            return Err(DomainError::LoginRejected("missing initData"));
        }

        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut provided_hash: Option<String> = None;

        for part in init_data.split('&') {
            let (key, value) = part
                .split_once('=')
                .ok_or(DomainError::LoginRejected("malformed initData"))?;
            let key = urlencoding::decode(key)
                .map_err(|_| DomainError::LoginRejected("malformed initData"))?
                .into_owned();
            let value = urlencoding::decode(value)
                .map_err(|_| DomainError::LoginRejected("malformed initData"))?
                .into_owned();

            if key == "hash" {
                provided_hash = Some(value);
            } else {
                pairs.push((key, value));
            }
        }

        let provided_hash = provided_hash.ok_or(DomainError::LoginRejected("missing hash"))?;
        let provided_hash = hex::decode(provided_hash)
            .map_err(|_| DomainError::LoginRejected("malformed hash"))?;

        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        let check_string = pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut secret = HmacSha256::new_from_slice(self.bot_token.as_bytes())
            .map_err(|_| DomainError::LoginRejected("invalid bot token"))?;
        secret.update(b"WebAppData");
        let secret = secret.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&secret)
            .map_err(|_| DomainError::LoginRejected("invalid bot token"))?;
        mac.update(check_string.as_bytes());
        // Constant-time comparison via the Mac trait.
        mac.verify_slice(&provided_hash)
            .map_err(|_| DomainError::LoginRejected("invalid initData hash"))?;

        let user_json = pairs
            .iter()
            .find(|(k, _)| k == "user")
            .map(|(_, v)| v.as_str())
            .ok_or(DomainError::LoginRejected("missing user in initData"))?;

        let user: TelegramUser = serde_json::from_str(user_json)
            .map_err(|_| DomainError::LoginRejected("invalid user in initData"))?;

        Ok(VerifiedIdentity {
            telegram_id: user.id,
            username: user.username.unwrap_or_default(),
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            photo_url: user.photo_url.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "7203100000:AAFakeTokenForTests";

    /// Build a correctly signed initData string from decoded pairs.
    fn sign(pairs: &[(&str, &str)]) -> String {
        let mut sorted: Vec<_> = pairs.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        let check_string = sorted
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("\n");

        let mut secret = HmacSha256::new_from_slice(TOKEN.as_bytes()).unwrap();
        secret.update(b"WebAppData");
        let secret = secret.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&secret).unwrap();
        mac.update(check_string.as_bytes());
        let hash = hex::encode(mac.finalize().into_bytes());

        let mut encoded: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        encoded.push(format!("hash={hash}"));
        encoded.join("&")
    }

    #[test]
    fn valid_payload_yields_identity() {
        let init_data = sign(&[
            ("auth_date", "1735689600"),
            ("query_id", "AAE0x"),
            (
                "user",
                r#"{"id":42,"username":"nova","first_name":"Nova","last_name":"K","photo_url":"https://t.me/i/nova.jpg"}"#,
            ),
        ]);

        let identity = LoginVerifier::new(TOKEN).verify(&init_data).unwrap();
        assert_eq!(identity.telegram_id, 42);
        assert_eq!(identity.username, "nova");
        assert_eq!(identity.first_name, "Nova");
        assert_eq!(identity.photo_url, "https://t.me/i/nova.jpg");
    }

    #[test]
    fn missing_profile_fields_default_to_empty() {
        let init_data = sign(&[("auth_date", "1735689600"), ("user", r#"{"id":7}"#)]);

        let identity = LoginVerifier::new(TOKEN).verify(&init_data).unwrap();
        assert_eq!(identity.telegram_id, 7);
        assert_eq!(identity.username, "");
        assert_eq!(identity.last_name, "");
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let init_data = sign(&[("auth_date", "1735689600"), ("user", r#"{"id":7}"#)]);
        let tampered = init_data.replace("%22id%22%3A7", "%22id%22%3A8");

        let err = LoginVerifier::new(TOKEN).verify(&tampered).unwrap_err();
        assert!(matches!(err, DomainError::LoginRejected(_)));
    }

    #[test]
    fn wrong_token_is_rejected() {
        let init_data = sign(&[("auth_date", "1735689600"), ("user", r#"{"id":7}"#)]);

        let err = LoginVerifier::new("other-token").verify(&init_data).unwrap_err();
        assert!(matches!(err, DomainError::LoginRejected("invalid initData hash")));
    }

    #[test]
    fn missing_hash_is_rejected() {
        let err = LoginVerifier::new(TOKEN)
            .verify("auth_date=1735689600&user=%7B%22id%22%3A7%7D")
            .unwrap_err();
        assert!(matches!(err, DomainError::LoginRejected("missing hash")));
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = LoginVerifier::new(TOKEN).verify("").unwrap_err();
        assert!(matches!(err, DomainError::LoginRejected("missing initData")));
    }
}
