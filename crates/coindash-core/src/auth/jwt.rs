//! Expiry inspection for JWT access tokens.
//!
//! The payload is decoded without signature validation; this is only
//! used to show the user how long the session has left.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

fn decode_claims(token: &str) -> Option<Claims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Expiry time from the `exp` claim, if the token is a readable JWT
pub fn token_expiration(token: &str) -> Option<DateTime<Utc>> {
    decode_claims(token).and_then(|c| DateTime::from_timestamp(c.exp, 0))
}

/// Tokens that cannot be parsed count as expired.
pub fn is_token_expired(token: &str) -> bool {
    is_token_expired_at(token, Utc::now())
}

pub fn is_token_expired_at(token: &str, now: DateTime<Utc>) -> bool {
    token_expiration(token).map(|exp| exp < now).unwrap_or(true)
}

/// Minutes remaining until expiry (for display), clamped at zero
pub fn minutes_until_expiry(token: &str) -> Option<i64> {
    token_expiration(token).map(|exp| (exp - Utc::now()).num_minutes().max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_token(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"user_id":1}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    #[test]
    fn test_expiration_decoded() {
        let token = make_token(1_700_000_000);
        assert_eq!(
            token_expiration(&token),
            DateTime::from_timestamp(1_700_000_000, 0)
        );
    }

    #[test]
    fn test_expired_relative_to_now() {
        let now = Utc::now();
        let future = make_token((now + Duration::hours(1)).timestamp());
        let past = make_token((now - Duration::minutes(1)).timestamp());
        assert!(!is_token_expired_at(&future, now));
        assert!(is_token_expired_at(&past, now));
    }

    #[test]
    fn test_garbage_counts_as_expired() {
        assert!(is_token_expired("not-a-jwt"));
        assert!(is_token_expired("a.!!!.c"));
        assert_eq!(minutes_until_expiry("opaque"), None);
    }
}
