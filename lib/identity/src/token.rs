//! Provider-issued ID tokens.
//!
//! ID tokens are JWTs: `base64url(header).base64url(payload).signature`.
//! The client trusts the provider that handed it the token and only decodes
//! the payload to read claims; signature verification is the backend's job.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rootcause::prelude::Report;
use serde_json::Value as JsonValue;
use std::fmt;

use crate::error::ProviderError;

/// Name of the payload claim carrying the user's group memberships.
pub const GROUPS_CLAIM: &str = "cognito:groups";

/// A serialized ID token as issued by the identity provider.
#[derive(Clone, PartialEq, Eq)]
pub struct IdToken {
    raw: String,
}

impl IdToken {
    /// Wraps a serialized JWT.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Returns the serialized token, as sent in `Authorization` headers.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decodes the claim payload without verifying the signature.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidToken`] if the token is not a
    /// three-part JWT or its payload is not base64url-encoded JSON.
    pub fn decode_payload(&self) -> Result<JsonValue, Report<ProviderError>> {
        let parts: Vec<&str> = self.raw.split('.').collect();
        if parts.len() != 3 {
            return Err(ProviderError::InvalidToken {
                reason: "expected three dot-separated segments".to_string(),
            }
            .into());
        }

        // Some issuers pad the segments even though JWTs should not be.
        let payload_bytes = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| ProviderError::InvalidToken {
                reason: format!("failed to decode payload: {e}"),
            })?;

        let payload: JsonValue =
            serde_json::from_slice(&payload_bytes).map_err(|e| ProviderError::InvalidToken {
                reason: format!("failed to parse payload: {e}"),
            })?;

        if !payload.is_object() {
            return Err(ProviderError::InvalidToken {
                reason: "payload is not a JSON object".to_string(),
            }
            .into());
        }
        Ok(payload)
    }

    /// Returns the expiry time from the `exp` claim.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidToken`] if the payload cannot be
    /// decoded or has no numeric `exp` claim.
    pub fn expires_at(&self) -> Result<DateTime<Utc>, Report<ProviderError>> {
        let payload = self.decode_payload()?;
        let exp = payload
            .get("exp")
            .and_then(JsonValue::as_i64)
            .ok_or_else(|| ProviderError::InvalidToken {
                reason: "missing exp claim".to_string(),
            })?;
        Utc.timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| {
                ProviderError::InvalidToken {
                    reason: format!("exp claim out of range: {exp}"),
                }
                .into()
            })
    }

    /// Returns true if the token expires within `skew` of `now`.
    ///
    /// Tokens without a readable expiry count as expired.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.expires_at().map_or(true, |exp| exp <= now + skew)
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdToken").finish_non_exhaustive()
    }
}

/// Reads group names from a decoded ID token payload.
///
/// The claim is normally an array of strings; a comma-separated string is
/// also accepted. A missing claim yields no groups.
#[must_use]
pub fn groups_from_payload(payload: &JsonValue) -> Vec<String> {
    match payload.get(GROUPS_CLAIM) {
        Some(JsonValue::Array(values)) => values
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        Some(JsonValue::String(joined)) => joined
            .split(',')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(ToString::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an unsigned JWT carrying `payload`.
    pub(crate) fn jwt(payload: &JsonValue) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    /// Builds an ID token expiring `seconds` from now.
    pub(crate) fn id_token_expiring_in(seconds: i64, extra: JsonValue) -> IdToken {
        let mut payload = serde_json::json!({
            "sub": "3f1c0b7e",
            "exp": (Utc::now() + Duration::seconds(seconds)).timestamp(),
        });
        if let (Some(target), JsonValue::Object(extra)) = (payload.as_object_mut(), extra) {
            target.extend(extra);
        }
        IdToken::new(jwt(&payload))
    }

    #[test]
    fn decodes_payload_claims() {
        let token = IdToken::new(jwt(&serde_json::json!({"email": "a@b.com"})));
        let payload = token.decode_payload().expect("decode");
        assert_eq!(payload["email"], "a@b.com");
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(IdToken::new("not-a-jwt").decode_payload().is_err());
        assert!(IdToken::new("a.!!!.c").decode_payload().is_err());
        let not_json = format!("a.{}.c", URL_SAFE_NO_PAD.encode("plain text"));
        assert!(IdToken::new(not_json).decode_payload().is_err());
    }

    #[test]
    fn reads_expiry() {
        let token = id_token_expiring_in(3600, serde_json::json!({}));
        let exp = token.expires_at().expect("exp");
        assert!(exp > Utc::now());
        assert!(!token.expires_within(Utc::now(), Duration::seconds(60)));
    }

    #[test]
    fn expired_and_unreadable_tokens_count_as_expiring() {
        let expired = id_token_expiring_in(-10, serde_json::json!({}));
        assert!(expired.expires_within(Utc::now(), Duration::zero()));

        let no_exp = IdToken::new(jwt(&serde_json::json!({"sub": "x"})));
        assert!(no_exp.expires_within(Utc::now(), Duration::zero()));
    }

    #[test]
    fn groups_from_array_claim() {
        let payload = serde_json::json!({"cognito:groups": ["doctors", "staff"]});
        assert_eq!(groups_from_payload(&payload), vec!["doctors", "staff"]);
    }

    #[test]
    fn groups_from_joined_claim() {
        let payload = serde_json::json!({"cognito:groups": "doctors, staff"});
        assert_eq!(groups_from_payload(&payload), vec!["doctors", "staff"]);
    }

    #[test]
    fn missing_groups_claim_is_empty() {
        let payload = serde_json::json!({"sub": "x"});
        assert!(groups_from_payload(&payload).is_empty());
    }

    #[test]
    fn debug_does_not_leak_token() {
        let token = IdToken::new("header.payload.secret-signature");
        assert!(!format!("{token:?}").contains("secret-signature"));
    }
}
