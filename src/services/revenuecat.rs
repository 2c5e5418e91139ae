// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! RevenueCat webhook verification and entitlement mapping.

use crate::models::Tier;
use crate::services::stripe::SignatureError;
use ring::hmac;
use serde::Deserialize;

/// Verify `X-RevenueCat-Signature`: hex HMAC-SHA1 of the raw body.
pub fn verify_signature(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let signature = hex::decode(header.trim()).map_err(|_| SignatureError::Malformed)?;

    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret.as_bytes());
    hmac::verify(&key, payload, &signature).map_err(|_| SignatureError::Mismatch)
}

/// Hex HMAC-SHA1 signature of `payload`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret.as_bytes());
    hex::encode(hmac::sign(&key, payload).as_ref())
}

/// Highest tier named by a set of entitlement ids.
pub fn tier_for_entitlements<S: AsRef<str>>(entitlements: &[S]) -> Tier {
    entitlements
        .iter()
        .map(|e| match e.as_ref().to_ascii_lowercase().as_str() {
            "elite" => Tier::Elite,
            "pro" => Tier::Pro,
            _ => Tier::Free,
        })
        .max()
        .unwrap_or(Tier::Free)
}

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    pub event: RevenueCatEvent,
}

#[derive(Debug, Deserialize)]
pub struct RevenueCatEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub app_user_id: String,
    #[serde(default)]
    pub entitlement_ids: Option<Vec<String>>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub price_in_purchased_currency: Option<f64>,
}

/// What an event type does to the user's tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Grant,
    Revoke,
    LogOnly,
}

pub fn action_for(event_type: &str) -> EventAction {
    match event_type {
        "INITIAL_PURCHASE" | "RENEWAL" | "PRODUCT_CHANGE" | "UNCANCELLATION"
        | "NON_RENEWING_PURCHASE" => EventAction::Grant,
        "EXPIRATION" => EventAction::Revoke,
        _ => EventAction::LogOnly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip_and_tamper() {
        let body = br#"{"event":{"id":"e1"}}"#;
        let sig = sign(body, "rc_test_secret");
        assert!(verify_signature(Some(&sig), body, "rc_test_secret").is_ok());
        assert_eq!(
            verify_signature(Some(&sig), b"{}", "rc_test_secret"),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_signature(Some("zz-not-hex"), body, "rc_test_secret"),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_signature(None, body, "rc_test_secret"),
            Err(SignatureError::Missing)
        );
    }

    #[test]
    fn test_entitlement_mapping() {
        assert_eq!(tier_for_entitlements(&["pro"]), Tier::Pro);
        assert_eq!(tier_for_entitlements(&["pro", "Elite"]), Tier::Elite);
        assert_eq!(tier_for_entitlements(&["ad_free"]), Tier::Free);
        assert_eq!(tier_for_entitlements::<&str>(&[]), Tier::Free);
    }

    #[test]
    fn test_event_actions() {
        assert_eq!(action_for("RENEWAL"), EventAction::Grant);
        assert_eq!(action_for("EXPIRATION"), EventAction::Revoke);
        assert_eq!(action_for("CANCELLATION"), EventAction::LogOnly);
        assert_eq!(action_for("BILLING_ISSUE"), EventAction::LogOnly);
    }
}
