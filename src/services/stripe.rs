// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe Checkout client and webhook signature verification.

use crate::error::AppError;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_URL: &str = "https://api.stripe.com";
const STRIPE_HTTP_TIMEOUT: Duration = Duration::from_secs(15);
/// Maximum age of a signed webhook payload.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("malformed signature header")]
    Malformed,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::BadRequest(format!("Invalid webhook signature: {}", err))
    }
}

/// Verify a `Stripe-Signature` header (`t=...,v1=...`) against the raw body.
///
/// Any of several `v1` entries may match (Stripe sends more than one while a
/// secret is being rolled).
pub fn verify_webhook_signature(
    header: Option<&str>,
    payload: &[u8],
    secret: &str,
    now_unix: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now_unix - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let expected = sign_payload(timestamp, payload, secret);
    let matched = signatures
        .iter()
        .any(|sig| bool::from(sig.as_bytes().ct_eq(expected.as_bytes())));

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{payload}"`.
pub fn sign_payload(timestamp: i64, payload: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// What a checkout session sells.
#[derive(Debug, Clone)]
pub enum CheckoutItem {
    /// Recurring subscription at a configured price id.
    Subscription { tier: String, price_id: String },
    /// One-off plan purchase priced inline.
    Plan {
        plan_id: String,
        title: String,
        amount_cents: u32,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

/// Minimal Stripe API client for Checkout.
pub struct StripeClient {
    http_client: reqwest::Client,
    secret_key: String,
    api_url: String,
}

impl StripeClient {
    pub fn new(secret_key: &str) -> anyhow::Result<Self> {
        Self::with_api_url(secret_key, STRIPE_API_URL)
    }

    pub fn with_api_url(secret_key: &str, api_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(STRIPE_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            secret_key: secret_key.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a Checkout session for `user_id`.
    pub async fn create_checkout_session(
        &self,
        user_id: &str,
        customer_id: Option<&str>,
        item: &CheckoutItem,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        let params = checkout_params(user_id, customer_id, item, success_url, cancel_url);

        let response = self
            .http_client
            .post(format!("{}/v1/checkout/sessions", self.api_url))
            .bearer_auth(&self.secret_key)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(encode_form(&params))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_default();
            tracing::error!(status = %status, message = %message, "Stripe checkout failed");
            return Err(AppError::Upstream(format!(
                "Stripe returned {}: {}",
                status, message
            )));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid Stripe response: {}", e)))?;

        tracing::info!(user_id, session_id = %session.id, "Created Stripe checkout session");
        Ok(session)
    }
}

/// Form parameters for `POST /v1/checkout/sessions`.
fn checkout_params(
    user_id: &str,
    customer_id: Option<&str>,
    item: &CheckoutItem,
    success_url: &str,
    cancel_url: &str,
) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![
        ("success_url".into(), success_url.into()),
        ("cancel_url".into(), cancel_url.into()),
        ("client_reference_id".into(), user_id.into()),
        ("metadata[user_id]".into(), user_id.into()),
        ("line_items[0][quantity]".into(), "1".into()),
    ];

    if let Some(customer) = customer_id {
        params.push(("customer".into(), customer.into()));
    }

    match item {
        CheckoutItem::Subscription { tier, price_id } => {
            params.push(("mode".into(), "subscription".into()));
            params.push(("metadata[kind]".into(), "subscription".into()));
            params.push(("metadata[tier]".into(), tier.clone()));
            params.push(("line_items[0][price]".into(), price_id.clone()));
        }
        CheckoutItem::Plan {
            plan_id,
            title,
            amount_cents,
        } => {
            params.push(("mode".into(), "payment".into()));
            params.push(("metadata[kind]".into(), "plan".into()));
            params.push(("metadata[plan_id]".into(), plan_id.clone()));
            params.push(("line_items[0][price_data][currency]".into(), "usd".into()));
            params.push((
                "line_items[0][price_data][unit_amount]".into(),
                amount_cents.to_string(),
            ));
            params.push((
                "line_items[0][price_data][product_data][name]".into(),
                title.clone(),
            ));
        }
    }

    params
}

fn encode_form(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// ─── Webhook Payloads ───────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_total: Option<u64>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn header_for(payload: &[u8], t: i64) -> String {
        format!("t={},v1={}", t, sign_payload(t, payload, SECRET))
    }

    #[test]
    fn test_valid_signature() {
        let body = br#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = header_for(body, now);
        assert!(verify_webhook_signature(Some(&header), body, SECRET, now + 10).is_ok());
    }

    #[test]
    fn test_any_v1_may_match() {
        let body = b"{}";
        let now = 1_700_000_000;
        let good = sign_payload(now, body, SECRET);
        let header = format!("t={},v1=deadbeef,v1={}", now, good);
        assert!(verify_webhook_signature(Some(&header), body, SECRET, now).is_ok());
    }

    #[test]
    fn test_rejections() {
        let body = b"{}";
        let now = 1_700_000_000;

        assert_eq!(
            verify_webhook_signature(None, body, SECRET, now),
            Err(SignatureError::Missing)
        );
        assert_eq!(
            verify_webhook_signature(Some("v1=abc"), body, SECRET, now),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_webhook_signature(Some(&header_for(body, now)), body, SECRET, now + 301),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_webhook_signature(Some(&header_for(body, now)), b"{\"x\":1}", SECRET, now),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verify_webhook_signature(Some(&header_for(body, now)), body, "other", now),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_plan_checkout_params() {
        let item = CheckoutItem::Plan {
            plan_id: "p1".into(),
            title: "Cut & Bulk".into(),
            amount_cents: 1999,
        };
        let params = checkout_params("u1", None, &item, "https://a/ok", "https://a/no");
        assert!(params.contains(&("mode".into(), "payment".into())));
        assert!(params.contains(&(
            "line_items[0][price_data][unit_amount]".into(),
            "1999".into()
        )));

        let body = encode_form(&params);
        assert!(body.contains("metadata%5Bplan_id%5D=p1"));
        assert!(body.contains("Cut%20%26%20Bulk"));
    }
}
