// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Payment provider webhooks (Stripe and RevenueCat).
//!
//! Both endpoints authenticate with a signature over the raw body, so they
//! take `Bytes` rather than `Json`. Grants are idempotent on the provider's
//! event/session id; a redelivered event is acknowledged without effect.
//! Errors other than bad signatures or unknown users surface as 5xx so the
//! provider retries.

use crate::db::payments::{GrantOutcome, StripeIds};
use crate::error::{AppError, Result};
use crate::models::{PaymentProvider, PurchaseKind, PurchaseRecord, Tier};
use crate::services::revenuecat::{self, EventAction, WebhookBody};
use crate::services::stripe::{
    self, CheckoutSessionObject, StripeEvent, SubscriptionObject,
};
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use std::sync::Arc;

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const REVENUECAT_SIGNATURE_HEADER: &str = "x-revenuecat-signature";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/webhooks/stripe", post(stripe_webhook))
        .route("/webhooks/revenuecat", post(revenuecat_webhook))
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Unknown users are acknowledged; the provider retrying cannot fix them.
fn acknowledge_missing_user(result: Result<GrantOutcome>, event_id: &str) -> Result<StatusCode> {
    match result {
        Ok(GrantOutcome::Applied) => Ok(StatusCode::OK),
        Ok(GrantOutcome::Duplicate) => {
            tracing::info!(event_id, "Duplicate webhook delivery ignored");
            Ok(StatusCode::OK)
        }
        Err(AppError::NotFound(msg)) => {
            tracing::warn!(event_id, reason = %msg, "Webhook references unknown record");
            Ok(StatusCode::OK)
        }
        Err(e) => Err(e),
    }
}

// ─── Stripe ─────────────────────────────────────────────────────

async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    if let Err(e) = stripe::verify_webhook_signature(
        header(&headers, STRIPE_SIGNATURE_HEADER),
        &body,
        &state.config.stripe_webhook_secret,
        stripe::now_unix(),
    ) {
        tracing::warn!(error = %e, "Rejected Stripe webhook");
        return Err(e.into());
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid Stripe event: {}", e)))?;

    tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::BadRequest(format!("Invalid checkout session: {}", e)))?;
            handle_checkout_completed(&state, session).await
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::BadRequest(format!("Invalid subscription: {}", e)))?;
            match state.db.cancel_subscription(&subscription.id).await? {
                Some(user) => tracing::info!(
                    user_id = %user.user_id,
                    subscription_id = %subscription.id,
                    "Subscription cancelled, user downgraded"
                ),
                None => tracing::warn!(
                    subscription_id = %subscription.id,
                    "Cancelled subscription has no matching user"
                ),
            }
            Ok(StatusCode::OK)
        }
        other => {
            tracing::debug!(event_type = other, "Ignoring Stripe event");
            Ok(StatusCode::OK)
        }
    }
}

/// Translate a completed Checkout session into a purchase record.
///
/// Returns `None` when the session lacks the metadata our checkout sets.
pub fn purchase_from_session(session: &CheckoutSessionObject) -> Option<PurchaseRecord> {
    let user_id = session
        .client_reference_id
        .clone()
        .or_else(|| session.metadata.get("user_id").cloned())?;

    let (kind, tier, plan_id) = match session.metadata.get("kind").map(String::as_str) {
        Some("subscription") => {
            let tier = match session.metadata.get("tier").map(String::as_str) {
                Some("pro") => Tier::Pro,
                Some("elite") => Tier::Elite,
                _ => return None,
            };
            (PurchaseKind::Subscription, Some(tier), None)
        }
        Some("plan") => (
            PurchaseKind::Plan,
            None,
            Some(session.metadata.get("plan_id")?.clone()),
        ),
        _ => return None,
    };

    Some(PurchaseRecord {
        purchase_id: session.id.clone(),
        provider: PaymentProvider::Stripe,
        user_id,
        kind,
        tier,
        plan_id,
        amount_cents: session.amount_total,
        created_at: Utc::now(),
    })
}

async fn handle_checkout_completed(
    state: &AppState,
    session: CheckoutSessionObject,
) -> Result<StatusCode> {
    let Some(purchase) = purchase_from_session(&session) else {
        tracing::warn!(session_id = %session.id, "Checkout session without purchase metadata");
        return Ok(StatusCode::OK);
    };

    tracing::info!(
        session_id = %session.id,
        user_id = %purchase.user_id,
        kind = ?purchase.kind,
        "Applying Stripe purchase"
    );

    let ids = StripeIds {
        customer_id: session.customer.clone(),
        subscription_id: session.subscription.clone(),
    };
    let result = state.db.apply_purchase(purchase, ids).await;
    acknowledge_missing_user(result, &session.id)
}

// ─── RevenueCat ─────────────────────────────────────────────────

async fn revenuecat_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    if let Err(e) = revenuecat::verify_signature(
        header(&headers, REVENUECAT_SIGNATURE_HEADER),
        &body,
        &state.config.revenuecat_webhook_secret,
    ) {
        tracing::warn!(error = %e, "Rejected RevenueCat webhook");
        return Err(AppError::Unauthorized);
    }

    let WebhookBody { event } = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid RevenueCat event: {}", e)))?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        app_user_id = %event.app_user_id,
        "RevenueCat webhook received"
    );

    match revenuecat::action_for(&event.event_type) {
        EventAction::Grant => {
            let entitlements = event.entitlement_ids.unwrap_or_default();
            let tier = revenuecat::tier_for_entitlements(&entitlements);
            if tier == Tier::Free {
                tracing::warn!(event_id = %event.id, ?entitlements, "Grant without a known entitlement");
                return Ok(StatusCode::OK);
            }

            let purchase = PurchaseRecord {
                purchase_id: event.id.clone(),
                provider: PaymentProvider::RevenueCat,
                user_id: event.app_user_id,
                kind: PurchaseKind::Subscription,
                tier: Some(tier),
                plan_id: None,
                amount_cents: event
                    .price_in_purchased_currency
                    .filter(|p| *p >= 0.0)
                    .map(|p| (p * 100.0).round() as u64),
                created_at: Utc::now(),
            };
            let result = state.db.apply_purchase(purchase, StripeIds::default()).await;
            acknowledge_missing_user(result, &event.id)
        }
        EventAction::Revoke => {
            let result = state
                .db
                .expire_store_subscription(&event.app_user_id)
                .await
                .map(|user| {
                    if user.tier != Tier::Free {
                        tracing::info!(
                            user_id = %user.user_id,
                            tier = user.tier.as_str(),
                            "Store subscription expired; Stripe subscription keeps tier"
                        );
                    }
                    GrantOutcome::Applied
                });
            acknowledge_missing_user(result, &event.id)
        }
        EventAction::LogOnly => Ok(StatusCode::OK),
    }
}
