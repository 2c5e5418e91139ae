// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Web checkout. Entitlements are granted by the Stripe webhook, never here.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Tier;
use crate::routes::plans::visible_plan;
use crate::routes::users::load_user;
use crate::services::stripe::CheckoutItem;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/payments/checkout", post(create_checkout))
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CheckoutRequest {
    Subscription { tier: Tier },
    Plan { plan_id: String },
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    /// Hosted checkout page to open
    pub url: String,
}

/// Stripe price id configured for a paid tier.
fn price_for_tier(state: &AppState, tier: Tier) -> Result<String> {
    let price = match tier {
        Tier::Pro => &state.config.stripe_price_pro,
        Tier::Elite => &state.config.stripe_price_elite,
        Tier::Free => {
            return Err(AppError::BadRequest(
                "tier must be pro or elite".to_string(),
            ))
        }
    };
    if price.is_empty() {
        return Err(AppError::Unavailable(format!(
            "{} subscriptions are not configured",
            tier.as_str()
        )));
    }
    Ok(price.clone())
}

async fn create_checkout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let item = match body {
        CheckoutRequest::Subscription { tier } => CheckoutItem::Subscription {
            price_id: price_for_tier(&state, tier)?,
            tier: tier.as_str().to_string(),
        },
        CheckoutRequest::Plan { plan_id } => {
            let plan = visible_plan(&state, &auth, &plan_id).await?;
            if !plan.published {
                return Err(AppError::NotFound(format!("Plan {} not found", plan_id)));
            }
            if plan.is_free() {
                return Err(AppError::BadRequest(
                    "Free plans are acquired directly".to_string(),
                ));
            }
            if state.db.owns_plan(&auth.user_id, &plan_id).await? {
                return Err(AppError::Conflict("Plan already owned".to_string()));
            }
            CheckoutItem::Plan {
                plan_id: plan.plan_id,
                title: plan.title,
                amount_cents: plan.price_cents,
            }
        }
    };

    let user = load_user(&state, &auth.user_id).await?;
    let base = state.config.frontend_url.trim_end_matches('/');
    let success_url = format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", base);
    let cancel_url = format!("{}/checkout/cancel", base);

    let session = state
        .stripe
        .create_checkout_session(
            &auth.user_id,
            user.stripe_customer_id.as_deref(),
            &item,
            &success_url,
            &cancel_url,
        )
        .await?;

    let url = session
        .url
        .ok_or_else(|| AppError::Upstream("Stripe session has no URL".to_string()))?;

    Ok(Json(CheckoutResponse {
        session_id: session.id,
        url,
    }))
}
