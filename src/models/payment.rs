// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Purchase records written by payment webhooks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Tier;
use crate::time_utils::rfc3339_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Stripe,
    RevenueCat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseKind {
    Subscription,
    Plan,
}

/// One processed payment event.
///
/// Keyed by the provider's session/event id, so a replayed webhook finds the
/// existing record and is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub purchase_id: String,
    pub provider: PaymentProvider,
    pub user_id: String,
    pub kind: PurchaseKind,
    #[serde(default)]
    pub tier: Option<Tier>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<u64>,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}
