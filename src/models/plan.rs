// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout and meal plans sold in the marketplace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Tier;
use crate::time_utils::rfc3339_millis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Workout,
    Meal,
}

impl PlanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanKind::Workout => "workout",
            PlanKind::Meal => "meal",
        }
    }
}

/// Plan listing stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub creator_id: String,
    pub title: String,
    pub description: String,
    pub kind: PlanKind,
    /// Price in cents (USD); 0 means free
    pub price_cents: u32,
    /// Minimum subscription tier needed to acquire the plan
    #[serde(default)]
    pub required_tier: Tier,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Ordered plan contents (sessions, meals)
    pub items: Vec<String>,
    #[serde(default)]
    pub purchase_count: u32,
    pub published: bool,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn is_free(&self) -> bool {
        self.price_cents == 0
    }

    /// Unpublished plans are visible to their creator only (and admins).
    pub fn visible_to(&self, user_id: &str, is_admin: bool) -> bool {
        self.published || is_admin || self.creator_id == user_id
    }
}

/// Ownership record linking a user to a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPlan {
    pub user_id: String,
    pub plan_id: String,
    /// "free", "stripe" or "admin"
    pub source: String,
    #[serde(with = "rfc3339_millis")]
    pub acquired_at: DateTime<Utc>,
}

impl UserPlan {
    pub fn document_id(user_id: &str, plan_id: &str) -> String {
        format!("{}_{}", user_id, plan_id)
    }
}
