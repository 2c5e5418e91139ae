// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-app notification model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::time_utils::rfc3339_millis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    /// e.g. "challenge_accepted", "challenge_resolved", "slot_joined", "admin"
    pub kind: String,
    pub title: String,
    pub body: String,
    /// Deep-link payload forwarded to the push message
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    #[serde(default)]
    pub read: bool,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}
