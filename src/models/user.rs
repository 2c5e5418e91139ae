// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::rfc3339_millis;

/// Subscription level. Ordered so that `tier >= Tier::Pro` gates features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Elite,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Elite => "elite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Firebase uid (also used as document ID)
    pub user_id: String,
    /// Email address from the identity provider, if shared
    #[serde(default)]
    pub email: Option<String>,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub fitness_goals: Vec<String>,
    /// Home gym
    #[serde(default)]
    pub gym_id: Option<String>,
    #[serde(default)]
    pub tier: Tier,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    /// Active Stripe subscription, cleared on cancellation
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Expo push token
    #[serde(default)]
    pub push_token: Option<String>,
    #[serde(default)]
    pub banned: bool,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    pub last_active: DateTime<Utc>,
}

impl User {
    /// A fresh free-tier profile for a first login.
    pub fn new(user_id: &str, email: Option<String>, display_name: Option<String>, now: DateTime<Utc>) -> Self {
        let display_name = display_name
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(String::from)
            })
            .unwrap_or_else(|| "Athlete".to_string());

        Self {
            user_id: user_id.to_string(),
            email,
            display_name,
            bio: None,
            avatar_url: None,
            fitness_goals: Vec::new(),
            gym_id: None,
            tier: Tier::Free,
            role: Role::User,
            stripe_customer_id: None,
            subscription_id: None,
            push_token: None,
            banned: false,
            created_at: now,
            last_active: now,
        }
    }

    /// Drop to the free tier when an app-store subscription expires.
    ///
    /// An active Stripe subscription keeps the tier it paid for. Returns
    /// whether the tier changed.
    pub fn expire_store_subscription(&mut self) -> bool {
        if self.subscription_id.is_some() || self.tier == Tier::Free {
            return false;
        }
        self.tier = Tier::Free;
        true
    }
}

/// Check the Expo push token format (`ExponentPushToken[...]` or `ExpoPushToken[...]`).
pub fn is_expo_push_token(token: &str) -> bool {
    ["ExponentPushToken[", "ExpoPushToken["]
        .iter()
        .any(|prefix| token.starts_with(prefix))
        && token.ends_with(']')
        && token.len() > "ExpoPushToken[]".len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Elite > Tier::Pro);
        assert!(Tier::Pro > Tier::Free);
        assert_eq!(serde_json::to_string(&Tier::Elite).unwrap(), "\"elite\"");
    }

    #[test]
    fn test_store_expiry_keeps_stripe_tier() {
        let now = Utc::now();
        let mut user = User::new("u1", None, None, now);
        user.tier = Tier::Pro;
        user.subscription_id = Some("sub_123".into());
        assert!(!user.expire_store_subscription());
        assert_eq!(user.tier, Tier::Pro);

        user.subscription_id = None;
        assert!(user.expire_store_subscription());
        assert_eq!(user.tier, Tier::Free);
        assert!(!user.expire_store_subscription());
    }

    #[test]
    fn test_new_user_display_name_fallbacks() {
        let now = Utc::now();
        let user = User::new("u1", Some("sam@example.com".into()), None, now);
        assert_eq!(user.display_name, "sam");
        assert_eq!(user.tier, Tier::Free);

        let user = User::new("u2", None, Some("  ".into()), now);
        assert_eq!(user.display_name, "Athlete");

        let user = User::new("u3", None, Some("Lifter".into()), now);
        assert_eq!(user.display_name, "Lifter");
    }

    #[test]
    fn test_expo_push_token_format() {
        assert!(is_expo_push_token("ExponentPushToken[xxxxxxxxxxxxxxxxxxxxxx]"));
        assert!(is_expo_push_token("ExpoPushToken[abc]"));
        assert!(!is_expo_push_token("ExpoPushToken[]"));
        assert!(!is_expo_push_token("fcm:abcdef"));
        assert!(!is_expo_push_token("ExponentPushToken[abc"));
    }
}
