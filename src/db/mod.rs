// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (Firestore).

pub mod challenges;
pub mod firestore;
pub mod ledger;
pub mod notifications;
pub mod payments;
pub mod plans;
pub mod social;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const PLANS: &str = "plans";
    /// Plan ownership (keyed by `{user_id}_{plan_id}`)
    pub const USER_PLANS: &str = "user_plans";
    pub const CHALLENGES: &str = "challenges";
    /// XP ledger (keyed by user id)
    pub const XP: &str = "xp";
    pub const BATTLE_STATS: &str = "battle_stats";
    pub const LEADERBOARD: &str = "leaderboard";
    pub const GYMS: &str = "gyms";
    pub const GYM_POSTS: &str = "gym_posts";
    pub const POST_REPORTS: &str = "post_reports";
    pub const PARTNER_SLOTS: &str = "partner_slots";
    /// One document per user pointing at their slot
    pub const SLOT_MEMBERSHIPS: &str = "slot_memberships";
    /// Processed payment events (keyed by provider id)
    pub const PURCHASES: &str = "purchases";
    pub const NOTIFICATIONS: &str = "notifications";
}
