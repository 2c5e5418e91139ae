// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod challenge;
pub mod form;
pub mod gym;
pub mod ledger;
pub mod notification;
pub mod payment;
pub mod plan;
pub mod user;

pub use challenge::{ChallengeError, ChallengeStatus, Resolution, Submission, WagerChallenge};
pub use form::{Exercise, FormReport, Keypoint, PoseFrame, Verdict};
pub use gym::{
    FeedCursor, Gym, GymFeedPost, PartnerSlot, PostReport, ReportStatus, SlotError,
    SlotMembership,
};
pub use ledger::{BattleStats, LeaderboardEntry, XpRecord};
pub use notification::Notification;
pub use payment::{PaymentProvider, PurchaseKind, PurchaseRecord};
pub use plan::{Plan, PlanKind, UserPlan};
pub use user::{Role, Tier, User};
