// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gyms, their social feed, moderation reports and partner slots.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::time_utils::rfc3339_millis;

pub const MIN_SLOT_CAPACITY: u32 = 2;
pub const MAX_SLOT_CAPACITY: u32 = 10;
/// How far ahead a partner slot may be scheduled.
pub const MAX_SLOT_LEAD_DAYS: i64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gym {
    pub gym_id: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub member_count: u32,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

/// Post in a gym's feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GymFeedPost {
    pub post_id: String,
    pub gym_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub liked_by: Vec<String>,
    #[serde(default)]
    pub like_count: u32,
    /// Hidden by moderation
    #[serde(default)]
    pub hidden: bool,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

impl GymFeedPost {
    /// Toggle a user's like. Returns whether the post is now liked by them.
    pub fn toggle_like(&mut self, user_id: &str) -> bool {
        let liked = if let Some(pos) = self.liked_by.iter().position(|u| u == user_id) {
            self.liked_by.remove(pos);
            false
        } else {
            self.liked_by.push(user_id.to_string());
            true
        };
        self.like_count = self.liked_by.len() as u32;
        liked
    }
}

/// Feed position: the last post of a page.
///
/// Posts are ordered by `(created_at, post_id)` descending, so the pair is
/// unique even when several posts share a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    pub created_at: DateTime<Utc>,
    pub post_id: String,
}

impl FeedCursor {
    pub fn after(post: &GymFeedPost) -> Self {
        Self {
            created_at: post.created_at,
            post_id: post.post_id.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Open,
    Dismissed,
    Actioned,
}

impl ReportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Open => "open",
            ReportStatus::Dismissed => "dismissed",
            ReportStatus::Actioned => "actioned",
        }
    }
}

/// User report against a feed post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostReport {
    pub report_id: String,
    pub post_id: String,
    pub gym_id: String,
    pub reporter_id: String,
    pub reason: String,
    pub status: ReportStatus,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("capacity must be between 2 and 10")]
    InvalidCapacity,
    #[error("slot must start in the future and within 30 days")]
    InvalidStart,
    #[error("slot has already started")]
    Started,
    #[error("slot is full")]
    Full,
    #[error("user is already in this slot")]
    AlreadyMember,
    #[error("user already belongs to another upcoming slot")]
    InOtherSlot,
    #[error("user is not in this slot")]
    NotMember,
}

impl From<SlotError> for AppError {
    fn from(err: SlotError) -> Self {
        let msg = err.to_string();
        match err {
            SlotError::Full | SlotError::AlreadyMember | SlotError::InOtherSlot => {
                AppError::Conflict(msg)
            }
            _ => AppError::BadRequest(msg),
        }
    }
}

/// Partner-matching slot: a scheduled session other gym members can join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerSlot {
    pub slot_id: String,
    pub gym_id: String,
    pub host_id: String,
    pub workout_type: String,
    #[serde(with = "rfc3339_millis")]
    pub starts_at: DateTime<Utc>,
    pub capacity: u32,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
}

/// Per-user pointer to the slot they belong to (document id = user id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotMembership {
    pub user_id: String,
    pub slot_id: String,
    pub gym_id: String,
    #[serde(with = "rfc3339_millis")]
    pub starts_at: DateTime<Utc>,
}

impl SlotMembership {
    /// Memberships of sessions that already started no longer count.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.starts_at > now
    }
}

impl PartnerSlot {
    pub fn new(
        slot_id: String,
        gym_id: &str,
        host_id: &str,
        workout_type: String,
        starts_at: DateTime<Utc>,
        capacity: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, SlotError> {
        if !(MIN_SLOT_CAPACITY..=MAX_SLOT_CAPACITY).contains(&capacity) {
            return Err(SlotError::InvalidCapacity);
        }
        if starts_at <= now || starts_at > now + Duration::days(MAX_SLOT_LEAD_DAYS) {
            return Err(SlotError::InvalidStart);
        }

        Ok(Self {
            slot_id,
            gym_id: gym_id.to_string(),
            host_id: host_id.to_string(),
            workout_type,
            starts_at,
            capacity,
            members: Vec::new(),
            created_at: now,
        })
    }

    /// Add a member. `current` is the user's existing membership, if any.
    pub fn join(
        &mut self,
        user_id: &str,
        current: Option<&SlotMembership>,
        now: DateTime<Utc>,
    ) -> Result<SlotMembership, SlotError> {
        if self.starts_at <= now {
            return Err(SlotError::Started);
        }
        if self.members.iter().any(|m| m == user_id) {
            return Err(SlotError::AlreadyMember);
        }
        if current.is_some_and(|m| m.slot_id != self.slot_id && m.is_upcoming(now)) {
            return Err(SlotError::InOtherSlot);
        }
        if self.members.len() as u32 >= self.capacity {
            return Err(SlotError::Full);
        }

        self.members.push(user_id.to_string());
        Ok(SlotMembership {
            user_id: user_id.to_string(),
            slot_id: self.slot_id.clone(),
            gym_id: self.gym_id.clone(),
            starts_at: self.starts_at,
        })
    }

    pub fn leave(&mut self, user_id: &str) -> Result<(), SlotError> {
        let pos = self
            .members
            .iter()
            .position(|m| m == user_id)
            .ok_or(SlotError::NotMember)?;
        self.members.remove(pos);
        Ok(())
    }
}
