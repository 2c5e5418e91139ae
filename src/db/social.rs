// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gyms, feed posts, moderation reports and partner slots.

use crate::db::collections;
use crate::db::firestore::{fetch_doc, FirestoreDb, TxWrite};
use crate::error::AppError;
use crate::models::{
    FeedCursor, Gym, GymFeedPost, PartnerSlot, PostReport, ReportStatus, SlotError,
    SlotMembership, User,
};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};
use firestore::{FirestoreQueryCursor, FirestoreQueryDirection};

async fn load_slot(client: &firestore::FirestoreDb, slot_id: &str) -> Result<PartnerSlot, AppError> {
    fetch_doc(client, collections::PARTNER_SLOTS, slot_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Slot {} not found", slot_id)))
}

/// Open reports against a post.
async fn open_reports_for(
    client: &firestore::FirestoreDb,
    post_id: &str,
) -> Result<Vec<PostReport>, AppError> {
    let post_id = post_id.to_string();

    client
        .fluent()
        .select()
        .from(collections::POST_REPORTS)
        .filter(move |q| {
            q.for_all([
                q.field("post_id").eq(post_id.clone()),
                q.field("status").eq(ReportStatus::Open.as_str()),
            ])
        })
        .obj()
        .query()
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

impl FirestoreDb {
    // ─── Gyms ───────────────────────────────────────────────────

    pub async fn get_gym(&self, gym_id: &str) -> Result<Option<Gym>, AppError> {
        self.get_doc(collections::GYMS, gym_id).await
    }

    pub async fn upsert_gym(&self, gym: &Gym) -> Result<(), AppError> {
        self.set_doc(collections::GYMS, &gym.gym_id, gym).await
    }

    pub async fn list_gyms(&self) -> Result<Vec<Gym>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::GYMS)
            .order_by([("name", FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Make `gym_id` the user's home gym, moving them out of any previous one.
    pub async fn join_gym(&self, user_id: &str, gym_id: &str) -> Result<User, AppError> {
        self.transact("join_gym", |client| async move {
            let mut user: User = fetch_doc(&client, collections::USERS, user_id)
                .await?
                .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
            if user.gym_id.as_deref() == Some(gym_id) {
                return Ok((user, Vec::new()));
            }

            let mut gym: Gym = fetch_doc(&client, collections::GYMS, gym_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Gym {} not found", gym_id)))?;

            let mut writes = Vec::with_capacity(3);
            if let Some(old_id) = user.gym_id.as_deref() {
                let old: Option<Gym> = fetch_doc(&client, collections::GYMS, old_id).await?;
                if let Some(mut old) = old {
                    old.member_count = old.member_count.saturating_sub(1);
                    writes.push(TxWrite::Gym(old));
                }
            }

            gym.member_count = gym.member_count.saturating_add(1);
            user.gym_id = Some(gym_id.to_string());
            writes.push(TxWrite::Gym(gym));
            writes.push(TxWrite::User(user.clone()));
            Ok((user, writes))
        })
        .await
    }

    // ─── Feed ───────────────────────────────────────────────────

    pub async fn get_post(&self, post_id: &str) -> Result<Option<GymFeedPost>, AppError> {
        self.get_doc(collections::GYM_POSTS, post_id).await
    }

    pub async fn create_post(&self, post: &GymFeedPost) -> Result<(), AppError> {
        self.set_doc(collections::GYM_POSTS, &post.post_id, post).await
    }

    /// Visible posts in a gym, newest first, starting after `after`.
    pub async fn list_feed(
        &self,
        gym_id: &str,
        after: Option<&FeedCursor>,
        limit: u32,
    ) -> Result<Vec<GymFeedPost>, AppError> {
        let gym_id = gym_id.to_string();

        let mut query = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::GYM_POSTS)
            .filter(move |q| {
                q.for_all([
                    q.field("gym_id").eq(gym_id.clone()),
                    q.field("hidden").eq(false),
                ])
            })
            .order_by([
                ("created_at", FirestoreQueryDirection::Descending),
                ("post_id", FirestoreQueryDirection::Descending),
            ]);

        if let Some(cursor) = after {
            query = query.start_at(FirestoreQueryCursor::AfterValue(vec![
                format_utc_rfc3339(cursor.created_at).into(),
                cursor.post_id.clone().into(),
            ]));
        }

        query
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Toggle a like. Returns `(liked, like_count)`.
    pub async fn toggle_post_like(&self, post_id: &str, user_id: &str) -> Result<(bool, u32), AppError> {
        self.transact("toggle_post_like", |client| async move {
            let mut post: GymFeedPost = fetch_doc(&client, collections::GYM_POSTS, post_id)
                .await?
                .filter(|p: &GymFeedPost| !p.hidden)
                .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

            let liked = post.toggle_like(user_id);
            let count = post.like_count;
            Ok(((liked, count), vec![TxWrite::Post(post)]))
        })
        .await
    }

    // ─── Moderation ─────────────────────────────────────────────

    pub async fn create_report(&self, report: &PostReport) -> Result<(), AppError> {
        self.set_doc(collections::POST_REPORTS, &report.report_id, report)
            .await
    }

    pub async fn get_report(&self, report_id: &str) -> Result<Option<PostReport>, AppError> {
        self.get_doc(collections::POST_REPORTS, report_id).await
    }

    /// Reports with the given status, oldest first.
    pub async fn list_reports(
        &self,
        status: ReportStatus,
        post_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<PostReport>, AppError> {
        let post_id = post_id.map(String::from);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::POST_REPORTS)
            .filter(move |q| {
                q.for_all([
                    q.field("status").eq(status.as_str()),
                    post_id.clone().and_then(|id| q.field("post_id").eq(id)),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Ascending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn set_report_status(
        &self,
        report_id: &str,
        status: ReportStatus,
    ) -> Result<PostReport, AppError> {
        let mut report = self
            .get_report(report_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", report_id)))?;
        report.status = status;
        self.create_report(&report).await?;
        Ok(report)
    }

    /// Hide a post and mark its open reports as actioned, in one commit.
    ///
    /// Returns the number of reports closed.
    pub async fn hide_post(&self, post_id: &str) -> Result<usize, AppError> {
        let closed = self
            .transact("hide_post", |client| async move {
                let mut post: GymFeedPost = fetch_doc(&client, collections::GYM_POSTS, post_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
                post.hidden = true;

                let open = open_reports_for(&client, post_id).await?;
                let closed = open.len();

                let mut writes = Vec::with_capacity(closed + 1);
                writes.push(TxWrite::Post(post));
                writes.extend(open.into_iter().map(|mut report| {
                    report.status = ReportStatus::Actioned;
                    TxWrite::Report(report)
                }));
                Ok((closed, writes))
            })
            .await?;

        tracing::info!(post_id, reports = closed, "Post hidden by moderation");
        Ok(closed)
    }

    // ─── Partner Slots ──────────────────────────────────────────

    pub async fn get_slot(&self, slot_id: &str) -> Result<Option<PartnerSlot>, AppError> {
        self.get_doc(collections::PARTNER_SLOTS, slot_id).await
    }

    /// Slots in a gym that have not started yet, soonest first.
    pub async fn list_upcoming_slots(
        &self,
        gym_id: &str,
        now: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<PartnerSlot>, AppError> {
        let gym_id = gym_id.to_string();
        let now = format_utc_rfc3339(now);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::PARTNER_SLOTS)
            .filter(move |q| {
                q.for_all([
                    q.field("gym_id").eq(gym_id.clone()),
                    q.field("starts_at").greater_than(now.clone()),
                ])
            })
            .order_by([("starts_at", FirestoreQueryDirection::Ascending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a new slot with its host as first member.
    pub async fn create_slot(&self, slot: PartnerSlot, now: DateTime<Utc>) -> Result<PartnerSlot, AppError> {
        self.transact("create_slot", |client| {
            let mut slot = slot.clone();
            async move {
                let current: Option<SlotMembership> =
                    fetch_doc(&client, collections::SLOT_MEMBERSHIPS, &slot.host_id).await?;
                let host_id = slot.host_id.clone();
                let membership = slot.join(&host_id, current.as_ref(), now)?;

                let writes = vec![
                    TxWrite::Slot(slot.clone()),
                    TxWrite::Membership(membership),
                ];
                Ok((slot, writes))
            }
        })
        .await
    }

    /// Join a slot. The per-user membership document is read and written in
    /// the same transaction, so a user can never hold two upcoming slots.
    pub async fn join_slot(
        &self,
        slot_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PartnerSlot, AppError> {
        self.transact("join_slot", |client| async move {
            let mut slot = load_slot(&client, slot_id).await?;
            let current: Option<SlotMembership> =
                fetch_doc(&client, collections::SLOT_MEMBERSHIPS, user_id).await?;

            let membership = slot.join(user_id, current.as_ref(), now)?;
            let writes = vec![
                TxWrite::Slot(slot.clone()),
                TxWrite::Membership(membership),
            ];
            Ok((slot, writes))
        })
        .await
    }

    pub async fn leave_slot(
        &self,
        slot_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PartnerSlot, AppError> {
        self.transact("leave_slot", |client| async move {
            let mut slot = load_slot(&client, slot_id).await?;
            if slot.starts_at <= now {
                return Err(SlotError::Started.into());
            }
            slot.leave(user_id)?;

            let current: Option<SlotMembership> =
                fetch_doc(&client, collections::SLOT_MEMBERSHIPS, user_id).await?;

            let mut writes = vec![TxWrite::Slot(slot.clone())];
            if current.is_some_and(|m| m.slot_id == slot_id) {
                writes.push(TxWrite::DeleteMembership(user_id.to_string()));
            }
            Ok((slot, writes))
        })
        .await
    }
}
