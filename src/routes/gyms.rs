// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gym membership, the gym feed, post reports and partner slots.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    FeedCursor, Gym, GymFeedPost, PartnerSlot, PostReport, ReportStatus, User,
};
use crate::routes::users::load_user;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

const DEFAULT_FEED_LIMIT: u32 = 20;
const MAX_FEED_LIMIT: u32 = 50;
const SLOT_LIST_LIMIT: u32 = 50;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/gyms", get(list_gyms))
        .route("/api/gyms/{id}", get(get_gym))
        .route("/api/gyms/{id}/join", post(join_gym))
        .route("/api/gyms/{id}/feed", get(get_feed).post(create_post))
        .route("/api/posts/{id}/like", post(toggle_like))
        .route("/api/posts/{id}/report", post(report_post))
        .route("/api/gyms/{id}/slots", get(list_slots).post(create_slot))
        .route("/api/slots/{id}/join", post(join_slot))
        .route("/api/slots/{id}/leave", post(leave_slot))
}

// ─── Gyms ───────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct GymsResponse {
    pub gyms: Vec<Gym>,
}

async fn list_gyms(State(state): State<Arc<AppState>>) -> Result<Json<GymsResponse>> {
    let gyms = state.db.list_gyms().await?;
    Ok(Json(GymsResponse { gyms }))
}

async fn load_gym(state: &AppState, gym_id: &str) -> Result<Gym> {
    state
        .db
        .get_gym(gym_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Gym {} not found", gym_id)))
}

async fn get_gym(
    State(state): State<Arc<AppState>>,
    Path(gym_id): Path<String>,
) -> Result<Json<Gym>> {
    Ok(Json(load_gym(&state, &gym_id).await?))
}

async fn join_gym(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(gym_id): Path<String>,
) -> Result<Json<User>> {
    let user = state.db.join_gym(&auth.user_id, &gym_id).await?;

    if let Err(e) = state.db.refresh_leaderboard_profile(&user).await {
        tracing::warn!(user_id = %auth.user_id, error = %e, "Failed to refresh leaderboard entry");
    }

    tracing::info!(user_id = %auth.user_id, gym_id = %gym_id, "Joined gym");
    Ok(Json(user))
}

/// Members may post to their gym; admins may post anywhere.
async fn require_member(state: &AppState, auth: &AuthUser, gym_id: &str) -> Result<User> {
    let user = load_user(state, &auth.user_id).await?;
    if user.gym_id.as_deref() != Some(gym_id) && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "Only gym members can do that".to_string(),
        ));
    }
    Ok(user)
}

// ─── Feed ───────────────────────────────────────────────────────

/// Opaque feed cursor: `{created_at millis}:{post_id}` of the last post
/// seen, base64url encoded.
pub fn encode_cursor(cursor: &FeedCursor) -> String {
    URL_SAFE_NO_PAD.encode(format!(
        "{}:{}",
        cursor.created_at.timestamp_millis(),
        cursor.post_id
    ))
}

pub fn decode_cursor(cursor: &str) -> Option<FeedCursor> {
    let bytes = URL_SAFE_NO_PAD.decode(cursor).ok()?;
    let raw = std::str::from_utf8(&bytes).ok()?;
    let (millis, post_id) = raw.split_once(':')?;
    if post_id.is_empty() {
        return None;
    }
    let created_at = Utc.timestamp_millis_opt(millis.parse().ok()?).single()?;
    Some(FeedCursor {
        created_at,
        post_id: post_id.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct FeedQuery {
    cursor: Option<String>,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct FeedResponse {
    pub posts: Vec<GymFeedPost>,
    pub next_cursor: Option<String>,
}

async fn get_feed(
    State(state): State<Arc<AppState>>,
    Path(gym_id): Path<String>,
    Query(params): Query<FeedQuery>,
) -> Result<Json<FeedResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT);
    let after = match params.cursor.as_deref() {
        Some(c) => Some(
            decode_cursor(c).ok_or_else(|| AppError::BadRequest("Invalid cursor".to_string()))?,
        ),
        None => None,
    };

    load_gym(&state, &gym_id).await?;
    let posts = state.db.list_feed(&gym_id, after.as_ref(), limit).await?;

    let next_cursor = if posts.len() as u32 == limit {
        posts.last().map(|p| encode_cursor(&FeedCursor::after(p)))
    } else {
        None
    };

    Ok(Json(FeedResponse { posts, next_cursor }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(url)]
    pub media_url: Option<String>,
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(gym_id): Path<String>,
    Json(body): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<GymFeedPost>)> {
    body.validate()?;
    let content = body.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::BadRequest("content cannot be blank".to_string()));
    }

    load_gym(&state, &gym_id).await?;
    let author = require_member(&state, &auth, &gym_id).await?;

    let post = GymFeedPost {
        post_id: uuid::Uuid::new_v4().to_string(),
        gym_id,
        author_id: author.user_id,
        author_name: author.display_name,
        content,
        media_url: body.media_url,
        liked_by: Vec::new(),
        like_count: 0,
        hidden: false,
        created_at: Utc::now(),
    };
    state.db.create_post(&post).await?;

    tracing::debug!(post_id = %post.post_id, gym_id = %post.gym_id, "Feed post created");
    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub like_count: u32,
}

async fn toggle_like(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<String>,
) -> Result<Json<LikeResponse>> {
    let (liked, like_count) = state.db.toggle_post_like(&post_id, &auth.user_id).await?;
    Ok(Json(LikeResponse { liked, like_count }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReportRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

async fn report_post(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(post_id): Path<String>,
    Json(body): Json<ReportRequest>,
) -> Result<(StatusCode, Json<PostReport>)> {
    body.validate()?;

    let post = state
        .db
        .get_post(&post_id)
        .await?
        .filter(|p| !p.hidden)
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

    let report = PostReport {
        report_id: uuid::Uuid::new_v4().to_string(),
        post_id: post.post_id,
        gym_id: post.gym_id,
        reporter_id: auth.user_id.clone(),
        reason: body.reason.trim().to_string(),
        status: ReportStatus::Open,
        created_at: Utc::now(),
    };
    state.db.create_report(&report).await?;

    tracing::info!(
        report_id = %report.report_id,
        post_id = %report.post_id,
        reporter = %auth.user_id,
        "Post reported"
    );
    Ok((StatusCode::CREATED, Json(report)))
}

// ─── Partner Slots ──────────────────────────────────────────────

#[derive(Serialize)]
pub struct SlotsResponse {
    pub slots: Vec<PartnerSlot>,
}

async fn list_slots(
    State(state): State<Arc<AppState>>,
    Path(gym_id): Path<String>,
) -> Result<Json<SlotsResponse>> {
    let slots = state
        .db
        .list_upcoming_slots(&gym_id, Utc::now(), SLOT_LIST_LIMIT)
        .await?;
    Ok(Json(SlotsResponse { slots }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSlotRequest {
    #[validate(length(min = 1, max = 50))]
    pub workout_type: String,
    pub starts_at: DateTime<Utc>,
    pub capacity: u32,
}

async fn create_slot(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(gym_id): Path<String>,
    Json(body): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<PartnerSlot>)> {
    body.validate()?;

    load_gym(&state, &gym_id).await?;
    require_member(&state, &auth, &gym_id).await?;

    let now = Utc::now();
    let slot = PartnerSlot::new(
        uuid::Uuid::new_v4().to_string(),
        &gym_id,
        &auth.user_id,
        body.workout_type.trim().to_string(),
        body.starts_at,
        body.capacity,
        now,
    )?;
    let slot = state.db.create_slot(slot, now).await?;

    tracing::info!(
        slot_id = %slot.slot_id,
        gym_id = %gym_id,
        host = %auth.user_id,
        starts_at = %slot.starts_at,
        "Partner slot created"
    );
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn join_slot(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(slot_id): Path<String>,
) -> Result<Json<PartnerSlot>> {
    let slot = state
        .db
        .join_slot(&slot_id, &auth.user_id, Utc::now())
        .await?;

    tracing::info!(slot_id = %slot_id, user_id = %auth.user_id, members = slot.members.len(), "Joined partner slot");

    let member_name = state
        .db
        .get_user(&auth.user_id)
        .await
        .ok()
        .flatten()
        .map(|u| u.display_name)
        .unwrap_or_else(|| "Someone".to_string());
    state
        .notifications
        .slot_joined(&slot.host_id, &slot.slot_id, &member_name, &slot.workout_type);

    Ok(Json(slot))
}

async fn leave_slot(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(slot_id): Path<String>,
) -> Result<Json<PartnerSlot>> {
    let slot = state
        .db
        .leave_slot(&slot_id, &auth.user_id, Utc::now())
        .await?;

    tracing::info!(slot_id = %slot_id, user_id = %auth.user_id, "Left partner slot");
    Ok(Json(slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_keeps_millis_and_post_id() {
        let cursor = FeedCursor {
            created_at: Utc.timestamp_millis_opt(1_760_000_123_456).unwrap(),
            post_id: "post-7".to_string(),
        };
        assert_eq!(decode_cursor(&encode_cursor(&cursor)), Some(cursor));
    }

    #[test]
    fn test_garbage_cursor_rejected() {
        assert_eq!(decode_cursor("!!not-base64!!"), None);
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("abc")), None);
        // Timestamp without a post id
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("1760000123456")), None);
        assert_eq!(decode_cursor(&URL_SAFE_NO_PAD.encode("1760000123456:")), None);
    }
}
