// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Moderation and operator endpoints. Mounted behind `require_admin`.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Gym, Notification, Plan, PostReport, ReportStatus, Tier, User, WagerChallenge};
use crate::services::notifications::NotificationRequest;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

const REPORT_LIST_LIMIT: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/admin/reports", get(list_reports))
        .route("/api/admin/reports/{id}/dismiss", post(dismiss_report))
        .route("/api/admin/posts/{id}", delete(remove_post))
        .route("/api/admin/users/{id}/tier", put(set_tier))
        .route("/api/admin/users/{id}/ban", post(set_ban))
        .route("/api/admin/plans/{id}", delete(remove_plan))
        .route("/api/admin/challenges/{id}/resolve", post(settle_challenge))
        .route("/api/admin/gyms", post(create_gym))
        .route("/api/admin/notifications", post(send_notification))
}

// ─── Reports ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ReportsQuery {
    status: Option<ReportStatus>,
}

#[derive(Serialize)]
pub struct ReportsResponse {
    pub reports: Vec<PostReport>,
}

async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportsQuery>,
) -> Result<Json<ReportsResponse>> {
    let status = params.status.unwrap_or(ReportStatus::Open);
    let reports = state
        .db
        .list_reports(status, None, REPORT_LIST_LIMIT)
        .await?;
    Ok(Json(ReportsResponse { reports }))
}

async fn dismiss_report(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(report_id): Path<String>,
) -> Result<Json<PostReport>> {
    let report = state
        .db
        .set_report_status(&report_id, ReportStatus::Dismissed)
        .await?;
    tracing::info!(report_id = %report_id, admin = %admin.user_id, "Report dismissed");
    Ok(Json(report))
}

#[derive(Serialize)]
pub struct RemovePostResponse {
    pub post_id: String,
    pub reports_closed: usize,
}

async fn remove_post(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(post_id): Path<String>,
) -> Result<Json<RemovePostResponse>> {
    let reports_closed = state.db.hide_post(&post_id).await?;
    tracing::info!(post_id = %post_id, admin = %admin.user_id, "Post removed by admin");
    Ok(Json(RemovePostResponse {
        post_id,
        reports_closed,
    }))
}

// ─── Users ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SetTierRequest {
    pub tier: Tier,
}

async fn set_tier(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<SetTierRequest>,
) -> Result<Json<User>> {
    let user = state.db.set_user_tier(&user_id, body.tier).await?;
    tracing::info!(
        user_id = %user_id,
        tier = body.tier.as_str(),
        admin = %admin.user_id,
        "Tier overridden by admin"
    );
    Ok(Json(user))
}

fn default_banned() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct BanRequest {
    #[serde(default = "default_banned")]
    pub banned: bool,
}

async fn set_ban(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(user_id): Path<String>,
    Json(body): Json<BanRequest>,
) -> Result<Json<User>> {
    let user = state.db.set_user_banned(&user_id, body.banned).await?;
    tracing::warn!(
        user_id = %user_id,
        banned = body.banned,
        admin = %admin.user_id,
        "Ban status changed"
    );
    Ok(Json(user))
}

// ─── Content ────────────────────────────────────────────────────

async fn remove_plan(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>> {
    let plan = state.db.unpublish_plan(&plan_id).await?;
    tracing::info!(plan_id = %plan_id, admin = %admin.user_id, "Plan unpublished by admin");
    Ok(Json(plan))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SettleRequest {
    #[validate(length(min = 1))]
    pub winner_id: String,
}

/// Manual settlement of a challenge the AI could not decide.
async fn settle_challenge(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
    Json(body): Json<SettleRequest>,
) -> Result<Json<WagerChallenge>> {
    body.validate()?;

    let (challenge, resolution) = state
        .db
        .settle_challenge(&challenge_id, &body.winner_id, Utc::now())
        .await?;

    tracing::info!(
        challenge_id = %challenge_id,
        winner = %body.winner_id,
        admin = %admin.user_id,
        pot = challenge.pot,
        "Challenge settled by admin"
    );

    state
        .notifications
        .challenge_resolved(&challenge, &resolution);

    Ok(Json(challenge))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGymRequest {
    #[validate(length(min = 2, max = 100))]
    pub name: String,
    #[validate(length(min = 2, max = 100))]
    pub city: String,
}

async fn create_gym(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateGymRequest>,
) -> Result<(StatusCode, Json<Gym>)> {
    body.validate()?;

    let gym = Gym {
        gym_id: uuid::Uuid::new_v4().to_string(),
        name: body.name.trim().to_string(),
        city: body.city.trim().to_string(),
        member_count: 0,
        created_at: Utc::now(),
    };
    state.db.upsert_gym(&gym).await?;

    tracing::info!(gym_id = %gym.gym_id, name = %gym.name, "Gym created");
    Ok((StatusCode::CREATED, Json(gym)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminNotificationRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub body: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

async fn send_notification(
    State(state): State<Arc<AppState>>,
    Json(body): Json<AdminNotificationRequest>,
) -> Result<Json<Notification>> {
    body.validate()?;

    let notification = state
        .notifications
        .send(
            &body.user_id,
            NotificationRequest {
                kind: "admin",
                title: body.title,
                body: body.body,
                data: body.data,
            },
        )
        .await?;
    Ok(Json(notification))
}
