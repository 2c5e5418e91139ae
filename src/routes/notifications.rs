// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::Notification;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
struct NotificationsQuery {
    #[serde(default)]
    unread_only: bool,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
    pub unread: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<NotificationsQuery>,
) -> Result<Json<NotificationsResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let notifications = state
        .db
        .list_notifications(&auth.user_id, params.unread_only, limit)
        .await?;
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(NotificationsResponse {
        notifications,
        unread,
    }))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(notification_id): Path<String>,
) -> Result<Json<Notification>> {
    let notification = state
        .db
        .mark_notification_read(&notification_id, &auth.user_id)
        .await?;
    Ok(Json(notification))
}
