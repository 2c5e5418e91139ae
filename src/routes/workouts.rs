// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Workout logging and the XP ledger.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::XpRecord;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/workouts/complete", post(complete_workout))
        .route("/api/me/xp", get(get_my_xp))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CompleteWorkoutRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(range(min = 1, max = 600))]
    pub duration_minutes: u32,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/generated/")
)]
pub struct WorkoutResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_awarded: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub xp_balance: u64,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub lifetime_xp: u64,
    pub level: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub streak_extended: bool,
}

async fn complete_workout(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CompleteWorkoutRequest>,
) -> Result<Json<WorkoutResponse>> {
    body.validate()?;

    let (award, xp) = state
        .db
        .record_workout(&auth.user_id, body.duration_minutes, Utc::now())
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        workout = %body.name,
        duration_minutes = body.duration_minutes,
        xp_awarded = award.xp_awarded,
        streak = award.current_streak,
        "Workout completed"
    );

    Ok(Json(WorkoutResponse {
        xp_awarded: award.xp_awarded,
        xp_balance: xp.xp_balance,
        lifetime_xp: xp.lifetime_xp,
        level: xp.level(),
        current_streak: xp.current_streak,
        longest_streak: xp.longest_streak,
        streak_extended: award.streak_extended,
    }))
}

#[derive(Serialize)]
pub struct XpResponse {
    #[serde(flatten)]
    pub record: XpRecord,
    pub level: u32,
}

async fn get_my_xp(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<XpResponse>> {
    let record = state
        .db
        .get_xp(&auth.user_id)
        .await?
        .unwrap_or_else(|| XpRecord::new(&auth.user_id, Utc::now()));

    Ok(Json(XpResponse {
        level: record.level(),
        record,
    }))
}
