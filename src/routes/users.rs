// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::user::is_expo_push_token;
use crate::models::{BattleStats, Tier, User};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me).delete(delete_me))
        .route("/api/me/push-token", put(set_push_token))
        .route("/api/users/{id}", get(get_public_profile))
}

pub(crate) async fn load_user(state: &AppState, user_id: &str) -> Result<User> {
    state
        .db
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<User>> {
    Ok(Json(load_user(&state, &user.user_id).await?))
}

fn validate_goals(goals: &Vec<String>) -> std::result::Result<(), ValidationError> {
    if goals.iter().any(|g| g.trim().is_empty() || g.chars().count() > 50) {
        return Err(ValidationError::new("goal_length")
            .with_message("each goal must be 1-50 characters".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub display_name: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(url)]
    pub avatar_url: Option<String>,
    #[validate(length(max = 10), custom(function = "validate_goals"))]
    pub fitness_goals: Option<Vec<String>>,
}

async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<UpdateProfileRequest>,
) -> Result<Json<User>> {
    body.validate()?;

    let mut user = load_user(&state, &auth.user_id).await?;
    let profile_changed = body.display_name.is_some() || body.avatar_url.is_some();

    if let Some(name) = body.display_name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("display_name cannot be blank".to_string()));
        }
        user.display_name = name;
    }
    if let Some(bio) = body.bio {
        user.bio = Some(bio).filter(|b| !b.trim().is_empty());
    }
    if let Some(avatar) = body.avatar_url {
        user.avatar_url = Some(avatar);
    }
    if let Some(goals) = body.fitness_goals {
        user.fitness_goals = goals.into_iter().map(|g| g.trim().to_string()).collect();
    }

    state.db.upsert_user(&user).await?;

    if profile_changed {
        if let Err(e) = state.db.refresh_leaderboard_profile(&user).await {
            tracing::warn!(user_id = %user.user_id, error = %e, "Failed to refresh leaderboard entry");
        }
    }

    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct PushTokenRequest {
    pub token: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

async fn set_push_token(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<PushTokenRequest>,
) -> Result<Json<SuccessResponse>> {
    let token = body.token.trim();
    if !is_expo_push_token(token) {
        return Err(AppError::BadRequest(
            "token must be an Expo push token".to_string(),
        ));
    }

    let mut user = load_user(&state, &auth.user_id).await?;
    user.push_token = Some(token.to_string());
    state.db.upsert_user(&user).await?;

    Ok(Json(SuccessResponse { success: true }))
}

#[derive(Serialize)]
pub struct DeleteAccountResponse {
    pub success: bool,
    pub documents_deleted: usize,
}

/// Delete the caller's account and personal data.
async fn delete_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<DeleteAccountResponse>> {
    tracing::info!(user_id = %auth.user_id, "User-initiated account deletion");

    let documents_deleted = state.db.delete_user_data(&auth.user_id).await?;

    Ok(Json(DeleteAccountResponse {
        success: true,
        documents_deleted,
    }))
}

#[derive(Serialize)]
pub struct XpSummary {
    pub level: u32,
    pub lifetime_xp: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub workouts_completed: u32,
}

#[derive(Serialize)]
pub struct PublicProfile {
    pub user_id: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub gym_id: Option<String>,
    pub tier: Tier,
    pub xp: XpSummary,
    pub battle_stats: Option<BattleStats>,
}

async fn get_public_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<PublicProfile>> {
    let user = load_user(&state, &user_id).await?;
    if user.banned {
        return Err(AppError::NotFound(format!("User {} not found", user_id)));
    }

    let xp = state.db.get_xp(&user_id).await?;
    let battle_stats = state.db.get_battle_stats(&user_id).await?;

    let xp = match xp {
        Some(xp) => XpSummary {
            level: xp.level(),
            lifetime_xp: xp.lifetime_xp,
            current_streak: xp.current_streak,
            longest_streak: xp.longest_streak,
            workouts_completed: xp.workouts_completed,
        },
        None => XpSummary {
            level: 1,
            lifetime_xp: 0,
            current_streak: 0,
            longest_streak: 0,
            workouts_completed: 0,
        },
    };

    Ok(Json(PublicProfile {
        user_id: user.user_id,
        display_name: user.display_name,
        avatar_url: user.avatar_url,
        bio: user.bio,
        gym_id: user.gym_id,
        tier: user.tier,
        xp,
        battle_stats,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_validation() {
        let ok = UpdateProfileRequest {
            display_name: Some("Sam".into()),
            bio: None,
            avatar_url: Some("https://cdn.example.com/a.png".into()),
            fitness_goals: Some(vec!["Run a 5k".into()]),
        };
        assert!(ok.validate().is_ok());

        let long_name = UpdateProfileRequest {
            display_name: Some("x".repeat(51)),
            bio: None,
            avatar_url: None,
            fitness_goals: None,
        };
        assert!(long_name.validate().is_err());

        let bad_url = UpdateProfileRequest {
            display_name: None,
            bio: None,
            avatar_url: Some("not a url".into()),
            fitness_goals: None,
        };
        assert!(bad_url.validate().is_err());

        let too_many_goals = UpdateProfileRequest {
            display_name: None,
            bio: None,
            avatar_url: None,
            fitness_goals: Some(vec!["g".into(); 11]),
        };
        assert!(too_many_goals.validate().is_err());

        let long_goal = UpdateProfileRequest {
            display_name: None,
            bio: None,
            avatar_url: None,
            fitness_goals: Some(vec!["g".repeat(51)]),
        };
        assert!(long_goal.validate().is_err());
    }
}
