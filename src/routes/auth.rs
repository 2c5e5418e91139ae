// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session routes.
//!
//! The mobile app signs in with Firebase Authentication and exchanges the
//! resulting ID token for a REPZ session JWT here.

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::models::{Role, Tier, User};
use crate::AppState;
use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Auth routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/session", post(create_session))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SessionRequest {
    #[validate(length(min = 1, max = 4096, message = "id_token is required"))]
    pub id_token: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "mobile/src/generated/")
)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: String,
    pub display_name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "\"free\" | \"pro\" | \"elite\""))]
    pub tier: Tier,
    pub is_admin: bool,
    pub new_user: bool,
}

fn session_cookie(value: String, secure: bool, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_secs))
        .build()
}

/// Exchange a Firebase ID token for a session.
async fn create_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<SessionRequest>,
) -> Result<(CookieJar, Json<SessionResponse>)> {
    body.validate()?;

    let identity = state.firebase_verifier.verify(&body.id_token).await?;
    let now = Utc::now();

    let existing = state.db.get_user(&identity.uid).await?;
    let new_user = existing.is_none();
    let mut user = existing.unwrap_or_else(|| {
        let mut user = User::new(&identity.uid, identity.email.clone(), identity.name.clone(), now);
        user.avatar_url = identity.picture.clone();
        user
    });

    if user.banned {
        tracing::warn!(user_id = %user.user_id, "Banned user attempted to sign in");
        return Err(AppError::Forbidden("Account suspended".to_string()));
    }

    if state.config.is_admin_uid(&user.user_id) {
        user.role = Role::Admin;
    }
    user.last_active = now;
    state.db.upsert_user(&user).await?;

    let token = create_jwt(&user.user_id, user.role, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    tracing::info!(user_id = %user.user_id, new_user, role = ?user.role, "Session created");

    let cookie = session_cookie(
        token.clone(),
        state.config.environment.is_production(),
        SESSION_TTL_SECS as i64,
    );

    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            token,
            user_id: user.user_id,
            display_name: user.display_name,
            tier: user.tier,
            is_admin: user.role == Role::Admin,
            new_user,
        }),
    ))
}

#[derive(Serialize)]
struct LogoutResponse {
    success: bool,
}

/// Clear the session cookie. Bearer tokens simply expire.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (CookieJar, Json<LogoutResponse>) {
    let expired = session_cookie(String::new(), state.config.environment.is_production(), 0);
    (jar.add(expired), Json(LogoutResponse { success: true }))
}
