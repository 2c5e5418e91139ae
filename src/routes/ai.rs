// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! AI coach chat proxy (Pro and Elite only).

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::Tier;
use crate::routes::users::load_user;
use crate::services::openai::ChatMessage;
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

pub const MAX_HISTORY: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/ai/chat", post(chat))
}

fn validate_messages(messages: &Vec<ChatMessage>) -> std::result::Result<(), ValidationError> {
    for m in messages {
        if m.role != "user" && m.role != "assistant" {
            return Err(ValidationError::new("role")
                .with_message("role must be user or assistant".into()));
        }
        if m.content.trim().is_empty() || m.content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(ValidationError::new("content_length")
                .with_message("each message must be 1-4000 characters".into()));
        }
    }
    if messages.last().is_some_and(|m| m.role != "user") {
        return Err(ValidationError::new("last_role")
            .with_message("last message must be from the user".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 20), custom(function = "validate_messages"))]
    pub messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub reply: String,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    body.validate()?;

    let user = load_user(&state, &auth.user_id).await?;
    if user.tier < Tier::Pro && !auth.is_admin() {
        return Err(AppError::Forbidden(
            "The AI coach requires a Pro or Elite subscription".to_string(),
        ));
    }

    let client = state
        .openai
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("AI coach is not configured".to_string()))?;

    if let Err(retry_after) = state.chat_limiter.check(&auth.user_id) {
        tracing::warn!(user_id = %auth.user_id, retry_after_secs = retry_after.as_secs(), "Chat rate limit hit");
        return Err(AppError::RateLimited(format!(
            "Too many coach messages, retry in {} seconds",
            retry_after.as_secs().max(1)
        )));
    }

    let reply = client.chat(body.messages).await?;
    Ok(Json(ChatResponse { reply }))
}
