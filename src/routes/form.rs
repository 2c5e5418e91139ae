// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Exercise, FormReport};
use crate::AppState;
use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/form/analyze", post(analyze_form))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AnalyzeRequest {
    pub exercise: Exercise,
    #[validate(url)]
    pub video_url: String,
}

/// Standalone form check outside of a challenge. Never fails because the
/// pose service is down; the report comes back flagged instead.
async fn analyze_form(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<AnalyzeRequest>,
) -> Result<Json<FormReport>> {
    body.validate()?;

    let report = state
        .form_analyzer
        .analyze(body.exercise, &body.video_url)
        .await;

    tracing::debug!(
        user_id = %auth.user_id,
        exercise = body.exercise.as_str(),
        verdict = ?report.verdict,
        valid_ratio = report.valid_ratio,
        "Form analyzed"
    );

    Ok(Json(report))
}
