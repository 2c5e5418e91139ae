// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wager challenge routes.
//!
//! Lifecycle: create (stake escrowed) → accept (stake escrowed) → submit a
//! video per participant → resolve after expiry. Every mutation runs as a
//! Firestore transaction in `db::challenges`.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::challenge::{NewChallenge, DEFAULT_MAX_PARTICIPANTS};
use crate::models::{ChallengeStatus, Exercise, Submission, Verdict, WagerChallenge};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use validator::Validate;

const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/challenges", get(list_challenges).post(create_challenge))
        .route("/api/challenges/{id}", get(get_challenge))
        .route("/api/challenges/{id}/accept", post(accept_challenge))
        .route("/api/challenges/{id}/submit", post(submit_result))
        .route("/api/challenges/{id}/resolve", post(resolve_challenge))
        .route("/api/challenges/{id}/vote", post(cast_vote))
        .route("/api/challenges/{id}/votes", get(get_votes))
}

fn default_max_participants() -> u32 {
    DEFAULT_MAX_PARTICIPANTS
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChallengeRequest {
    pub exercise: Exercise,
    #[validate(range(min = 1, max = 1000))]
    pub target_reps: u32,
    #[validate(range(min = 50, max = 500))]
    pub wager_amount: u32,
    #[validate(range(min = 1, max = 168))]
    pub duration_hours: u32,
    #[serde(default = "default_max_participants")]
    #[validate(range(min = 2, max = 10))]
    pub max_participants: u32,
}

async fn create_challenge(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateChallengeRequest>,
) -> Result<(StatusCode, Json<WagerChallenge>)> {
    body.validate()?;

    let params = NewChallenge {
        challenge_id: uuid::Uuid::new_v4().to_string(),
        creator_id: auth.user_id.clone(),
        exercise: body.exercise,
        target_reps: body.target_reps,
        wager_amount: body.wager_amount,
        duration_hours: body.duration_hours,
        max_participants: body.max_participants,
    };

    let challenge = state.db.create_challenge(params, Utc::now()).await?;

    tracing::info!(
        challenge_id = %challenge.challenge_id,
        creator = %auth.user_id,
        exercise = challenge.exercise.as_str(),
        wager = challenge.wager_amount,
        "Challenge created"
    );

    Ok((StatusCode::CREATED, Json(challenge)))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<ChallengeStatus>,
    #[serde(default)]
    mine: bool,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct ChallengesResponse {
    pub challenges: Vec<WagerChallenge>,
}

async fn list_challenges(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ChallengesResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let participant = params.mine.then_some(auth.user_id.as_str());

    let challenges = state
        .db
        .list_challenges(params.status, participant, limit)
        .await?;

    Ok(Json(ChallengesResponse { challenges }))
}

async fn load_challenge(state: &AppState, challenge_id: &str) -> Result<WagerChallenge> {
    state
        .db
        .get_challenge(challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Challenge {} not found", challenge_id)))
}

async fn get_challenge(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<String>,
) -> Result<Json<WagerChallenge>> {
    Ok(Json(load_challenge(&state, &challenge_id).await?))
}

async fn accept_challenge(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
) -> Result<Json<WagerChallenge>> {
    let challenge = state
        .db
        .accept_challenge(&challenge_id, &auth.user_id, Utc::now())
        .await?;

    tracing::info!(
        challenge_id = %challenge_id,
        user_id = %auth.user_id,
        pot = challenge.pot,
        participants = challenge.participants.len(),
        "Challenge accepted"
    );

    let joiner_name = state
        .db
        .get_user(&auth.user_id)
        .await
        .ok()
        .flatten()
        .map(|u| u.display_name)
        .unwrap_or_else(|| "Someone".to_string());
    state
        .notifications
        .challenge_accepted(&challenge, &joiner_name);

    Ok(Json(challenge))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitResultRequest {
    #[validate(url)]
    pub video_url: String,
    #[validate(range(min = 1, max = 10000))]
    pub reps: u32,
}

async fn submit_result(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
    Json(body): Json<SubmitResultRequest>,
) -> Result<Json<WagerChallenge>> {
    body.validate()?;

    // Reject ineligible callers before the slow form analysis; the
    // transaction checks again.
    let challenge = load_challenge(&state, &challenge_id).await?;
    challenge.can_submit(&auth.user_id, Utc::now())?;

    let report = state
        .form_analyzer
        .analyze(challenge.exercise, &body.video_url)
        .await;
    let ai_verified = report.verdict == Verdict::Pass && body.reps >= challenge.target_reps;

    let submission = Submission {
        user_id: auth.user_id.clone(),
        video_url: body.video_url,
        reps: body.reps,
        verdict: report.verdict,
        valid_ratio: report.valid_ratio,
        ai_verified,
        submitted_at: Utc::now(),
    };

    let challenge = state
        .db
        .submit_challenge_result(&challenge_id, submission, Utc::now())
        .await?;

    tracing::info!(
        challenge_id = %challenge_id,
        user_id = %auth.user_id,
        verdict = ?report.verdict,
        ai_verified,
        "Challenge result submitted"
    );

    Ok(Json(challenge))
}

#[derive(Serialize)]
pub struct ResolveResponse {
    pub challenge: WagerChallenge,
    pub outcome: ChallengeStatus,
}

async fn resolve_challenge(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
) -> Result<Json<ResolveResponse>> {
    let (challenge, resolution) = state
        .db
        .resolve_challenge(&challenge_id, &auth.user_id, auth.is_admin(), Utc::now())
        .await?;

    tracing::info!(
        challenge_id = %challenge_id,
        status = %challenge.status,
        winner = challenge.winner_id.as_deref().unwrap_or("-"),
        pot = challenge.pot,
        "Challenge resolved"
    );

    state
        .notifications
        .challenge_resolved(&challenge, &resolution);

    Ok(Json(ResolveResponse {
        outcome: challenge.status,
        challenge,
    }))
}

#[derive(Debug, Deserialize, Validate)]
pub struct VoteRequest {
    #[validate(length(min = 1))]
    pub candidate_id: String,
}

#[derive(Serialize)]
pub struct VotesResponse {
    pub challenge_id: String,
    pub tally: BTreeMap<String, u32>,
    pub total_votes: u32,
}

impl VotesResponse {
    fn new(challenge_id: String, tally: BTreeMap<String, u32>) -> Self {
        let total_votes = tally.values().sum();
        Self {
            challenge_id,
            tally,
            total_votes,
        }
    }
}

async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(challenge_id): Path<String>,
    Json(body): Json<VoteRequest>,
) -> Result<Json<VotesResponse>> {
    body.validate()?;

    let tally = state
        .db
        .cast_challenge_vote(&challenge_id, &auth.user_id, &body.candidate_id)
        .await?;

    Ok(Json(VotesResponse::new(challenge_id, tally)))
}

async fn get_votes(
    State(state): State<Arc<AppState>>,
    Path(challenge_id): Path<String>,
) -> Result<Json<VotesResponse>> {
    let challenge = load_challenge(&state, &challenge_id).await?;
    Ok(Json(VotesResponse::new(challenge_id, challenge.vote_tally())))
}
