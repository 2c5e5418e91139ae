// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use crate::error::Result;
use crate::models::LeaderboardEntry;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/leaderboard", get(get_leaderboard))
}

#[derive(Debug, Deserialize)]
struct LeaderboardQuery {
    gym_id: Option<String>,
    limit: Option<u32>,
}

#[derive(Serialize)]
pub struct RankedEntry {
    pub rank: u32,
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
}

#[derive(Serialize)]
pub struct LeaderboardResponse {
    pub gym_id: Option<String>,
    pub entries: Vec<RankedEntry>,
}

fn rank(entries: Vec<LeaderboardEntry>) -> Vec<RankedEntry> {
    entries
        .into_iter()
        .zip(1..)
        .map(|(entry, rank)| RankedEntry { rank, entry })
        .collect()
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let gym_id = params.gym_id.filter(|g| !g.is_empty());

    let entries = state
        .db
        .list_leaderboard(gym_id.as_deref(), limit)
        .await?;

    Ok(Json(LeaderboardResponse {
        gym_id,
        entries: rank(entries),
    }))
}
