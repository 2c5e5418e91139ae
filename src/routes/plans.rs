// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan marketplace routes.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Plan, PlanKind, Tier};
use crate::routes::users::load_user;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::{Validate, ValidationError};

const MAX_PER_PAGE: u32 = 100;
pub const MAX_PLAN_PRICE_CENTS: u32 = 100_000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/plans", get(list_plans).post(create_plan))
        .route("/api/plans/{id}", get(get_plan))
        .route("/api/plans/{id}/acquire", post(acquire_plan))
        .route("/api/me/plans", get(my_plans))
}

#[derive(Debug, Deserialize)]
struct PlansQuery {
    kind: Option<PlanKind>,
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_per_page")]
    per_page: u32,
}

fn default_page() -> u32 {
    1
}
fn default_per_page() -> u32 {
    20
}

#[derive(Serialize)]
pub struct PlansResponse {
    pub plans: Vec<Plan>,
    pub page: u32,
    pub per_page: u32,
}

async fn list_plans(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PlansQuery>,
) -> Result<Json<PlansResponse>> {
    let page = params.page.max(1);
    let per_page = params.per_page.clamp(1, MAX_PER_PAGE);

    let plans = state.db.list_plans(params.kind, page, per_page).await?;

    Ok(Json(PlansResponse {
        plans,
        page,
        per_page,
    }))
}

fn validate_items(items: &Vec<String>) -> std::result::Result<(), ValidationError> {
    if items.iter().any(|i| i.trim().is_empty() || i.chars().count() > 2000) {
        return Err(ValidationError::new("item_length")
            .with_message("each item must be 1-2000 characters".into()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePlanRequest {
    #[validate(length(min = 3, max = 100))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: String,
    pub kind: PlanKind,
    #[validate(range(max = 100000))]
    pub price_cents: u32,
    #[serde(default)]
    pub required_tier: Tier,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub tags: Vec<String>,
    #[validate(length(min = 1, max = 100), custom(function = "validate_items"))]
    pub items: Vec<String>,
    #[serde(default = "default_published")]
    pub published: bool,
}

fn default_published() -> bool {
    true
}

async fn create_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<Plan>)> {
    body.validate()?;

    let plan = Plan {
        plan_id: uuid::Uuid::new_v4().to_string(),
        creator_id: auth.user_id.clone(),
        title: body.title.trim().to_string(),
        description: body.description,
        kind: body.kind,
        price_cents: body.price_cents,
        required_tier: body.required_tier,
        tags: body.tags,
        items: body.items,
        purchase_count: 0,
        published: body.published,
        created_at: Utc::now(),
    };
    state.db.upsert_plan(&plan).await?;

    tracing::info!(
        plan_id = %plan.plan_id,
        creator = %auth.user_id,
        kind = plan.kind.as_str(),
        price_cents = plan.price_cents,
        "Plan created"
    );

    Ok((StatusCode::CREATED, Json(plan)))
}

/// Load a plan the caller may see; unpublished plans look missing to others.
pub(crate) async fn visible_plan(state: &AppState, auth: &AuthUser, plan_id: &str) -> Result<Plan> {
    state
        .db
        .get_plan(plan_id)
        .await?
        .filter(|p| p.visible_to(&auth.user_id, auth.is_admin()))
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))
}

async fn get_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>> {
    Ok(Json(visible_plan(&state, &auth, &plan_id).await?))
}

async fn acquire_plan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(plan_id): Path<String>,
) -> Result<Json<Plan>> {
    let user = load_user(&state, &auth.user_id).await?;

    let plan = state
        .db
        .acquire_free_plan(&auth.user_id, user.tier, auth.is_admin(), &plan_id, Utc::now())
        .await?;

    tracing::info!(user_id = %auth.user_id, plan_id = %plan_id, "Free plan acquired");
    Ok(Json(plan))
}

#[derive(Serialize)]
pub struct MyPlansResponse {
    pub plans: Vec<Plan>,
}

async fn my_plans(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<MyPlansResponse>> {
    let plans = state.db.list_user_plans(&auth.user_id).await?;
    Ok(Json(MyPlansResponse { plans }))
}
