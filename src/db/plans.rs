// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plan marketplace operations.

use crate::db::collections;
use crate::db::firestore::{fetch_doc, FirestoreDb, TxWrite};
use crate::error::AppError;
use crate::models::{Plan, PlanKind, Tier, UserPlan};
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;

/// Writes that give `user_id` ownership of `plan`, or `None` when they
/// already own it.
pub(crate) async fn plan_grant_writes(
    client: &firestore::FirestoreDb,
    mut plan: Plan,
    user_id: &str,
    source: &str,
    now: DateTime<Utc>,
) -> Result<Option<Vec<TxWrite>>, AppError> {
    let doc_id = UserPlan::document_id(user_id, &plan.plan_id);
    let owned: Option<UserPlan> = fetch_doc(client, collections::USER_PLANS, &doc_id).await?;
    if owned.is_some() {
        return Ok(None);
    }

    let ownership = UserPlan {
        user_id: user_id.to_string(),
        plan_id: plan.plan_id.clone(),
        source: source.to_string(),
        acquired_at: now,
    };
    plan.purchase_count = plan.purchase_count.saturating_add(1);

    Ok(Some(vec![TxWrite::UserPlan(ownership), TxWrite::Plan(plan)]))
}

pub(crate) async fn load_plan(
    client: &firestore::FirestoreDb,
    plan_id: &str,
) -> Result<Plan, AppError> {
    fetch_doc(client, collections::PLANS, plan_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))
}

impl FirestoreDb {
    pub async fn get_plan(&self, plan_id: &str) -> Result<Option<Plan>, AppError> {
        self.get_doc(collections::PLANS, plan_id).await
    }

    pub async fn upsert_plan(&self, plan: &Plan) -> Result<(), AppError> {
        self.set_doc(collections::PLANS, &plan.plan_id, plan).await
    }

    /// Published plans, newest first.
    pub async fn list_plans(
        &self,
        kind: Option<PlanKind>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Plan>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PLANS)
            .filter(move |q| {
                q.for_all([
                    q.field("published").eq(true),
                    kind.and_then(|k| q.field("kind").eq(k.as_str())),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .offset(page.saturating_sub(1).saturating_mul(per_page))
            .limit(per_page)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn owns_plan(&self, user_id: &str, plan_id: &str) -> Result<bool, AppError> {
        let record: Option<UserPlan> = self
            .get_doc(
                collections::USER_PLANS,
                &UserPlan::document_id(user_id, plan_id),
            )
            .await?;
        Ok(record.is_some())
    }

    /// Plans owned by a user, most recently acquired first.
    pub async fn list_user_plans(&self, user_id: &str) -> Result<Vec<Plan>, AppError> {
        let owner = user_id.to_string();
        let records: Vec<UserPlan> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USER_PLANS)
            .filter(move |q| q.for_all([q.field("user_id").eq(owner.clone())]))
            .order_by([("acquired_at", FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut plans = Vec::with_capacity(records.len());
        for record in records {
            match self.get_plan(&record.plan_id).await? {
                Some(plan) => plans.push(plan),
                None => tracing::warn!(
                    user_id,
                    plan_id = %record.plan_id,
                    "Owned plan no longer exists"
                ),
            }
        }
        Ok(plans)
    }

    /// Acquire a free plan.
    ///
    /// Fails with 403 when the caller's tier is below the plan's requirement
    /// and 409 when they already own it.
    pub async fn acquire_free_plan(
        &self,
        user_id: &str,
        user_tier: Tier,
        is_admin: bool,
        plan_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Plan, AppError> {
        self.transact("acquire_free_plan", |client| async move {
            let plan = load_plan(&client, plan_id).await?;
            if !plan.visible_to(user_id, is_admin) {
                return Err(AppError::NotFound(format!("Plan {} not found", plan_id)));
            }
            if !plan.is_free() {
                return Err(AppError::BadRequest(
                    "Plan is paid; purchase it through checkout".to_string(),
                ));
            }
            if user_tier < plan.required_tier {
                return Err(AppError::Forbidden(format!(
                    "Plan requires the {} tier",
                    plan.required_tier.as_str()
                )));
            }

            let writes = plan_grant_writes(&client, plan.clone(), user_id, "free", now)
                .await?
                .ok_or_else(|| AppError::Conflict("Plan already owned".to_string()))?;

            let mut acquired = plan;
            acquired.purchase_count = acquired.purchase_count.saturating_add(1);
            Ok((acquired, writes))
        })
        .await
    }

    /// Hide a plan from the marketplace.
    pub async fn unpublish_plan(&self, plan_id: &str) -> Result<Plan, AppError> {
        self.transact("unpublish_plan", |client| async move {
            let mut plan = load_plan(&client, plan_id).await?;
            plan.published = false;
            Ok((plan.clone(), vec![TxWrite::Plan(plan)]))
        })
        .await
    }
}
