// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement grants driven by payment webhooks.
//!
//! Every grant is keyed by the provider's event or session id: the purchase
//! record is read and written in the same transaction as the grant, so a
//! webhook delivered twice applies once.

use crate::db::collections;
use crate::db::firestore::{fetch_doc, FirestoreDb, TxWrite};
use crate::db::plans::{load_plan, plan_grant_writes};
use crate::error::AppError;
use crate::models::{PurchaseKind, PurchaseRecord, Tier, User};

/// Outcome of applying a payment event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    Applied,
    /// The event id was already processed
    Duplicate,
}

/// Stripe identifiers recorded on a subscription grant.
#[derive(Debug, Clone, Default)]
pub struct StripeIds {
    pub customer_id: Option<String>,
    pub subscription_id: Option<String>,
}

async fn load_user(client: &firestore::FirestoreDb, user_id: &str) -> Result<User, AppError> {
    fetch_doc(client, collections::USERS, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
}

impl FirestoreDb {
    pub async fn get_purchase(&self, purchase_id: &str) -> Result<Option<PurchaseRecord>, AppError> {
        self.get_doc(collections::PURCHASES, purchase_id).await
    }

    /// Apply a purchase: a tier for subscriptions, ownership for plans.
    pub async fn apply_purchase(
        &self,
        purchase: PurchaseRecord,
        stripe: StripeIds,
    ) -> Result<GrantOutcome, AppError> {
        self.transact("apply_purchase", |client| {
            let purchase = purchase.clone();
            let stripe = stripe.clone();
            async move {
                let seen: Option<PurchaseRecord> =
                    fetch_doc(&client, collections::PURCHASES, &purchase.purchase_id).await?;
                if seen.is_some() {
                    return Ok((GrantOutcome::Duplicate, Vec::new()));
                }

                let mut writes = Vec::new();
                match purchase.kind {
                    PurchaseKind::Subscription => {
                        let tier = purchase.tier.ok_or_else(|| {
                            AppError::BadRequest("Subscription purchase without a tier".to_string())
                        })?;
                        let mut user = load_user(&client, &purchase.user_id).await?;
                        user.tier = tier;
                        if stripe.customer_id.is_some() {
                            user.stripe_customer_id = stripe.customer_id;
                        }
                        if stripe.subscription_id.is_some() {
                            user.subscription_id = stripe.subscription_id;
                        }
                        writes.push(TxWrite::User(user));
                    }
                    PurchaseKind::Plan => {
                        let plan_id = purchase.plan_id.as_deref().ok_or_else(|| {
                            AppError::BadRequest("Plan purchase without a plan id".to_string())
                        })?;
                        // Existence check only; ownership lives in user_plans.
                        load_user(&client, &purchase.user_id).await?;
                        let plan = load_plan(&client, plan_id).await?;
                        let source = match purchase.provider {
                            crate::models::PaymentProvider::Stripe => "stripe",
                            crate::models::PaymentProvider::RevenueCat => "revenuecat",
                        };
                        if let Some(grant) = plan_grant_writes(
                            &client,
                            plan,
                            &purchase.user_id,
                            source,
                            purchase.created_at,
                        )
                        .await?
                        {
                            writes.extend(grant);
                        }
                    }
                }

                writes.push(TxWrite::Purchase(purchase));
                Ok((GrantOutcome::Applied, writes))
            }
        })
        .await
    }

    /// Drop the owner of a cancelled Stripe subscription back to free.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<Option<User>, AppError> {
        let Some(user) = self.find_user_by_subscription(subscription_id).await? else {
            return Ok(None);
        };

        let user_id = user.user_id.clone();
        let updated = self
            .transact("cancel_subscription", |client| {
                let user_id = user_id.clone();
                async move {
                    let mut user = load_user(&client, &user_id).await?;
                    if user.subscription_id.as_deref() != Some(subscription_id) {
                        return Ok((user, Vec::new()));
                    }
                    user.tier = Tier::Free;
                    user.subscription_id = None;
                    Ok((user.clone(), vec![TxWrite::User(user)]))
                }
            })
            .await?;

        Ok(Some(updated))
    }

    /// Apply an app-store expiration. A user still paying through Stripe keeps
    /// their tier.
    pub async fn expire_store_subscription(&self, user_id: &str) -> Result<User, AppError> {
        self.transact("expire_store_subscription", |client| async move {
            let mut user = load_user(&client, user_id).await?;
            if !user.expire_store_subscription() {
                return Ok((user, Vec::new()));
            }
            Ok((user.clone(), vec![TxWrite::User(user)]))
        })
        .await
    }

    /// Set a user's tier directly (admin override).
    pub async fn set_user_tier(&self, user_id: &str, tier: Tier) -> Result<User, AppError> {
        self.transact("set_user_tier", |client| async move {
            let mut user = load_user(&client, user_id).await?;
            user.tier = tier;
            Ok((user.clone(), vec![TxWrite::User(user)]))
        })
        .await
    }

    pub async fn set_user_banned(&self, user_id: &str, banned: bool) -> Result<User, AppError> {
        self.transact("set_user_banned", |client| async move {
            let mut user = load_user(&client, user_id).await?;
            user.banned = banned;
            Ok((user.clone(), vec![TxWrite::User(user)]))
        })
        .await
    }
}
