// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! This file holds the connection handling, generic document helpers, the
//! transaction runner and user-profile operations. Feature-specific
//! operations live in sibling modules as further `impl FirestoreDb` blocks.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{
    BattleStats, Gym, GymFeedPost, LeaderboardEntry, Notification, PartnerSlot, Plan, PostReport,
    PurchaseRecord, SlotMembership, User, UserPlan, WagerChallenge, XpRecord,
};
use firestore::errors::FirestoreError;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;
/// Commit attempts before a contended transaction gives up.
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

/// A write staged inside a transaction.
///
/// Transaction bodies return these instead of writing directly so that the
/// runner can stage them all and commit once.
#[derive(Debug, Clone)]
pub enum TxWrite {
    User(User),
    Plan(Plan),
    UserPlan(UserPlan),
    Challenge(WagerChallenge),
    Xp(XpRecord),
    Battle(BattleStats),
    Leaderboard(LeaderboardEntry),
    Gym(Gym),
    Post(GymFeedPost),
    Report(PostReport),
    Slot(PartnerSlot),
    Membership(SlotMembership),
    DeleteMembership(String),
    Purchase(PurchaseRecord),
    Notification(Notification),
}

impl TxWrite {
    fn stage(
        &self,
        client: &firestore::FirestoreDb,
        transaction: &mut firestore::FirestoreTransaction<'_>,
    ) -> Result<(), AppError> {
        match self {
            TxWrite::User(u) => stage_object(client, transaction, collections::USERS, &u.user_id, u),
            TxWrite::Plan(p) => stage_object(client, transaction, collections::PLANS, &p.plan_id, p),
            TxWrite::UserPlan(up) => stage_object(
                client,
                transaction,
                collections::USER_PLANS,
                &UserPlan::document_id(&up.user_id, &up.plan_id),
                up,
            ),
            TxWrite::Challenge(c) => stage_object(
                client,
                transaction,
                collections::CHALLENGES,
                &c.challenge_id,
                c,
            ),
            TxWrite::Xp(x) => stage_object(client, transaction, collections::XP, &x.user_id, x),
            TxWrite::Battle(b) => {
                stage_object(client, transaction, collections::BATTLE_STATS, &b.user_id, b)
            }
            TxWrite::Leaderboard(e) => {
                stage_object(client, transaction, collections::LEADERBOARD, &e.user_id, e)
            }
            TxWrite::Gym(g) => stage_object(client, transaction, collections::GYMS, &g.gym_id, g),
            TxWrite::Post(p) => {
                stage_object(client, transaction, collections::GYM_POSTS, &p.post_id, p)
            }
            TxWrite::Report(r) => {
                stage_object(client, transaction, collections::POST_REPORTS, &r.report_id, r)
            }
            TxWrite::Slot(s) => {
                stage_object(client, transaction, collections::PARTNER_SLOTS, &s.slot_id, s)
            }
            TxWrite::Membership(m) => stage_object(
                client,
                transaction,
                collections::SLOT_MEMBERSHIPS,
                &m.user_id,
                m,
            ),
            TxWrite::DeleteMembership(user_id) => {
                client
                    .fluent()
                    .delete()
                    .from(collections::SLOT_MEMBERSHIPS)
                    .document_id(user_id)
                    .add_to_transaction(transaction)
                    .map_err(|e| {
                        AppError::Database(format!("Failed to add deletion to transaction: {}", e))
                    })?;
                Ok(())
            }
            TxWrite::Purchase(p) => {
                stage_object(client, transaction, collections::PURCHASES, &p.purchase_id, p)
            }
            TxWrite::Notification(n) => stage_object(
                client,
                transaction,
                collections::NOTIFICATIONS,
                &n.notification_id,
                n,
            ),
        }
    }
}

fn stage_object<T>(
    client: &firestore::FirestoreDb,
    transaction: &mut firestore::FirestoreTransaction<'_>,
    collection: &str,
    document_id: &str,
    object: &T,
) -> Result<(), AppError>
where
    T: Serialize + DeserializeOwned + Sync + Send,
{
    client
        .fluent()
        .update()
        .in_col(collection)
        .document_id(document_id)
        .object(object)
        .add_to_transaction(transaction)
        .map_err(|e| {
            AppError::Database(format!(
                "Failed to add {} write to transaction: {}",
                collection, e
            ))
        })?;
    Ok(())
}

/// Whether a failed commit may succeed if the transaction is re-run.
///
/// Firestore reports lock contention as `ABORTED`, which the client maps to a
/// retryable database error along with other transient codes.
fn is_contention(err: &FirestoreError) -> bool {
    matches!(err, FirestoreError::DatabaseError(e) if e.retry_possible)
}

/// Read one document by id through the given client.
///
/// Inside a transaction body, pass the transaction-scoped client so the read
/// is registered for conflict detection.
pub async fn fetch_doc<T>(
    client: &firestore::FirestoreDb,
    collection: &str,
    document_id: &str,
) -> Result<Option<T>, AppError>
where
    T: DeserializeOwned + Send,
{
    client
        .fluent()
        .select()
        .by_id_in(collection)
        .obj()
        .one(document_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    pub(crate) fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Generic Document Helpers ───────────────────────────────

    pub(crate) async fn get_doc<T>(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<T>, AppError>
    where
        T: DeserializeOwned + Send,
    {
        fetch_doc(self.get_client()?, collection, document_id).await
    }

    pub(crate) async fn set_doc<T>(
        &self,
        collection: &str,
        document_id: &str,
        object: &T,
    ) -> Result<(), AppError>
    where
        T: Serialize + DeserializeOwned + Sync + Send,
    {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collection)
            .document_id(document_id)
            .object(object)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub(crate) async fn delete_doc(&self, collection: &str, document_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collection)
            .document_id(document_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Transactions ───────────────────────────────────────────

    /// Run a read-modify-write body inside a Firestore transaction.
    ///
    /// The body receives a client bound to the transaction: every document it
    /// reads through that client is checked for concurrent modification at
    /// commit time. It returns its result plus the writes to stage. A commit
    /// that loses a race re-runs the body with fresh reads, up to
    /// `MAX_TRANSACTION_ATTEMPTS` times. Any other commit failure, and any
    /// error returned by the body, aborts immediately.
    pub async fn transact<T, F, Fut>(&self, label: &str, mut body: F) -> Result<T, AppError>
    where
        F: FnMut(firestore::FirestoreDb) -> Fut,
        Fut: Future<Output = Result<(T, Vec<TxWrite>), AppError>>,
    {
        let client = self.get_client()?;

        for attempt in 1..=MAX_TRANSACTION_ATTEMPTS {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            let tx_client = client.clone_with_consistency_selector(
                firestore::FirestoreConsistencySelector::Transaction(
                    transaction.transaction_id().clone(),
                ),
            );

            let (value, writes) = match body(tx_client).await {
                Ok(result) => result,
                Err(e) => {
                    let _ = transaction.rollback().await;
                    return Err(e);
                }
            };

            if writes.is_empty() {
                let _ = transaction.rollback().await;
                return Ok(value);
            }

            for write in &writes {
                write.stage(client, &mut transaction)?;
            }

            match transaction.commit().await {
                Ok(_) => {
                    tracing::debug!(label, attempt, writes = writes.len(), "Transaction committed");
                    return Ok(value);
                }
                Err(e) if is_contention(&e) => {
                    tracing::warn!(label, attempt, error = %e, "Transaction contended, retrying");
                }
                Err(e) => {
                    return Err(AppError::Database(format!(
                        "{} commit failed: {}",
                        label, e
                    )));
                }
            }
        }

        tracing::error!(label, attempts = MAX_TRANSACTION_ATTEMPTS, "Transaction retries exhausted");
        Err(AppError::Conflict(
            "Too many concurrent updates, please retry".to_string(),
        ))
    }

    /// Helper to batch delete documents using transactions.
    pub(crate) async fn batch_delete(
        &self,
        collection: &str,
        document_ids: &[String],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in document_ids.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for doc_id in chunk {
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by Firebase uid.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_doc(collections::USERS, user_id).await
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        self.set_doc(collections::USERS, &user.user_id, user).await
    }

    /// Look up the user owning a Stripe subscription.
    pub async fn find_user_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<User>, AppError> {
        let subscription_id = subscription_id.to_string();
        let mut users: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("subscription_id").eq(subscription_id.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(users.pop())
    }

    /// Ids of documents in `collection` whose `field` equals `value`.
    async fn ids_where(
        &self,
        collection: &str,
        field: &'static str,
        value: &str,
        id_of: impl Fn(&serde_json::Value) -> Option<String>,
    ) -> Result<Vec<String>, AppError> {
        let value = value.to_string();
        let docs: Vec<serde_json::Value> = self
            .get_client()?
            .fluent()
            .select()
            .from(collection)
            .filter(move |q| q.for_all([q.field(field).eq(value.clone())]))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(docs.iter().filter_map(id_of).collect())
    }

    // ─── User Data Deletion ─────────────────────────────────────

    /// Delete ALL data for a user.
    ///
    /// Removes owned plan records, notifications, slot membership, the XP
    /// ledger, battle stats, leaderboard entry and finally the profile.
    /// Challenges and feed posts stay (other users reference them).
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Plan ownership records
        let plan_ids = self
            .ids_where(collections::USER_PLANS, "user_id", user_id, |doc| {
                doc.get("plan_id")
                    .and_then(|v| v.as_str())
                    .map(|plan_id| UserPlan::document_id(user_id, plan_id))
            })
            .await?;
        self.batch_delete(collections::USER_PLANS, &plan_ids).await?;
        deleted_count += plan_ids.len();
        tracing::debug!(user_id, count = plan_ids.len(), "Deleted user plans");

        // 2. Notifications
        let notification_ids = self
            .ids_where(collections::NOTIFICATIONS, "user_id", user_id, |doc| {
                doc.get("notification_id")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            })
            .await?;
        self.batch_delete(collections::NOTIFICATIONS, &notification_ids)
            .await?;
        deleted_count += notification_ids.len();
        tracing::debug!(user_id, count = notification_ids.len(), "Deleted notifications");

        // 3. Per-user singleton documents
        for collection in [
            collections::SLOT_MEMBERSHIPS,
            collections::XP,
            collections::BATTLE_STATS,
            collections::LEADERBOARD,
            collections::USERS,
        ] {
            self.delete_doc(collection, user_id).await?;
            deleted_count += 1;
        }

        tracing::info!(user_id, deleted_count, "User data deletion complete");

        Ok(deleted_count)
    }
}
