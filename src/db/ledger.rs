// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP ledger, battle stats and leaderboard operations.

use crate::db::collections;
use crate::db::firestore::{fetch_doc, FirestoreDb, TxWrite};
use crate::error::AppError;
use crate::models::ledger::WorkoutAward;
use crate::models::{BattleStats, LeaderboardEntry, User, XpRecord};
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;

/// Load a user's XP record through a (possibly transaction-scoped) client,
/// starting from zero when none exists.
pub(crate) async fn load_xp(
    client: &firestore::FirestoreDb,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<XpRecord, AppError> {
    Ok(fetch_doc(client, collections::XP, user_id)
        .await?
        .unwrap_or_else(|| XpRecord::new(user_id, now)))
}

pub(crate) async fn load_battle_stats(
    client: &firestore::FirestoreDb,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<BattleStats, AppError> {
    Ok(fetch_doc(client, collections::BATTLE_STATS, user_id)
        .await?
        .unwrap_or_else(|| BattleStats::new(user_id, now)))
}

/// Leaderboard row for `xp`, using the profile when it still exists.
pub(crate) async fn leaderboard_entry(
    client: &firestore::FirestoreDb,
    xp: &XpRecord,
) -> Result<Option<LeaderboardEntry>, AppError> {
    let user: Option<User> = fetch_doc(client, collections::USERS, &xp.user_id).await?;
    Ok(user.map(|u| LeaderboardEntry::from_record(&u, xp)))
}

/// Writes for an updated XP record plus its leaderboard row.
pub(crate) async fn xp_writes(
    client: &firestore::FirestoreDb,
    xp: XpRecord,
) -> Result<Vec<TxWrite>, AppError> {
    let mut writes = Vec::with_capacity(2);
    if let Some(entry) = leaderboard_entry(client, &xp).await? {
        writes.push(TxWrite::Leaderboard(entry));
    }
    writes.push(TxWrite::Xp(xp));
    Ok(writes)
}

impl FirestoreDb {
    pub async fn get_xp(&self, user_id: &str) -> Result<Option<XpRecord>, AppError> {
        self.get_doc(collections::XP, user_id).await
    }

    pub async fn get_battle_stats(&self, user_id: &str) -> Result<Option<BattleStats>, AppError> {
        self.get_doc(collections::BATTLE_STATS, user_id).await
    }

    /// Award workout XP and advance the streak.
    ///
    /// The XP record and leaderboard entry are committed together.
    pub async fn record_workout(
        &self,
        user_id: &str,
        duration_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<(WorkoutAward, XpRecord), AppError> {
        self.transact("record_workout", |client| async move {
            let mut xp = load_xp(&client, user_id, now).await?;
            let award = xp.record_workout(duration_minutes, now);
            let writes = xp_writes(&client, xp.clone()).await?;
            Ok(((award, xp), writes))
        })
        .await
    }

    /// Copy profile fields onto the user's leaderboard entry, if they have one.
    pub async fn refresh_leaderboard_profile(&self, user: &User) -> Result<(), AppError> {
        let Some(mut entry) = self
            .get_doc::<LeaderboardEntry>(collections::LEADERBOARD, &user.user_id)
            .await?
        else {
            return Ok(());
        };

        entry.display_name = user.display_name.clone();
        entry.avatar_url = user.avatar_url.clone();
        entry.gym_id = user.gym_id.clone();
        self.set_doc(collections::LEADERBOARD, &user.user_id, &entry)
            .await
    }

    /// Top entries by lifetime XP, optionally restricted to one gym.
    pub async fn list_leaderboard(
        &self,
        gym_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let gym_id = gym_id.map(String::from);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::LEADERBOARD)
            .filter(move |q| {
                q.for_all([gym_id
                    .clone()
                    .and_then(|gym| q.field("gym_id").eq(gym))])
            })
            .order_by([("lifetime_xp", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
