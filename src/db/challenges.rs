// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wager challenge persistence.
//!
//! Each operation loads the challenge through the transaction-scoped client,
//! runs the pure state transition from `models::challenge`, and stages the
//! challenge together with every XP and battle-stat document it affects.
//! Two concurrent accepts (or an accept racing a resolve) therefore cannot
//! both commit against the same snapshot.

use crate::db::collections;
use crate::db::firestore::{fetch_doc, FirestoreDb, TxWrite};
use crate::db::ledger::{load_battle_stats, load_xp, xp_writes};
use crate::error::AppError;
use crate::models::challenge::NewChallenge;
use crate::models::{ChallengeError, ChallengeStatus, Resolution, Submission, WagerChallenge};
use chrono::{DateTime, Utc};
use firestore::FirestoreQueryDirection;
use std::collections::BTreeMap;

async fn load_challenge(
    client: &firestore::FirestoreDb,
    challenge_id: &str,
) -> Result<WagerChallenge, AppError> {
    fetch_doc(client, collections::CHALLENGES, challenge_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Challenge {} not found", challenge_id)))
}

/// Debit a stake from `user_id`'s balance, failing when it is too small.
async fn debit_stake(
    client: &firestore::FirestoreDb,
    user_id: &str,
    stake: u64,
    now: DateTime<Utc>,
) -> Result<TxWrite, AppError> {
    let mut xp = load_xp(client, user_id, now).await?;
    if !xp.debit(stake, now) {
        return Err(ChallengeError::InsufficientXp {
            needed: stake,
            available: xp.xp_balance,
        }
        .into());
    }
    Ok(TxWrite::Xp(xp))
}

/// Ledger writes implied by a resolution.
async fn settlement_writes(
    client: &firestore::FirestoreDb,
    resolution: &Resolution,
    now: DateTime<Utc>,
) -> Result<Vec<TxWrite>, AppError> {
    let mut writes = Vec::new();

    match resolution {
        Resolution::Winner {
            winner_id,
            losers,
            pot,
            stake,
        } => {
            let net = pot.saturating_sub(*stake);

            let mut xp = load_xp(client, winner_id, now).await?;
            xp.credit(*pot, net, now);
            writes.extend(xp_writes(client, xp).await?);

            let mut stats = load_battle_stats(client, winner_id, now).await?;
            stats.record_win(net, now);
            writes.push(TxWrite::Battle(stats));

            for loser in losers {
                let mut stats = load_battle_stats(client, loser, now).await?;
                stats.record_loss(*stake, now);
                writes.push(TxWrite::Battle(stats));
            }
        }
        Resolution::NoWinner { refunds, stake } => {
            for user_id in refunds {
                let mut xp = load_xp(client, user_id, now).await?;
                xp.credit(*stake, 0, now);
                writes.push(TxWrite::Xp(xp));
            }
        }
        Resolution::Unresolved => {}
    }

    Ok(writes)
}

impl FirestoreDb {
    pub async fn get_challenge(&self, challenge_id: &str) -> Result<Option<WagerChallenge>, AppError> {
        self.get_doc(collections::CHALLENGES, challenge_id).await
    }

    /// List challenges newest first, optionally filtered by status and by
    /// participant.
    pub async fn list_challenges(
        &self,
        status: Option<ChallengeStatus>,
        participant: Option<&str>,
        limit: u32,
    ) -> Result<Vec<WagerChallenge>, AppError> {
        let participant = participant.map(String::from);

        self.get_client()?
            .fluent()
            .select()
            .from(collections::CHALLENGES)
            .filter(move |q| {
                q.for_all([
                    status.and_then(|s| q.field("status").eq(s.as_str())),
                    participant
                        .clone()
                        .and_then(|uid| q.field("participants").array_contains(uid)),
                ])
            })
            .order_by([("created_at", FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Open a challenge, escrowing the creator's stake.
    pub async fn create_challenge(
        &self,
        params: NewChallenge,
        now: DateTime<Utc>,
    ) -> Result<WagerChallenge, AppError> {
        let challenge = WagerChallenge::new(params, now)?;

        self.transact("create_challenge", |client| {
            let challenge = challenge.clone();
            async move {
                let debit =
                    debit_stake(&client, &challenge.creator_id, challenge.stake(), now).await?;
                let writes = vec![debit, TxWrite::Challenge(challenge.clone())];
                Ok((challenge, writes))
            }
        })
        .await
    }

    /// Join a challenge, escrowing the joiner's stake.
    pub async fn accept_challenge(
        &self,
        challenge_id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<WagerChallenge, AppError> {
        self.transact("accept_challenge", |client| async move {
            let mut challenge = load_challenge(&client, challenge_id).await?;
            challenge.accept(user_id, now)?;

            let debit = debit_stake(&client, user_id, challenge.stake(), now).await?;
            let writes = vec![debit, TxWrite::Challenge(challenge.clone())];
            Ok((challenge, writes))
        })
        .await
    }

    pub async fn submit_challenge_result(
        &self,
        challenge_id: &str,
        submission: Submission,
        now: DateTime<Utc>,
    ) -> Result<WagerChallenge, AppError> {
        self.transact("submit_challenge_result", |client| {
            let submission = submission.clone();
            async move {
                let mut challenge = load_challenge(&client, challenge_id).await?;
                challenge.record_submission(submission, now)?;
                Ok((challenge.clone(), vec![TxWrite::Challenge(challenge)]))
            }
        })
        .await
    }

    /// Resolve an expired challenge and move the pot.
    ///
    /// `requester` must be a participant unless `is_admin` is set.
    pub async fn resolve_challenge(
        &self,
        challenge_id: &str,
        requester: &str,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<(WagerChallenge, Resolution), AppError> {
        self.transact("resolve_challenge", |client| async move {
            let mut challenge = load_challenge(&client, challenge_id).await?;
            if !is_admin && !challenge.is_participant(requester) {
                return Err(ChallengeError::NotParticipant.into());
            }

            let resolution = challenge.resolve(now)?;
            let mut writes = settlement_writes(&client, &resolution, now).await?;
            writes.push(TxWrite::Challenge(challenge.clone()));
            Ok(((challenge, resolution), writes))
        })
        .await
    }

    /// Admin settlement of an unresolved challenge.
    pub async fn settle_challenge(
        &self,
        challenge_id: &str,
        winner_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(WagerChallenge, Resolution), AppError> {
        self.transact("settle_challenge", |client| async move {
            let mut challenge = load_challenge(&client, challenge_id).await?;
            let resolution = challenge.settle(winner_id, now)?;
            let mut writes = settlement_writes(&client, &resolution, now).await?;
            writes.push(TxWrite::Challenge(challenge.clone()));
            Ok(((challenge, resolution), writes))
        })
        .await
    }

    /// Record an advisory vote and return the updated tally.
    pub async fn cast_challenge_vote(
        &self,
        challenge_id: &str,
        voter_id: &str,
        candidate_id: &str,
    ) -> Result<BTreeMap<String, u32>, AppError> {
        self.transact("cast_challenge_vote", |client| async move {
            let mut challenge = load_challenge(&client, challenge_id).await?;
            challenge.cast_vote(voter_id, candidate_id)?;
            Ok((challenge.vote_tally(), vec![TxWrite::Challenge(challenge)]))
        })
        .await
    }
}
