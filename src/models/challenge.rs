// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wager challenge state machine.
//!
//! ```text
//! pending ──accept──▶ active ──resolve──▶ resolved | no_winner | unresolved
//!    └──────────expired, nobody joined──────────▶ no_winner
//! unresolved ──admin settle──▶ resolved
//! ```
//!
//! Every transition here is pure; the database layer runs them inside a
//! Firestore transaction and applies the XP side effects they describe.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::AppError;
use crate::models::{Exercise, Verdict};
use crate::time_utils::rfc3339_millis;

pub const MIN_WAGER: u32 = 50;
pub const MAX_WAGER: u32 = 500;
pub const MIN_DURATION_HOURS: u32 = 1;
pub const MAX_DURATION_HOURS: u32 = 168;
pub const DEFAULT_MAX_PARTICIPANTS: u32 = 2;
pub const MAX_PARTICIPANTS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Pending,
    Active,
    Resolved,
    NoWinner,
    Unresolved,
}

impl ChallengeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ChallengeStatus::Pending => "pending",
            ChallengeStatus::Active => "active",
            ChallengeStatus::Resolved => "resolved",
            ChallengeStatus::NoWinner => "no_winner",
            ChallengeStatus::Unresolved => "unresolved",
        }
    }
}

impl std::fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule violations for challenge operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    #[error("wager amount must be between 50 and 500 XP, got {0}")]
    InvalidWager(u32),
    #[error("duration must be between 1 and 168 hours")]
    InvalidDuration,
    #[error("max participants must be between 2 and 10")]
    InvalidCapacity,
    #[error("target reps must be positive")]
    InvalidTarget,
    #[error("challenge is {0}")]
    InvalidState(ChallengeStatus),
    #[error("challenge has expired")]
    Expired,
    #[error("challenge has not expired yet")]
    NotExpired,
    #[error("user already joined this challenge")]
    AlreadyJoined,
    #[error("challenge is full")]
    Full,
    #[error("user is not a participant")]
    NotParticipant,
    #[error("user already submitted a result")]
    AlreadySubmitted,
    #[error("insufficient XP: need {needed}, have {available}")]
    InsufficientXp { needed: u64, available: u64 },
    #[error("participants cannot vote on their own challenge")]
    ParticipantCannotVote,
    #[error("candidate is not a participant with a submission")]
    InvalidCandidate,
    #[error("user already voted")]
    AlreadyVoted,
}

impl From<ChallengeError> for AppError {
    fn from(err: ChallengeError) -> Self {
        let msg = err.to_string();
        match err {
            ChallengeError::AlreadyJoined
            | ChallengeError::AlreadySubmitted
            | ChallengeError::AlreadyVoted
            | ChallengeError::Full
            | ChallengeError::InvalidState(_) => AppError::Conflict(msg),
            ChallengeError::NotParticipant | ChallengeError::ParticipantCannotVote => {
                AppError::Forbidden(msg)
            }
            _ => AppError::BadRequest(msg),
        }
    }
}

/// A participant's recorded result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: String,
    pub video_url: String,
    pub reps: u32,
    pub verdict: Verdict,
    pub valid_ratio: f32,
    /// Verdict passed and the rep target was met
    pub ai_verified: bool,
    #[serde(with = "rfc3339_millis")]
    pub submitted_at: DateTime<Utc>,
}

/// Parameters for opening a challenge.
#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub challenge_id: String,
    pub creator_id: String,
    pub exercise: Exercise,
    pub target_reps: u32,
    pub wager_amount: u32,
    pub duration_hours: u32,
    pub max_participants: u32,
}

/// Challenge document stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerChallenge {
    pub challenge_id: String,
    pub creator_id: String,
    pub exercise: Exercise,
    pub target_reps: u32,
    /// Stake each participant puts in
    pub wager_amount: u32,
    /// Escrowed XP (sum of stakes)
    pub pot: u64,
    /// Join order; resolution scans in this order
    pub participants: Vec<String>,
    pub max_participants: u32,
    pub status: ChallengeStatus,
    #[serde(default)]
    pub submissions: BTreeMap<String, Submission>,
    /// voter id -> candidate id
    #[serde(default)]
    pub votes: BTreeMap<String, String>,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(with = "rfc3339_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "rfc3339_millis")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, with = "rfc3339_millis::option")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// XP movements implied by a resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Winner takes the pot; every other participant lost their stake.
    Winner {
        winner_id: String,
        losers: Vec<String>,
        pot: u64,
        stake: u64,
    },
    /// Nobody submitted: stakes go back to their owners.
    NoWinner { refunds: Vec<String>, stake: u64 },
    /// Submissions exist but none verified; stakes stay escrowed.
    Unresolved,
}

impl WagerChallenge {
    /// Validate parameters and open a pending challenge with the creator as
    /// first participant. The creator's stake is already in the pot.
    pub fn new(params: NewChallenge, now: DateTime<Utc>) -> Result<Self, ChallengeError> {
        if !(MIN_WAGER..=MAX_WAGER).contains(&params.wager_amount) {
            return Err(ChallengeError::InvalidWager(params.wager_amount));
        }
        if !(MIN_DURATION_HOURS..=MAX_DURATION_HOURS).contains(&params.duration_hours) {
            return Err(ChallengeError::InvalidDuration);
        }
        if !(2..=MAX_PARTICIPANTS_LIMIT).contains(&params.max_participants) {
            return Err(ChallengeError::InvalidCapacity);
        }
        if params.target_reps == 0 {
            return Err(ChallengeError::InvalidTarget);
        }

        Ok(Self {
            challenge_id: params.challenge_id,
            participants: vec![params.creator_id.clone()],
            creator_id: params.creator_id,
            exercise: params.exercise,
            target_reps: params.target_reps,
            wager_amount: params.wager_amount,
            pot: u64::from(params.wager_amount),
            max_participants: params.max_participants,
            status: ChallengeStatus::Pending,
            submissions: BTreeMap::new(),
            votes: BTreeMap::new(),
            winner_id: None,
            created_at: now,
            expires_at: now + Duration::hours(i64::from(params.duration_hours)),
            resolved_at: None,
        })
    }

    pub fn stake(&self) -> u64 {
        u64::from(self.wager_amount)
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p == user_id)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Add a participant and move the challenge to active.
    pub fn accept(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<(), ChallengeError> {
        if !matches!(
            self.status,
            ChallengeStatus::Pending | ChallengeStatus::Active
        ) {
            return Err(ChallengeError::InvalidState(self.status));
        }
        if self.is_expired(now) {
            return Err(ChallengeError::Expired);
        }
        if self.is_participant(user_id) {
            return Err(ChallengeError::AlreadyJoined);
        }
        if self.participants.len() as u32 >= self.max_participants {
            return Err(ChallengeError::Full);
        }

        self.participants.push(user_id.to_string());
        self.pot += self.stake();
        self.status = ChallengeStatus::Active;
        Ok(())
    }

    /// Whether `user_id` may submit a result at `now`.
    pub fn can_submit(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), ChallengeError> {
        if self.status != ChallengeStatus::Active {
            return Err(ChallengeError::InvalidState(self.status));
        }
        if !self.is_participant(user_id) {
            return Err(ChallengeError::NotParticipant);
        }
        if self.is_expired(now) {
            return Err(ChallengeError::Expired);
        }
        if self.submissions.contains_key(user_id) {
            return Err(ChallengeError::AlreadySubmitted);
        }
        Ok(())
    }

    /// Attach a participant's result.
    pub fn record_submission(
        &mut self,
        submission: Submission,
        now: DateTime<Utc>,
    ) -> Result<(), ChallengeError> {
        self.can_submit(&submission.user_id, now)?;

        self.submissions
            .insert(submission.user_id.clone(), submission);
        Ok(())
    }

    /// Resolve an expired challenge.
    ///
    /// The first participant in join order with an AI-verified submission
    /// wins; there is no further tie-break.
    pub fn resolve(&mut self, now: DateTime<Utc>) -> Result<Resolution, ChallengeError> {
        if !matches!(
            self.status,
            ChallengeStatus::Pending | ChallengeStatus::Active
        ) {
            return Err(ChallengeError::InvalidState(self.status));
        }
        if !self.is_expired(now) {
            return Err(ChallengeError::NotExpired);
        }

        self.resolved_at = Some(now);

        if self.submissions.is_empty() {
            self.status = ChallengeStatus::NoWinner;
            return Ok(Resolution::NoWinner {
                refunds: self.participants.clone(),
                stake: self.stake(),
            });
        }

        let winner = self
            .participants
            .iter()
            .find(|p| self.submissions.get(*p).is_some_and(|s| s.ai_verified))
            .cloned();

        match winner {
            Some(winner_id) => Ok(self.award(winner_id)),
            None => {
                self.status = ChallengeStatus::Unresolved;
                Ok(Resolution::Unresolved)
            }
        }
    }

    /// Manually settle an unresolved challenge in favour of a participant.
    pub fn settle(&mut self, winner_id: &str, now: DateTime<Utc>) -> Result<Resolution, ChallengeError> {
        if self.status != ChallengeStatus::Unresolved {
            return Err(ChallengeError::InvalidState(self.status));
        }
        if !self.is_participant(winner_id) {
            return Err(ChallengeError::NotParticipant);
        }

        self.resolved_at = Some(now);
        Ok(self.award(winner_id.to_string()))
    }

    fn award(&mut self, winner_id: String) -> Resolution {
        let losers = self
            .participants
            .iter()
            .filter(|p| **p != winner_id)
            .cloned()
            .collect();

        self.status = ChallengeStatus::Resolved;
        self.winner_id = Some(winner_id.clone());

        Resolution::Winner {
            winner_id,
            losers,
            pot: self.pot,
            stake: self.stake(),
        }
    }

    /// Record an advisory vote on an unresolved challenge.
    pub fn cast_vote(&mut self, voter_id: &str, candidate_id: &str) -> Result<(), ChallengeError> {
        if self.status != ChallengeStatus::Unresolved {
            return Err(ChallengeError::InvalidState(self.status));
        }
        if self.is_participant(voter_id) {
            return Err(ChallengeError::ParticipantCannotVote);
        }
        if !self.is_participant(candidate_id) || !self.submissions.contains_key(candidate_id) {
            return Err(ChallengeError::InvalidCandidate);
        }
        if self.votes.contains_key(voter_id) {
            return Err(ChallengeError::AlreadyVoted);
        }

        self.votes
            .insert(voter_id.to_string(), candidate_id.to_string());
        Ok(())
    }

    /// Votes per candidate.
    pub fn vote_tally(&self) -> BTreeMap<String, u32> {
        let mut tally = BTreeMap::new();
        for candidate in self.votes.values() {
            *tally.entry(candidate.clone()).or_insert(0) += 1;
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn params(wager: u32) -> NewChallenge {
        NewChallenge {
            challenge_id: "c1".into(),
            creator_id: "alice".into(),
            exercise: Exercise::Squat,
            target_reps: 20,
            wager_amount: wager,
            duration_hours: 24,
            max_participants: 3,
        }
    }

    fn submission(user: &str, verified: bool) -> Submission {
        Submission {
            user_id: user.into(),
            video_url: format!("https://cdn.example.com/{user}.mp4"),
            reps: 25,
            verdict: if verified { Verdict::Pass } else { Verdict::Flagged },
            valid_ratio: if verified { 0.9 } else { 0.5 },
            ai_verified: verified,
            submitted_at: t0(),
        }
    }

    fn active_challenge() -> WagerChallenge {
        let mut c = WagerChallenge::new(params(100), t0()).unwrap();
        c.accept("bob", t0()).unwrap();
        c.accept("carol", t0()).unwrap();
        c
    }

    fn after_expiry() -> DateTime<Utc> {
        t0() + Duration::hours(25)
    }

    #[test]
    fn test_wager_bounds() {
        assert_eq!(
            WagerChallenge::new(params(49), t0()).unwrap_err(),
            ChallengeError::InvalidWager(49)
        );
        assert_eq!(
            WagerChallenge::new(params(501), t0()).unwrap_err(),
            ChallengeError::InvalidWager(501)
        );
        assert!(WagerChallenge::new(params(50), t0()).is_ok());
        assert!(WagerChallenge::new(params(500), t0()).is_ok());
    }

    #[test]
    fn test_new_challenge_is_pending_with_creator() {
        let c = WagerChallenge::new(params(100), t0()).unwrap();
        assert_eq!(c.status, ChallengeStatus::Pending);
        assert_eq!(c.participants, vec!["alice"]);
        assert_eq!(c.pot, 100);
        assert_eq!(c.expires_at, t0() + Duration::hours(24));
    }

    #[test]
    fn test_invalid_parameters() {
        let mut p = params(100);
        p.duration_hours = 0;
        assert_eq!(
            WagerChallenge::new(p, t0()).unwrap_err(),
            ChallengeError::InvalidDuration
        );

        let mut p = params(100);
        p.max_participants = 1;
        assert_eq!(
            WagerChallenge::new(p, t0()).unwrap_err(),
            ChallengeError::InvalidCapacity
        );

        let mut p = params(100);
        p.target_reps = 0;
        assert_eq!(
            WagerChallenge::new(p, t0()).unwrap_err(),
            ChallengeError::InvalidTarget
        );
    }

    #[test]
    fn test_accept_moves_to_active_and_grows_pot() {
        let mut c = WagerChallenge::new(params(100), t0()).unwrap();
        c.accept("bob", t0()).unwrap();
        assert_eq!(c.status, ChallengeStatus::Active);
        assert_eq!(c.pot, 200);
        assert_eq!(c.participants, vec!["alice", "bob"]);
    }

    #[test]
    fn test_duplicate_join_rejected() {
        let mut c = WagerChallenge::new(params(100), t0()).unwrap();
        assert_eq!(
            c.accept("alice", t0()).unwrap_err(),
            ChallengeError::AlreadyJoined
        );
        c.accept("bob", t0()).unwrap();
        assert_eq!(
            c.accept("bob", t0()).unwrap_err(),
            ChallengeError::AlreadyJoined
        );
        assert_eq!(c.pot, 200);
    }

    #[test]
    fn test_accept_capacity_and_expiry() {
        let mut c = active_challenge();
        assert_eq!(c.accept("dave", t0()).unwrap_err(), ChallengeError::Full);

        let mut c = WagerChallenge::new(params(100), t0()).unwrap();
        assert_eq!(
            c.accept("bob", after_expiry()).unwrap_err(),
            ChallengeError::Expired
        );
    }

    #[test]
    fn test_submission_rules() {
        let mut c = WagerChallenge::new(params(100), t0()).unwrap();
        assert_eq!(
            c.record_submission(submission("alice", true), t0())
                .unwrap_err(),
            ChallengeError::InvalidState(ChallengeStatus::Pending)
        );

        let mut c = active_challenge();
        assert_eq!(
            c.record_submission(submission("mallory", true), t0())
                .unwrap_err(),
            ChallengeError::NotParticipant
        );
        c.record_submission(submission("bob", true), t0()).unwrap();
        assert_eq!(
            c.record_submission(submission("bob", true), t0())
                .unwrap_err(),
            ChallengeError::AlreadySubmitted
        );
        assert_eq!(
            c.record_submission(submission("carol", true), after_expiry())
                .unwrap_err(),
            ChallengeError::Expired
        );

        // The read-only check agrees with what recording enforces.
        assert_eq!(c.can_submit("carol", t0()), Ok(()));
        assert_eq!(
            c.can_submit("bob", t0()),
            Err(ChallengeError::AlreadySubmitted)
        );
        assert_eq!(
            c.can_submit("carol", after_expiry()),
            Err(ChallengeError::Expired)
        );
        assert_eq!(
            c.can_submit("mallory", t0()),
            Err(ChallengeError::NotParticipant)
        );
    }

    #[test]
    fn test_resolve_before_expiry_rejected() {
        let mut c = active_challenge();
        assert_eq!(c.resolve(t0()).unwrap_err(), ChallengeError::NotExpired);
        assert_eq!(c.status, ChallengeStatus::Active);
    }

    #[test]
    fn test_winner_is_first_verified_in_join_order() {
        let mut c = active_challenge();
        // carol submits first, but bob joined first
        c.record_submission(submission("carol", true), t0()).unwrap();
        c.record_submission(submission("bob", true), t0()).unwrap();
        c.record_submission(submission("alice", false), t0())
            .unwrap();

        let resolution = c.resolve(after_expiry()).unwrap();

        assert_eq!(
            resolution,
            Resolution::Winner {
                winner_id: "bob".into(),
                losers: vec!["alice".into(), "carol".into()],
                pot: 300,
                stake: 100,
            }
        );
        assert_eq!(c.status, ChallengeStatus::Resolved);
        assert_eq!(c.winner_id.as_deref(), Some("bob"));
        assert_eq!(c.resolved_at, Some(after_expiry()));
    }

    #[test]
    fn test_no_submissions_refunds_everyone() {
        let mut c = active_challenge();
        let resolution = c.resolve(after_expiry()).unwrap();
        assert_eq!(
            resolution,
            Resolution::NoWinner {
                refunds: vec!["alice".into(), "bob".into(), "carol".into()],
                stake: 100,
            }
        );
        assert_eq!(c.status, ChallengeStatus::NoWinner);
    }

    #[test]
    fn test_unaccepted_challenge_expires_as_no_winner() {
        let mut c = WagerChallenge::new(params(100), t0()).unwrap();
        let resolution = c.resolve(after_expiry()).unwrap();
        assert_eq!(
            resolution,
            Resolution::NoWinner {
                refunds: vec!["alice".into()],
                stake: 100,
            }
        );
    }

    #[test]
    fn test_unverified_submissions_leave_challenge_unresolved() {
        let mut c = active_challenge();
        c.record_submission(submission("bob", false), t0())
            .unwrap();

        assert_eq!(c.resolve(after_expiry()).unwrap(), Resolution::Unresolved);
        assert_eq!(c.status, ChallengeStatus::Unresolved);
        assert!(c.winner_id.is_none());

        // Cannot resolve twice
        assert_eq!(
            c.resolve(after_expiry()).unwrap_err(),
            ChallengeError::InvalidState(ChallengeStatus::Unresolved)
        );
    }

    #[test]
    fn test_votes_are_advisory() {
        let mut c = active_challenge();
        c.record_submission(submission("bob", false), t0())
            .unwrap();
        c.record_submission(submission("carol", false), t0())
            .unwrap();

        assert_eq!(
            c.cast_vote("viewer", "bob").unwrap_err(),
            ChallengeError::InvalidState(ChallengeStatus::Active)
        );

        c.resolve(after_expiry()).unwrap();

        c.cast_vote("v1", "bob").unwrap();
        c.cast_vote("v2", "bob").unwrap();
        c.cast_vote("v3", "carol").unwrap();
        assert_eq!(
            c.cast_vote("v1", "carol").unwrap_err(),
            ChallengeError::AlreadyVoted
        );
        assert_eq!(
            c.cast_vote("alice", "bob").unwrap_err(),
            ChallengeError::ParticipantCannotVote
        );
        // alice never submitted
        assert_eq!(
            c.cast_vote("v4", "alice").unwrap_err(),
            ChallengeError::InvalidCandidate
        );

        let tally = c.vote_tally();
        assert_eq!(tally.get("bob"), Some(&2));
        assert_eq!(tally.get("carol"), Some(&1));
        assert_eq!(c.status, ChallengeStatus::Unresolved);
    }

    #[test]
    fn test_manual_settlement() {
        let mut c = active_challenge();
        c.record_submission(submission("carol", false), t0())
            .unwrap();
        c.resolve(after_expiry()).unwrap();

        assert_eq!(
            c.settle("mallory", after_expiry()).unwrap_err(),
            ChallengeError::NotParticipant
        );

        let resolution = c.settle("carol", after_expiry()).unwrap();
        assert!(matches!(
            resolution,
            Resolution::Winner { ref winner_id, pot: 300, .. } if winner_id == "carol"
        ));
        assert_eq!(c.status, ChallengeStatus::Resolved);
    }

    #[test]
    fn test_error_status_mapping() {
        assert!(matches!(
            AppError::from(ChallengeError::AlreadyJoined),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(ChallengeError::InvalidWager(10)),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(ChallengeError::NotParticipant),
            AppError::Forbidden(_)
        ));
    }
}
