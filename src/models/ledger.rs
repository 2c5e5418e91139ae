// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! XP ledger, win/loss battle stats and leaderboard entries.
//!
//! XP is both a score (lifetime XP drives level and leaderboard rank) and a
//! spendable balance that wager challenges stake from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::{calendar_days_between, rfc3339_millis};

/// XP granted for any completed workout.
pub const WORKOUT_BASE_XP: u64 = 50;
/// Workout minutes beyond this cap earn no extra XP.
pub const WORKOUT_MINUTES_XP_CAP: u32 = 60;
const XP_PER_LEVEL: u64 = 1000;

/// XP awarded for a workout of the given length.
pub fn workout_xp(duration_minutes: u32) -> u64 {
    WORKOUT_BASE_XP + u64::from(duration_minutes.min(WORKOUT_MINUTES_XP_CAP))
}

/// Streak value after a workout at `now`.
///
/// Same UTC day keeps the streak, the next day extends it, and a missed day
/// (or no previous workout) restarts it at 1.
pub fn next_streak(last_workout: Option<DateTime<Utc>>, current: u32, now: DateTime<Utc>) -> u32 {
    let Some(last) = last_workout else {
        return 1;
    };

    match calendar_days_between(last, now) {
        // Clock skew: a workout dated before the previous one counts as same-day.
        d if d <= 0 => current.max(1),
        1 => current.saturating_add(1),
        _ => 1,
    }
}

/// Per-user XP document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpRecord {
    pub user_id: String,
    /// Spendable XP (wager stakes are debited from here)
    #[serde(default)]
    pub xp_balance: u64,
    /// XP ever earned; never decreases
    #[serde(default)]
    pub lifetime_xp: u64,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(default)]
    pub workouts_completed: u32,
    #[serde(default, with = "rfc3339_millis::option")]
    pub last_workout_at: Option<DateTime<Utc>>,
    #[serde(with = "rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
}

/// Outcome of recording a workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkoutAward {
    pub xp_awarded: u64,
    pub current_streak: u32,
    pub streak_extended: bool,
}

impl XpRecord {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            xp_balance: 0,
            lifetime_xp: 0,
            current_streak: 0,
            longest_streak: 0,
            workouts_completed: 0,
            last_workout_at: None,
            updated_at: now,
        }
    }

    pub fn level(&self) -> u32 {
        u32::try_from(self.lifetime_xp / XP_PER_LEVEL + 1).unwrap_or(u32::MAX)
    }

    /// Award workout XP and advance the streak.
    pub fn record_workout(&mut self, duration_minutes: u32, now: DateTime<Utc>) -> WorkoutAward {
        let xp = workout_xp(duration_minutes);
        let previous = self.current_streak;

        self.current_streak = next_streak(self.last_workout_at, self.current_streak, now);
        self.longest_streak = self.longest_streak.max(self.current_streak);
        self.last_workout_at = Some(now);
        self.workouts_completed = self.workouts_completed.saturating_add(1);
        self.credit(xp, xp, now);

        WorkoutAward {
            xp_awarded: xp,
            current_streak: self.current_streak,
            streak_extended: self.current_streak > previous,
        }
    }

    /// Add XP to the balance, counting `earned` towards lifetime XP.
    pub fn credit(&mut self, amount: u64, earned: u64, now: DateTime<Utc>) {
        self.xp_balance = self.xp_balance.saturating_add(amount);
        self.lifetime_xp = self.lifetime_xp.saturating_add(earned);
        self.updated_at = now;
    }

    /// Remove XP from the balance. Returns `false` (and changes nothing) when
    /// the balance is too small.
    pub fn debit(&mut self, amount: u64, now: DateTime<Utc>) -> bool {
        if self.xp_balance < amount {
            return false;
        }
        self.xp_balance -= amount;
        self.updated_at = now;
        true
    }
}

/// Wager challenge win/loss record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleStats {
    pub user_id: String,
    #[serde(default)]
    pub wins: u32,
    #[serde(default)]
    pub losses: u32,
    #[serde(default)]
    pub current_win_streak: u32,
    #[serde(default)]
    pub best_win_streak: u32,
    #[serde(default)]
    pub current_loss_streak: u32,
    #[serde(default)]
    pub xp_won: u64,
    #[serde(default)]
    pub xp_lost: u64,
    #[serde(with = "rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
}

impl BattleStats {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            wins: 0,
            losses: 0,
            current_win_streak: 0,
            best_win_streak: 0,
            current_loss_streak: 0,
            xp_won: 0,
            xp_lost: 0,
            updated_at: now,
        }
    }

    pub fn record_win(&mut self, net_xp: u64, now: DateTime<Utc>) {
        self.wins += 1;
        self.current_win_streak += 1;
        self.best_win_streak = self.best_win_streak.max(self.current_win_streak);
        self.current_loss_streak = 0;
        self.xp_won = self.xp_won.saturating_add(net_xp);
        self.updated_at = now;
    }

    pub fn record_loss(&mut self, stake: u64, now: DateTime<Utc>) {
        self.losses += 1;
        self.current_loss_streak += 1;
        self.current_win_streak = 0;
        self.xp_lost = self.xp_lost.saturating_add(stake);
        self.updated_at = now;
    }
}

/// Denormalized leaderboard row, rewritten whenever lifetime XP changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub gym_id: Option<String>,
    pub lifetime_xp: u64,
    pub level: u32,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(with = "rfc3339_millis")]
    pub updated_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    pub fn from_record(user: &crate::models::User, xp: &XpRecord) -> Self {
        Self {
            user_id: user.user_id.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            gym_id: user.gym_id.clone(),
            lifetime_xp: xp.lifetime_xp,
            level: xp.level(),
            current_streak: xp.current_streak,
            updated_at: xp.updated_at,
        }
    }
}
