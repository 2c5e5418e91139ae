// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise form-check types: exercises, pose keypoints and verdicts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exercise {
    Squat,
    PushUp,
    Deadlift,
}

impl Exercise {
    pub fn as_str(self) -> &'static str {
        match self {
            Exercise::Squat => "squat",
            Exercise::PushUp => "push_up",
            Exercise::Deadlift => "deadlift",
        }
    }
}

/// Coarse classification of a recorded set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    Fail,
    /// Not enough signal to decide; needs a human look
    Flagged,
}

/// A single detected body keypoint. Coordinates are normalized to the frame
/// (0..1) with `y` growing downward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keypoint {
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// Keypoints detected in one sampled video frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoseFrame {
    pub keypoints: Vec<Keypoint>,
}

/// Result of running the rule table over a video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormReport {
    pub verdict: Verdict,
    pub frames_total: u32,
    pub frames_evaluated: u32,
    pub frames_valid: u32,
    /// `frames_valid / frames_evaluated`, 0 when nothing was evaluated
    pub valid_ratio: f32,
}

impl FormReport {
    /// Report used when the video could not be analyzed at all.
    pub fn unavailable() -> Self {
        Self {
            verdict: Verdict::Flagged,
            frames_total: 0,
            frames_evaluated: 0,
            frames_valid: 0,
            valid_ratio: 0.0,
        }
    }
}
