// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Exercise form analysis.
//!
//! Pose estimation itself is an external service behind the [`PoseEstimator`]
//! trait. This module only classifies the keypoints it returns, using a fixed
//! rule table per exercise.
//!
//! Coordinates are normalized with `y` growing downward, so "a above b" means
//! `a.y < b.y`.

use crate::models::{Exercise, FormReport, PoseFrame, Verdict};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Keypoints below this confidence are ignored.
pub const MIN_KEYPOINT_SCORE: f32 = 0.3;
/// Share of evaluable frames that must satisfy every rule for a pass.
pub const PASS_RATIO: f32 = 0.7;
/// Below this share the set fails outright; in between it is flagged.
pub const FLAG_RATIO: f32 = 0.4;
/// Maximum vertical distance between shoulder and hip for a straight plank.
pub const PLANK_TOLERANCE: f32 = 0.15;

const POSE_HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("pose service not configured")]
    NotConfigured,
    #[error("pose service request failed: {0}")]
    Request(String),
    #[error("pose service returned status {0}")]
    Status(u16),
}

/// Source of per-frame keypoints for a video.
pub trait PoseEstimator: Send + Sync {
    fn estimate<'a>(&'a self, video_url: &'a str) -> BoxFuture<'a, Result<Vec<PoseFrame>, PoseError>>;
}

/// Estimator backed by an HTTP pose service (`POST {base}/v1/pose`).
pub struct HttpPoseEstimator {
    http_client: reqwest::Client,
    endpoint: String,
}

#[derive(Serialize)]
struct PoseRequest<'a> {
    video_url: &'a str,
}

#[derive(Deserialize)]
struct PoseResponse {
    frames: Vec<PoseFrame>,
}

impl HttpPoseEstimator {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(POSE_HTTP_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/v1/pose", base_url.trim_end_matches('/')),
        })
    }
}

impl PoseEstimator for HttpPoseEstimator {
    fn estimate<'a>(&'a self, video_url: &'a str) -> BoxFuture<'a, Result<Vec<PoseFrame>, PoseError>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(&self.endpoint)
                .json(&PoseRequest { video_url })
                .send()
                .await
                .map_err(|e| PoseError::Request(e.to_string()))?;

            if !response.status().is_success() {
                return Err(PoseError::Status(response.status().as_u16()));
            }

            let body: PoseResponse = response
                .json()
                .await
                .map_err(|e| PoseError::Request(e.to_string()))?;
            Ok(body.frames)
        })
    }
}

/// Estimator used when no pose service is configured.
pub struct UnavailablePoseEstimator;

impl PoseEstimator for UnavailablePoseEstimator {
    fn estimate<'a>(&'a self, _video_url: &'a str) -> BoxFuture<'a, Result<Vec<PoseFrame>, PoseError>> {
        Box::pin(async { Err(PoseError::NotConfigured) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joint {
    Shoulder,
    Hip,
    Knee,
    Ankle,
    Wrist,
}

impl Joint {
    fn name(self) -> &'static str {
        match self {
            Joint::Shoulder => "shoulder",
            Joint::Hip => "hip",
            Joint::Knee => "knee",
            Joint::Ankle => "ankle",
            Joint::Wrist => "wrist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    /// First joint strictly above the second.
    Above(Joint, Joint),
    /// First joint not lower than the second.
    NotBelow(Joint, Joint),
    /// Vertical distance within the tolerance.
    Level(Joint, Joint, f32),
}

impl Rule {
    fn joints(self) -> [Joint; 2] {
        match self {
            Rule::Above(a, b) | Rule::NotBelow(a, b) | Rule::Level(a, b, _) => [a, b],
        }
    }

    fn holds(self, frame: &FrameJoints) -> Option<bool> {
        let [a, b] = self.joints();
        let (ya, yb) = (frame.y(a)?, frame.y(b)?);
        Some(match self {
            Rule::Above(..) => ya < yb,
            Rule::NotBelow(..) => ya <= yb,
            Rule::Level(.., tolerance) => (ya - yb).abs() <= tolerance,
        })
    }
}

/// Rule table for an exercise.
pub fn rules_for(exercise: Exercise) -> &'static [Rule] {
    use Joint::*;

    match exercise {
        Exercise::Squat => &[
            Rule::Above(Shoulder, Hip),
            Rule::Above(Hip, Ankle),
            Rule::NotBelow(Knee, Ankle),
        ],
        Exercise::PushUp => &[
            Rule::Level(Shoulder, Hip, PLANK_TOLERANCE),
            Rule::Above(Shoulder, Wrist),
        ],
        Exercise::Deadlift => &[Rule::Above(Shoulder, Hip), Rule::Above(Hip, Knee)],
    }
}

/// Confident joint heights for one frame, left/right averaged.
struct FrameJoints<'a> {
    frame: &'a PoseFrame,
}

impl FrameJoints<'_> {
    fn y(&self, joint: Joint) -> Option<f32> {
        let name = joint.name();
        let (sum, count) = self
            .frame
            .keypoints
            .iter()
            .filter(|kp| kp.score >= MIN_KEYPOINT_SCORE)
            .filter(|kp| {
                kp.name == name
                    || kp
                        .name
                        .strip_prefix("left_")
                        .or_else(|| kp.name.strip_prefix("right_"))
                        == Some(name)
            })
            .fold((0.0_f32, 0_u32), |(sum, count), kp| (sum + kp.y, count + 1));

        (count > 0).then(|| sum / count as f32)
    }
}

/// Map a valid-frame ratio to a verdict.
pub fn verdict_for_ratio(frames_evaluated: u32, valid_ratio: f32) -> Verdict {
    if frames_evaluated == 0 {
        Verdict::Flagged
    } else if valid_ratio >= PASS_RATIO {
        Verdict::Pass
    } else if valid_ratio >= FLAG_RATIO {
        Verdict::Flagged
    } else {
        Verdict::Fail
    }
}

/// Classify a sequence of frames for an exercise.
///
/// A frame is evaluated only when every joint its rules reference is
/// present; it is valid when every rule holds.
pub fn evaluate_frames(exercise: Exercise, frames: &[PoseFrame]) -> FormReport {
    let rules = rules_for(exercise);
    let mut evaluated = 0_u32;
    let mut valid = 0_u32;

    for frame in frames {
        let joints = FrameJoints { frame };
        let outcomes: Option<Vec<bool>> = rules.iter().map(|rule| rule.holds(&joints)).collect();
        let Some(outcomes) = outcomes else {
            continue;
        };

        evaluated += 1;
        if outcomes.into_iter().all(|ok| ok) {
            valid += 1;
        }
    }

    let valid_ratio = if evaluated == 0 {
        0.0
    } else {
        valid as f32 / evaluated as f32
    };

    FormReport {
        verdict: verdict_for_ratio(evaluated, valid_ratio),
        frames_total: u32::try_from(frames.len()).unwrap_or(u32::MAX),
        frames_evaluated: evaluated,
        frames_valid: valid,
        valid_ratio,
    }
}

/// Runs a pose estimator and classifies its output.
#[derive(Clone)]
pub struct FormAnalyzer {
    estimator: Arc<dyn PoseEstimator>,
}

impl FormAnalyzer {
    pub fn new(estimator: Arc<dyn PoseEstimator>) -> Self {
        Self { estimator }
    }

    /// Build from the optional pose service URL.
    pub fn from_service_url(url: Option<&str>) -> anyhow::Result<Self> {
        let estimator: Arc<dyn PoseEstimator> = match url {
            Some(url) => Arc::new(HttpPoseEstimator::new(url)?),
            None => {
                tracing::warn!("POSE_SERVICE_URL not set; form analysis will flag every video");
                Arc::new(UnavailablePoseEstimator)
            }
        };
        Ok(Self::new(estimator))
    }

    /// Analyze a video. Estimation failures yield a flagged report so the
    /// result goes to manual review instead of failing the caller.
    pub async fn analyze(&self, exercise: Exercise, video_url: &str) -> FormReport {
        match self.estimator.estimate(video_url).await {
            Ok(frames) => {
                let report = evaluate_frames(exercise, &frames);
                tracing::info!(
                    exercise = exercise.as_str(),
                    verdict = ?report.verdict,
                    frames = report.frames_total,
                    evaluated = report.frames_evaluated,
                    ratio = report.valid_ratio,
                    "Form analysis complete"
                );
                report
            }
            Err(e) => {
                tracing::warn!(exercise = exercise.as_str(), error = %e, "Form analysis unavailable");
                FormReport::unavailable()
            }
        }
    }
}
