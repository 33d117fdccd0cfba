//! Fusion of per-frame signals into an attention score and the two status classifiers.

use std::fmt;
use anyhow::Error;
use serde::{Deserialize, Serialize};
use crate::config::config::{EyeConfig, ScoringConfig, SummaryConfig};
use crate::modules::emotion::Emotion;
use crate::modules::eye_state::{EyeAnalysis, GazeDirection};
use crate::modules::head_pose::HeadPose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttentionStatus {
    #[serde(rename = "Attentive")]
    Attentive,
    #[serde(rename = "Partially Attentive")]
    PartiallyAttentive,
    #[serde(rename = "Distracted")]
    Distracted,
    #[serde(rename = "Inattentive")]
    Inattentive,
    #[serde(rename = "Distracted (Eyes Closed)")]
    EyesClosed,
    #[serde(rename = "Drowsy / Fatigued")]
    Drowsy,
    #[serde(rename = "Inattentive (Looking Away)")]
    LookingAway,
    #[serde(rename = "Absent / Disengaged")]
    Absent,
    #[serde(rename = "Low Engagement")]
    LowEngagement,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl AttentionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttentionStatus::Attentive => "Attentive",
            AttentionStatus::PartiallyAttentive => "Partially Attentive",
            AttentionStatus::Distracted => "Distracted",
            AttentionStatus::Inattentive => "Inattentive",
            AttentionStatus::EyesClosed => "Distracted (Eyes Closed)",
            AttentionStatus::Drowsy => "Drowsy / Fatigued",
            AttentionStatus::LookingAway => "Inattentive (Looking Away)",
            AttentionStatus::Absent => "Absent / Disengaged",
            AttentionStatus::LowEngagement => "Low Engagement",
            AttentionStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for AttentionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current-frame measurements the scorer reads. `blink_rate` is the only windowed aggregate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSignals {
    pub face_detected: bool,
    pub eyes: EyeAnalysis,
    pub head_pose: HeadPose,
    pub blink_rate: f32,
    pub yawn_detected: bool,
    /// Label of the primary face, if one was classified.
    pub emotion: Option<Emotion>,
}

impl FrameSignals {
    fn ensure_finite(&self) -> Result<(), Error> {
        if !self.eyes.avg_ear.is_finite() || !self.head_pose.is_finite() || !self.blink_rate.is_finite() {
            return Err(Error::msg("frame signals contain non-finite values"))
        }
        Ok(())
    }
}

/// calculate_attention_score applies the additive rules to a baseline and clamps to [0, 100].
///
/// Rule order matters: the eyes-closed penalty floors the running score at 0 before the later
/// adjustments are added. Without a face the score is 0.
///
/// # Arguments
/// * `signals` - &FrameSignals
/// * `scoring` - baseline and excessive blink rate
/// * `eye` - `ear_threshold` is the open threshold of the eye rule
///
/// # Returns
/// * `Result<f32, Error>` - Err when a signal is not finite
pub fn calculate_attention_score(
    signals: &FrameSignals,
    scoring: &ScoringConfig,
    eye: &EyeConfig,
) -> Result<f32, Error> {
    signals.ensure_finite()?;
    if !signals.face_detected {
        return Ok(0.0)
    }

    let mut score = scoring.baseline + 20.0;

    let eyes = &signals.eyes;
    let open_threshold = eye.ear_threshold;
    if eyes.both_open() && eyes.avg_ear > open_threshold && eyes.eyes_detected >= 2 {
        score += 20.0;
    } else if eyes.any_open() && eyes.avg_ear > open_threshold * 0.8 {
        score += 5.0;
    } else {
        score = (score - 50.0).max(0.0);
    }

    match eyes.gaze {
        GazeDirection::Center => score += 15.0,
        GazeDirection::Left | GazeDirection::Right => score -= 10.0,
        GazeDirection::Unknown => {}
    }

    // The bands leave gaps (e.g. |yaw| in [20, 25]) that get no adjustment.
    let yaw = signals.head_pose.yaw.abs();
    let pitch = signals.head_pose.pitch;
    if yaw < 10.0 && pitch > -5.0 && pitch < 10.0 {
        score += 15.0;
    } else if yaw < 20.0 && pitch > -10.0 && pitch < 15.0 {
        score += 5.0;
    } else if yaw > 25.0 || pitch < -15.0 || pitch > 20.0 {
        score -= 20.0;
    }

    if signals.blink_rate > scoring.excessive_blink_rate {
        score -= 15.0;
    } else if signals.blink_rate > scoring.excessive_blink_rate * 0.7 {
        score -= 5.0;
    }

    if signals.yawn_detected {
        score -= 15.0;
    }

    score += match signals.emotion {
        Some(Emotion::Happy) => 10.0,
        Some(Emotion::Neutral) => 5.0,
        Some(Emotion::Sad) | Some(Emotion::Angry) => -5.0,
        Some(Emotion::Surprise) => 3.0,
        _ => 0.0,
    };

    Ok(score.clamp(0.0, 100.0))
}

/// determine_attention_status is the per-frame priority decision list; the first matching
/// rule wins.
///
/// # Returns
/// * `Result<AttentionStatus, Error>` - Err when the score or a signal is not finite
pub fn determine_attention_status(
    score: f32,
    signals: &FrameSignals,
    eye: &EyeConfig,
) -> Result<AttentionStatus, Error> {
    signals.ensure_finite()?;
    if !score.is_finite() {
        return Err(Error::msg("attention score is not finite"))
    }
    if !signals.face_detected {
        return Ok(AttentionStatus::Absent)
    }

    let eyes = &signals.eyes;
    if eyes.both_closed() || (eyes.eyes_detected < 2 && eyes.avg_ear < eye.ear_threshold) {
        return Ok(AttentionStatus::EyesClosed)
    }
    if signals.yawn_detected {
        return Ok(AttentionStatus::Drowsy)
    }
    if signals.head_pose.yaw.abs() > 30.0 || signals.head_pose.pitch < -20.0 {
        return Ok(AttentionStatus::LookingAway)
    }

    let mut score = score;
    if !eyes.both_open() && score > 30.0 {
        score = 25.0;
    }

    Ok(if score >= 75.0 {
        AttentionStatus::Attentive
    } else if score >= 50.0 {
        AttentionStatus::PartiallyAttentive
    } else if score >= 30.0 {
        AttentionStatus::Distracted
    } else {
        AttentionStatus::Inattentive
    })
}

/// determine_summary_status classifies the long-horizon summary.
///
/// # Arguments
/// * `summary_score` - windowed engagement score in [0, 100]
/// * `presence_rate` - face-detection rate over the presence lookback, `None` without samples
/// * `neutral_fraction` - share of Neutral labels over the neutral lookback, `None` without labels
/// * `config` - &SummaryConfig
///
/// # Returns
/// * `AttentionStatus`
pub fn determine_summary_status(
    summary_score: f32,
    presence_rate: Option<f32>,
    neutral_fraction: Option<f32>,
    config: &SummaryConfig,
) -> AttentionStatus {
    if !summary_score.is_finite() {
        return AttentionStatus::Unknown
    }
    if presence_rate.is_some_and(|rate| rate < config.absent_rate) {
        return AttentionStatus::Absent
    }
    if neutral_fraction.is_some_and(|fraction| fraction >= config.low_engagement_neutral_fraction) {
        return AttentionStatus::LowEngagement
    }

    if summary_score >= 80.0 {
        AttentionStatus::Attentive
    } else if summary_score >= 50.0 {
        AttentionStatus::PartiallyAttentive
    } else if summary_score >= 20.0 {
        AttentionStatus::Distracted
    } else {
        AttentionStatus::Inattentive
    }
}
