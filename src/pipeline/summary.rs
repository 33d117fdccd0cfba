use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::config::config::SummaryConfig;
use crate::modules::emotion::Emotion;
use crate::modules::eye_state::GazeDirection;
use crate::modules::head_pose::HeadPose;
use crate::modules::history::HistoryWindow;
use crate::pipeline::scoring::{determine_summary_status, AttentionStatus};

/// Eye state of one frame with a face, as kept by the summary windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeRecord {
    pub left_open: bool,
    pub right_open: bool,
    pub direction: GazeDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionSummary {
    pub current_attention_score: f32,
    pub current_status: AttentionStatus,
    pub face_detection_rate: f32,
    pub total_records: usize,
    pub emotion_distribution: BTreeMap<String, usize>,
    pub monitoring_duration_minutes: f32,
}

/// Long-horizon engagement over the last few hundred frames.
///
/// Every frame adds one record; frames without a face add no emotion, pose or gaze sample.
/// One frame counts as one second when converting to minutes.
#[derive(Debug, Clone)]
pub struct EngagementTracker {
    presence: HistoryWindow<bool>,
    emotions: HistoryWindow<Emotion>,
    head_poses: HistoryWindow<HeadPose>,
    records: HistoryWindow<Option<GazeRecord>>,
    config: SummaryConfig,
}

impl EngagementTracker {
    pub fn new(config: SummaryConfig) -> Self {
        EngagementTracker {
            presence: HistoryWindow::new(config.history_window),
            emotions: HistoryWindow::new(config.history_window),
            head_poses: HistoryWindow::new(config.head_pose_window),
            records: HistoryWindow::new(config.history_window),
            config,
        }
    }

    /// record appends one frame; the emotion, pose and gaze belong to the primary face.
    pub fn record(
        &mut self,
        face_detected: bool,
        emotion: Option<Emotion>,
        head_pose: Option<HeadPose>,
        gaze: Option<GazeRecord>,
    ) {
        self.presence.push(face_detected);
        if let Some(emotion) = emotion {
            self.emotions.push(emotion);
        }
        if let Some(pose) = head_pose {
            self.head_poses.push(pose);
        }
        self.records.push(gaze);
    }

    pub fn total_records(&self) -> usize {
        self.records.len()
    }

    fn presence_rate(&self, lookback: usize) -> Option<f32> {
        let recent = self.presence.recent(lookback);
        let total = recent.len();
        if total == 0 {
            return None
        }
        let present = recent.filter(|&&p| p).count();
        Some(present as f32 / total as f32)
    }

    fn neutral_fraction(&self) -> Option<f32> {
        let recent = self.emotions.recent(self.config.neutral_lookback);
        let total = recent.len();
        if total == 0 {
            return None
        }
        let neutral = recent.filter(|&&e| e == Emotion::Neutral).count();
        Some(neutral as f32 / total as f32)
    }

    /// attention_score fuses presence, head turns, eye state and emotion into [0, 100].
    /// An empty tracker scores 0.
    pub fn attention_score(&self) -> f32 {
        if self.records.is_empty() {
            return 0.0
        }
        let face_rate = self.presence_rate(self.config.presence_lookback).unwrap_or(0.0);

        let turn = self.config.head_turn_threshold;
        let head_score = self
            .head_poses
            .recent(self.config.pose_lookback)
            .fold(1.0f32, |mut score, pose| {
                if pose.yaw.abs() > turn {
                    score -= 0.2;
                }
                if pose.pitch.abs() > turn {
                    score -= 0.1;
                }
                score
            });

        let gaze_score = self
            .records
            .recent(self.config.gaze_lookback)
            .flatten()
            .fold(1.0f32, |mut score, gaze| {
                if !gaze.left_open || !gaze.right_open {
                    score -= 0.3;
                }
                if gaze.direction != GazeDirection::Center {
                    score -= 0.2;
                }
                score
            });

        let recent_emotions = self.emotions.recent(self.config.emotion_lookback);
        let count = recent_emotions.len();
        let emotion_score = if count == 0 {
            0.5
        } else {
            recent_emotions.map(|e| e.engagement_weight()).sum::<f32>() / count as f32
        };

        let score = (face_rate * 0.3
            + head_score.max(0.0) * 0.25
            + gaze_score.max(0.0) * 0.25
            + emotion_score * 0.2)
            * 100.0;
        score.clamp(0.0, 100.0)
    }

    pub fn status(&self) -> AttentionStatus {
        determine_summary_status(
            self.attention_score(),
            self.presence_rate(self.config.presence_lookback),
            self.neutral_fraction(),
            &self.config,
        )
    }

    pub fn summary(&self) -> AttentionSummary {
        let mut emotion_distribution = BTreeMap::new();
        for emotion in self.emotions.iter() {
            *emotion_distribution.entry(emotion.as_str().to_string()).or_insert(0) += 1;
        }
        let total_records = self.total_records();
        AttentionSummary {
            current_attention_score: self.attention_score(),
            current_status: self.status(),
            face_detection_rate: self.presence_rate(self.presence.capacity()).unwrap_or(0.0),
            total_records,
            emotion_distribution,
            monitoring_duration_minutes: total_records as f32 / 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::config::SummaryConfig;
    use crate::modules::emotion::Emotion;
    use crate::modules::eye_state::GazeDirection;
    use crate::modules::head_pose::HeadPose;
    use crate::pipeline::scoring::AttentionStatus;
    use crate::pipeline::summary::{EngagementTracker, GazeRecord};

    const CENTERED: GazeRecord = GazeRecord { left_open: true, right_open: true, direction: GazeDirection::Center };

    #[test]
    fn test_empty_tracker_scores_zero() {
        let tracker = EngagementTracker::new(SummaryConfig::default());
        assert_eq!(tracker.attention_score(), 0.0);
        let summary = tracker.summary();
        assert_eq!(summary.total_records, 0);
        assert_eq!(summary.face_detection_rate, 0.0);
        assert_eq!(summary.monitoring_duration_minutes, 0.0);
    }

    #[test]
    fn test_engaged_frames_score_full() {
        let mut tracker = EngagementTracker::new(SummaryConfig::default());
        for _ in 0..20 {
            tracker.record(true, Some(Emotion::Happy), Some(HeadPose::default()), Some(CENTERED));
        }
        assert!((tracker.attention_score() - 100.0).abs() < 1e-4);
        assert_eq!(tracker.status(), AttentionStatus::Attentive);
    }

    #[test]
    fn test_head_turns_and_closed_eyes_reduce_score() {
        let mut tracker = EngagementTracker::new(SummaryConfig::default());
        let turned = HeadPose { pitch: 35.0, yaw: 40.0, roll: 0.0 };
        let closed = GazeRecord { left_open: false, right_open: true, direction: GazeDirection::Left };
        for _ in 0..10 {
            tracker.record(true, Some(Emotion::Happy), Some(turned), Some(closed));
        }
        // both sub-scores bottom out at 0
        assert!((tracker.attention_score() - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_absent_face_is_absent() {
        let mut tracker = EngagementTracker::new(SummaryConfig::default());
        tracker.record(true, Some(Emotion::Happy), Some(HeadPose::default()), Some(CENTERED));
        for _ in 0..29 {
            tracker.record(false, None, None, None);
        }
        assert_eq!(tracker.status(), AttentionStatus::Absent);
        let summary = tracker.summary();
        assert_eq!(summary.total_records, 30);
        assert!((summary.face_detection_rate - 1.0 / 30.0).abs() < 1e-6);
        assert!((summary.monitoring_duration_minutes - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mostly_neutral_is_low_engagement() {
        let mut tracker = EngagementTracker::new(SummaryConfig::default());
        for i in 0..10 {
            let emotion = if i < 8 { Emotion::Neutral } else { Emotion::Happy };
            tracker.record(true, Some(emotion), Some(HeadPose::default()), Some(CENTERED));
        }
        assert_eq!(tracker.status(), AttentionStatus::LowEngagement);
        let summary = tracker.summary();
        assert_eq!(summary.emotion_distribution.get("Neutral"), Some(&8));
        assert_eq!(summary.emotion_distribution.get("Happy"), Some(&2));
    }

    #[test]
    fn test_windows_are_bounded() {
        let config = SummaryConfig { history_window: 5, head_pose_window: 3, ..SummaryConfig::default() };
        let mut tracker = EngagementTracker::new(config);
        for _ in 0..12 {
            tracker.record(true, Some(Emotion::Sad), Some(HeadPose::default()), Some(CENTERED));
        }
        assert_eq!(tracker.total_records(), 5);
        assert_eq!(tracker.summary().emotion_distribution.get("Sad"), Some(&5));
    }
}
