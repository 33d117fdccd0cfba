use serde::{Deserialize, Serialize};
use crate::config::config::AlertConfig;
use crate::pipeline::pipeline::AttentionSnapshot;
use crate::pipeline::scoring::AttentionStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowAttention,
    FaceAbsent,
    Distracted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertInput {
    pub attention_score: f32,
    pub status: AttentionStatus,
    pub face_detected: bool,
}

impl From<&AttentionSnapshot> for AlertInput {
    fn from(snapshot: &AttentionSnapshot) -> Self {
        AlertInput {
            attention_score: snapshot.attention_score,
            status: snapshot.status,
            face_detected: snapshot.face_detected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionAlert {
    pub kind: AlertKind,
    pub message: String,
    pub attention_score: f32,
}

/// Decides which alerts a snapshot raises. Statuses are matched by label so the configured set
/// can name any status, including the summary-only ones.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    config: AlertConfig,
}

impl AlertPolicy {
    pub fn new(config: AlertConfig) -> Self {
        AlertPolicy { config }
    }

    pub fn evaluate(&self, input: &AlertInput) -> Vec<AttentionAlert> {
        let mut alerts = Vec::new();
        if input.attention_score < self.config.low_score {
            alerts.push(AttentionAlert {
                kind: AlertKind::LowAttention,
                message: format!("Low attention score: {:.1}%", input.attention_score),
                attention_score: input.attention_score,
            });
        }
        if !input.face_detected {
            alerts.push(AttentionAlert {
                kind: AlertKind::FaceAbsent,
                message: "Student not visible in camera".to_string(),
                attention_score: input.attention_score,
            });
        }
        let label = input.status.as_str();
        if self.config.bad_statuses.iter().any(|s| s == label) {
            alerts.push(AttentionAlert {
                kind: AlertKind::Distracted,
                message: format!("Student appears {}", label),
                attention_score: input.attention_score,
            });
        }
        alerts
    }

    pub fn should_alert(&self, input: &AlertInput) -> bool {
        !self.evaluate(input).is_empty()
    }
}
