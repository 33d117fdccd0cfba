use anyhow::Error;
use ndarray::{Array3, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use crate::config::config::{ClassifierVariant, PipelineConfig};
use crate::helper::face_helper::{crop_roi, get_largest_face};
use crate::modules::blink::BlinkDetector;
use crate::modules::emotion::{classify_emotion, engagement_score, Emotion, EmotionRecord};
use crate::modules::eye_state::{analyze_eyes, apply_landmarks, EyeAnalysis, GazeDirection};
use crate::modules::face_locator::{CascadeDetector, EyeLocator, FaceLocator};
use crate::modules::face_quality::{calculate_face_quality, FaceQuality};
use crate::modules::head_pose::{HeadPose, HeadPoseEstimator};
use crate::modules::yawn::YawnDetector;
use crate::pipeline::scoring::{calculate_attention_score, determine_attention_status, AttentionStatus, FrameSignals};
use crate::pipeline::summary::{AttentionSummary, EngagementTracker, GazeRecord};
use crate::utils::coordinate::Coordinate2D;
use crate::utils::image::{draw_rectangles, Frame};

const FACE_BOX_COLOR: [u8; 3] = [255, 0, 0];
const FACE_BOX_THICKNESS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeGaze {
    pub direction: GazeDirection,
    pub left_open: bool,
    pub right_open: bool,
    pub left_ear: f32,
    pub right_ear: f32,
}

impl From<&EyeAnalysis> for EyeGaze {
    fn from(eyes: &EyeAnalysis) -> Self {
        EyeGaze {
            direction: eyes.gaze,
            left_open: eyes.left.is_open,
            right_open: eyes.right.is_open,
            left_ear: eyes.left.aspect_ratio,
            right_ear: eyes.right.aspect_ratio,
        }
    }
}

/// Attention reading of one frame, shaped for persistence and broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionSnapshot {
    pub face_detected: bool,
    pub attention_score: f32,
    pub status: AttentionStatus,
    pub head_pose: HeadPose,
    pub eye_gaze: EyeGaze,
    pub blink_rate: f32,
    pub blink_detected: bool,
    pub yawn_detected: bool,
    pub yawn_intensity: f32,
    pub face_quality: FaceQuality,
}

impl AttentionSnapshot {
    /// The reading for a frame without a usable face.
    pub fn absent() -> Self {
        AttentionSnapshot {
            face_detected: false,
            attention_score: 0.0,
            status: AttentionStatus::Absent,
            head_pose: HeadPose::default(),
            eye_gaze: EyeGaze {
                direction: GazeDirection::Unknown,
                left_open: false,
                right_open: false,
                left_ear: 0.0,
                right_ear: 0.0,
            },
            blink_rate: 0.0,
            blink_detected: false,
            yawn_detected: false,
            yawn_intensity: 0.0,
            face_quality: FaceQuality::default(),
        }
    }
}

/// Six-point contours of both eyes in face-ROI coordinates, from an external landmark model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeLandmarks {
    pub left: [Coordinate2D; 6],
    pub right: [Coordinate2D; 6],
}

#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub snapshot: AttentionSnapshot,
    pub emotions: Vec<EmotionRecord>,
    /// Confidence-weighted engagement of all labelled faces, 0 without faces.
    pub engagement: f32,
    /// Copy of the input with every detected face outlined.
    pub annotated: Array3<u8>,
}

/// Per-session attention pipeline. It owns every history window, so one instance must see
/// the frames of one session in order.
pub struct AttentionPipeline {
    face_locator: FaceLocator,
    eye_locator: EyeLocator,
    blink: BlinkDetector,
    yawn: YawnDetector,
    head_pose: HeadPoseEstimator,
    tracker: EngagementTracker,
    config: PipelineConfig,
}

impl AttentionPipeline {

    /// new initializes a pipeline with its own history windows.
    ///
    /// # Arguments
    /// * `face_detectors` - face cascades, tried in order
    /// * `eye_detector` - eye cascade run inside the primary face
    /// * `config` - PipelineConfig
    ///
    /// # Returns
    /// * `Result<AttentionPipeline, Error>`
    pub fn new(
        face_detectors: Vec<Box<dyn CascadeDetector>>,
        eye_detector: Box<dyn CascadeDetector>,
        config: PipelineConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        if face_detectors.is_empty() {
            return Err(Error::msg("at least one face detector is required"))
        }
        Ok(AttentionPipeline {
            eye_locator: EyeLocator::new(eye_detector, &config.locator),
            face_locator: FaceLocator::new(face_detectors, config.locator.clone()),
            blink: BlinkDetector::new(config.blink.clone()),
            yawn: YawnDetector::new(config.yawn.clone()),
            head_pose: HeadPoseEstimator::new(config.head_pose.clone()),
            tracker: EngagementTracker::new(config.summary.clone()),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// process_frame runs every stage on one frame. Stage failures fall back to that stage's
    /// default and never abort the frame.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameAnalysis {
        self.analyze(frame, None)
    }

    /// process_frame_with_landmarks is `process_frame` with eye openness taken from landmark
    /// contours of the primary face instead of eye-box proportions.
    pub fn process_frame_with_landmarks(&mut self, frame: &Frame, landmarks: &EyeLandmarks) -> FrameAnalysis {
        self.analyze(frame, Some(landmarks))
    }

    /// process_bgr validates a raw BGR array first; a malformed one yields the absent reading.
    pub fn process_bgr(&mut self, color: Array3<u8>) -> FrameAnalysis {
        match Frame::from_bgr(color.clone()) {
            Ok(frame) => self.process_frame(&frame),
            Err(e) => {
                warn!(error = %e, "rejecting malformed frame");
                FrameAnalysis {
                    snapshot: AttentionSnapshot::absent(),
                    emotions: vec![],
                    engagement: 0.0,
                    annotated: color,
                }
            }
        }
    }

    /// summary reports the long-horizon engagement of the frames seen so far.
    pub fn summary(&self) -> AttentionSummary {
        self.tracker.summary()
    }

    fn analyze(&mut self, frame: &Frame, landmarks: Option<&EyeLandmarks>) -> FrameAnalysis {
        let gray = frame.gray();
        let (h, w) = gray.dim();
        let prepared = self.face_locator.preprocess(gray);
        let faces = self.face_locator.locate_faces(prepared.view());

        let mut annotated = frame.color().clone();
        if let Err(e) = draw_rectangles(&mut annotated, &faces, FACE_BOX_COLOR, FACE_BOX_THICKNESS) {
            warn!(error = %e, "face annotation failed");
        }
        let emotions: Vec<EmotionRecord> = faces
            .iter()
            .map(|bbox| {
                let (emotion, confidence) = match classify_emotion(crop_roi(prepared.view(), bbox)) {
                    Ok(label) => label,
                    Err(e) => {
                        warn!(error = %e, "emotion classification failed");
                        (Emotion::Neutral, 0.5)
                    }
                };
                EmotionRecord { emotion, confidence, bbox: *bbox }
            })
            .collect();

        let primary = get_largest_face(&faces, h as i32, w as i32);
        let snapshot = match primary {
            Some((bbox, index)) => {
                let face_roi = crop_roi(gray, &bbox);
                if face_roi.is_empty() {
                    self.tracker.record(false, None, None, None);
                    AttentionSnapshot::absent()
                } else {
                    self.analyze_face(face_roi, emotions[index].emotion, landmarks)
                }
            }
            None => {
                self.tracker.record(false, None, None, None);
                AttentionSnapshot::absent()
            }
        };

        debug!(
            faces = faces.len(),
            score = snapshot.attention_score,
            status = %snapshot.status,
            "processed frame"
        );
        let engagement = engagement_score(&emotions);
        FrameAnalysis { snapshot, emotions, engagement, annotated }
    }

    fn analyze_face(
        &mut self,
        face_roi: ArrayView2<u8>,
        emotion: Emotion,
        landmarks: Option<&EyeLandmarks>,
    ) -> AttentionSnapshot {
        let (face_h, face_w) = face_roi.dim();
        let eye_config = &self.config.eye;

        let mut eyes = match self.eye_locator.locate_eyes(face_roi) {
            Ok(found) => analyze_eyes(&found, face_w as i32, eye_config),
            Err(e) => {
                warn!(error = %e, "eye detection failed, assuming closed eyes");
                EyeAnalysis::closed_default(eye_config)
            }
        };
        if let Some(points) = landmarks {
            eyes = apply_landmarks(&eyes, &points.left, &points.right, eye_config);
        }

        let blink_detected = self.blink.update(eyes.avg_ear);
        let blink_rate = self.blink.blink_rate();

        let (yawn_detected, yawn_intensity) = match self.yawn.observe_face(face_w, face_h) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "yawn measurement failed");
                (false, 0.0)
            }
        };

        let head_pose = match self.head_pose.estimate(
            eyes.left.bbox.as_ref(),
            eyes.right.bbox.as_ref(),
            face_w as i32,
            face_h as i32,
        ) {
            Ok(pose) => pose,
            Err(e) => {
                warn!(error = %e, "head pose estimation failed");
                HeadPose::default()
            }
        };

        let face_quality = calculate_face_quality(face_roi).unwrap_or_else(|e| {
            warn!(error = %e, "face quality measurement failed");
            FaceQuality::unknown()
        });

        let signals = FrameSignals {
            face_detected: true,
            eyes,
            head_pose,
            blink_rate,
            yawn_detected,
            emotion: Some(emotion),
        };
        let (mut attention_score, mut status) = self.score(&signals);

        self.tracker.record(
            true,
            Some(emotion),
            Some(head_pose),
            Some(GazeRecord {
                left_open: eyes.left.is_open,
                right_open: eyes.right.is_open,
                direction: eyes.gaze,
            }),
        );
        if self.config.scoring.variant == ClassifierVariant::Summary {
            attention_score = self.tracker.attention_score();
            status = self.tracker.status();
        }

        debug!(
            avg_ear = eyes.avg_ear,
            eyes = eyes.eyes_detected,
            yaw = head_pose.yaw,
            pitch = head_pose.pitch,
            blink_detected,
            yawn_detected,
            "face measurements"
        );

        AttentionSnapshot {
            face_detected: true,
            attention_score,
            status,
            head_pose,
            eye_gaze: EyeGaze::from(&eyes),
            blink_rate,
            blink_detected,
            yawn_detected,
            yawn_intensity,
            face_quality,
        }
    }

    fn score(&self, signals: &FrameSignals) -> (f32, AttentionStatus) {
        let score = calculate_attention_score(signals, &self.config.scoring, &self.config.eye)
            .and_then(|score| {
                determine_attention_status(score, signals, &self.config.eye).map(|status| (score, status))
            });
        match score {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "attention scoring failed");
                (50.0, AttentionStatus::Unknown)
            }
        }
    }
}
