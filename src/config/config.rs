use std::path::Path;
use anyhow::Error;
use serde::{Deserialize, Serialize};

/// One cascade parameter preset; `min_size` is `(width, height)` in pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size: (i32, i32),
}

impl DetectionParams {
    pub fn new(scale_factor: f64, min_neighbors: i32, min_size: (i32, i32)) -> Self {
        DetectionParams { scale_factor, min_neighbors, min_size }
    }
}

/// Eye preset whose minimum size is a fraction of the face ROI `(width, height)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EyeDetectionParams {
    pub scale_factor: f64,
    pub min_neighbors: i32,
    pub min_size_ratio: (f32, f32),
}

impl EyeDetectionParams {
    pub fn resolve(&self, face_width: i32, face_height: i32) -> DetectionParams {
        DetectionParams {
            scale_factor: self.scale_factor,
            min_neighbors: self.min_neighbors,
            min_size: (
                (face_width as f32 * self.min_size_ratio.0) as i32,
                (face_height as f32 * self.min_size_ratio.1) as i32,
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocatorConfig {
    /// Tried in order for every face detector; the first preset with a hit wins.
    pub face_presets: Vec<DetectionParams>,
    pub eye_strict: EyeDetectionParams,
    pub eye_lenient: EyeDetectionParams,
    /// Frames whose longer side is below this are upscaled x2 before face detection.
    pub upscale_below: usize,
    pub padding_ratio: f32,
    pub equalize: bool,
    pub blur: bool,
}

impl LocatorConfig {
    pub(crate) fn new() -> Self {
        LocatorConfig {
            face_presets: vec![
                DetectionParams::new(1.05, 3, (30, 30)),
                DetectionParams::new(1.1, 4, (40, 40)),
                DetectionParams::new(1.2, 5, (50, 50)),
            ],
            eye_strict: EyeDetectionParams {
                scale_factor: 1.1,
                min_neighbors: 3,
                min_size_ratio: (0.15, 0.12),
            },
            eye_lenient: EyeDetectionParams {
                scale_factor: 1.05,
                min_neighbors: 2,
                min_size_ratio: (0.1, 0.08),
            },
            upscale_below: 500,
            padding_ratio: 0.1,
            equalize: true,
            blur: true,
        }
    }
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EyeConfig {
    /// Below this the eye is treated as closed; also gates the open-eye score bonus.
    pub ear_threshold: f32,
    /// Multiplier on `ear_threshold` giving the open threshold of the bounding-box heuristic.
    pub bbox_open_scale: f32,
    /// Open threshold for six-point landmark geometry.
    pub landmark_open_threshold: f32,
    /// Any located eye below this forces both eyes closed.
    pub very_low_ear: f32,
    pub default_ear: f32,
    pub closed_ear: f32,
    pub max_ear: f32,
    pub gaze_center_threshold: f32,
}

impl EyeConfig {
    pub(crate) fn new() -> Self {
        EyeConfig {
            ear_threshold: 0.25,
            bbox_open_scale: 1.2,
            landmark_open_threshold: 0.30,
            very_low_ear: 0.15,
            default_ear: 0.3,
            closed_ear: 0.15,
            max_ear: 0.4,
            gaze_center_threshold: 0.3,
        }
    }

    pub fn bbox_open_threshold(&self) -> f32 {
        self.ear_threshold * self.bbox_open_scale
    }
}

impl Default for EyeConfig {
    fn default() -> Self {
        EyeConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BlinkConfig {
    pub ear_window: usize,
    pub blink_window: usize,
    /// EAR strictly below this counts as a closed sample.
    pub closed_threshold: f32,
    /// Number of trailing closed samples that, preceded by an open one, form a blink.
    pub consecutive_frames: usize,
    /// Below this many blink flags the rate reads as 0.
    pub min_samples: usize,
    /// Samples per second the rate assumes; the frame rate is not measured.
    pub assumed_fps: f32,
}

impl BlinkConfig {
    pub(crate) fn new() -> Self {
        BlinkConfig {
            ear_window: 30,
            blink_window: 30,
            closed_threshold: 0.25,
            consecutive_frames: 3,
            min_samples: 10,
            assumed_fps: 30.0,
        }
    }
}

impl Default for BlinkConfig {
    fn default() -> Self {
        BlinkConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct YawnConfig {
    pub window: usize,
    pub mar_threshold: f32,
    pub consecutive_frames: usize,
    /// The mouth band starts at this fraction of the face height.
    pub mouth_start_ratio: f32,
}

impl YawnConfig {
    pub(crate) fn new() -> Self {
        YawnConfig {
            window: 30,
            mar_threshold: 0.6,
            consecutive_frames: 10,
            mouth_start_ratio: 0.6,
        }
    }
}

impl Default for YawnConfig {
    fn default() -> Self {
        YawnConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HeadPoseConfig {
    pub yaw_scale_degrees: f32,
    pub pitch_scale_degrees: f32,
}

impl HeadPoseConfig {
    pub(crate) fn new() -> Self {
        HeadPoseConfig {
            yaw_scale_degrees: 45.0,
            pitch_scale_degrees: 30.0,
        }
    }
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        HeadPoseConfig::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierVariant {
    /// Priority decision list over the current frame.
    #[default]
    PerFrame,
    /// Long-horizon presence and engagement rules.
    Summary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub baseline: f32,
    pub excessive_blink_rate: f32,
    pub variant: ClassifierVariant,
}

impl ScoringConfig {
    pub(crate) fn new() -> Self {
        ScoringConfig {
            baseline: 50.0,
            excessive_blink_rate: 0.5,
            variant: ClassifierVariant::PerFrame,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        ScoringConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SummaryConfig {
    pub history_window: usize,
    pub head_pose_window: usize,
    pub presence_lookback: usize,
    pub pose_lookback: usize,
    pub gaze_lookback: usize,
    pub emotion_lookback: usize,
    pub neutral_lookback: usize,
    pub head_turn_threshold: f32,
    pub absent_rate: f32,
    pub low_engagement_neutral_fraction: f32,
}

impl SummaryConfig {
    pub(crate) fn new() -> Self {
        SummaryConfig {
            history_window: 300,
            head_pose_window: 60,
            presence_lookback: 30,
            pose_lookback: 10,
            gaze_lookback: 10,
            emotion_lookback: 30,
            neutral_lookback: 300,
            head_turn_threshold: 30.0,
            absent_rate: 0.1,
            low_engagement_neutral_fraction: 0.8,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        SummaryConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub silence_threshold: f32,
    pub noise_threshold: f32,
    pub voice_threshold: f32,
    pub voice_confirm_chunks: u32,
    pub silence_reset_chunks: u32,
    pub level_window: usize,
    pub noise_gain: f32,
    pub rms_weight: f32,
    pub peak_weight: f32,
}

impl AudioConfig {
    pub(crate) fn new() -> Self {
        AudioConfig {
            silence_threshold: 0.005,
            noise_threshold: 0.08,
            voice_threshold: 0.015,
            voice_confirm_chunks: 2,
            silence_reset_chunks: 5,
            level_window: 30,
            noise_gain: 20.0,
            rms_weight: 0.7,
            peak_weight: 0.3,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub low_score: f32,
    pub bad_statuses: Vec<String>,
}

impl AlertConfig {
    pub(crate) fn new() -> Self {
        AlertConfig {
            low_score: 30.0,
            bad_statuses: vec![
                "Distracted".to_string(),
                "Inattentive".to_string(),
                "Absent / Disengaged".to_string(),
                "Low Engagement".to_string(),
            ],
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        AlertConfig::new()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub locator: LocatorConfig,
    pub eye: EyeConfig,
    pub blink: BlinkConfig,
    pub yawn: YawnConfig,
    pub head_pose: HeadPoseConfig,
    pub scoring: ScoringConfig,
    pub summary: SummaryConfig,
    pub audio: AudioConfig,
    pub alert: AlertConfig,
}

impl PipelineConfig {

    /// from_json_str parses a (possibly partial) JSON document; missing keys keep their defaults.
    pub fn from_json_str(s: &str) -> Result<PipelineConfig, Error> {
        let config: PipelineConfig = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        PipelineConfig::from_json_str(&raw)
    }

    /// validate rejects windows that could never satisfy the detectors reading them.
    pub fn validate(&self) -> Result<(), Error> {
        if self.locator.face_presets.is_empty() {
            return Err(Error::msg("locator.face_presets must not be empty"))
        }
        if self.blink.ear_window <= self.blink.consecutive_frames {
            return Err(Error::msg("blink.ear_window must hold more than blink.consecutive_frames samples"))
        }
        if self.blink.blink_window == 0 || self.blink.assumed_fps <= 0.0 {
            return Err(Error::msg("blink.blink_window and blink.assumed_fps must be positive"))
        }
        if self.yawn.window < self.yawn.consecutive_frames || self.yawn.consecutive_frames == 0 {
            return Err(Error::msg("yawn.window must hold at least yawn.consecutive_frames samples"))
        }
        if self.audio.level_window == 0 {
            return Err(Error::msg("audio.level_window must be positive"))
        }
        if self.summary.history_window == 0 || self.summary.head_pose_window == 0 {
            return Err(Error::msg("summary windows must be positive"))
        }
        Ok(())
    }
}
