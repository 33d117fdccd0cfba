//! Webcam attention inference: face and eye location, eyelid, mouth and head-pose
//! measurements, fused with short sliding windows into a per-frame attention score and
//! status, plus a streaming voice-activity detector for the session's audio.

pub mod utils;
pub mod pipeline;
pub mod config;
pub mod helper;
pub mod modules;

pub use config::config::PipelineConfig;
pub use modules::audio::{AudioProcessor, AudioReading};
pub use modules::face_locator::CascadeDetector;
#[cfg(feature = "opencv")]
pub use modules::face_locator::HaarCascade;
pub use pipeline::alert::{AlertInput, AlertPolicy, AttentionAlert};
pub use pipeline::pipeline::{AttentionPipeline, AttentionSnapshot, FrameAnalysis};
pub use pipeline::scoring::AttentionStatus;
pub use pipeline::session::SessionRegistry;
pub use utils::image::Frame;
