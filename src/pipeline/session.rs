use std::collections::HashMap;
use std::sync::Arc;
use anyhow::Error;
use tokio::sync::Mutex;
use tracing::info;
use crate::config::config::PipelineConfig;
use crate::modules::audio::{AudioProcessor, AudioReading};
use crate::modules::face_locator::CascadeDetector;
use crate::pipeline::pipeline::{AttentionPipeline, FrameAnalysis};
use crate::pipeline::summary::AttentionSummary;
use crate::utils::image::Frame;
use crate::utils::utils::pcm16_le_to_samples;

/// Face detectors (tried in order) and the eye detector for one new session.
pub type Detectors = (Vec<Box<dyn CascadeDetector>>, Box<dyn CascadeDetector>);

/// Builds the detectors of a new session. Cascades keep internal buffers, so every session
/// gets its own set.
pub type DetectorFactory = Arc<dyn Fn() -> Result<Detectors, Error> + Send + Sync>;

struct Session {
    pipeline: AttentionPipeline,
    audio: AudioProcessor,
}

/// One pipeline and one audio processor per session id.
///
/// Calls for the same session queue on that session's lock and run in arrival order; calls for
/// different sessions run concurrently. Frame analysis runs on the blocking thread pool.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
    factory: DetectorFactory,
    config: PipelineConfig,
}

impl SessionRegistry {
    pub fn new(factory: DetectorFactory, config: PipelineConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
            factory,
            config,
        })
    }

    /// session returns the session for `session_id`, creating it on first use. Detectors are
    /// built on the blocking pool without holding the registry lock, so a slow cascade load
    /// only delays its own session.
    async fn session(&self, session_id: &str) -> Result<Arc<Mutex<Session>>, Error> {
        if let Some(session) = self.sessions.lock().await.get(session_id) {
            return Ok(session.clone())
        }

        let factory = self.factory.clone();
        let config = self.config.clone();
        let created = tokio::task::spawn_blocking(move || -> Result<Session, Error> {
            let (face_detectors, eye_detector) = factory()?;
            let audio = AudioProcessor::new(config.audio.clone());
            Ok(Session {
                pipeline: AttentionPipeline::new(face_detectors, eye_detector, config)?,
                audio,
            })
        })
        .await??;

        // a concurrent call may have created the session meanwhile; the first one wins
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                info!(session_id, "started attention session");
                Arc::new(Mutex::new(created))
            })
            .clone();
        Ok(session)
    }

    /// process_frame analyzes one frame of a session, creating the session on first use.
    ///
    /// # Arguments
    /// * `session_id` - &str
    /// * `frame` - Frame
    ///
    /// # Returns
    /// * `Result<FrameAnalysis, Error>` - Err only when the session cannot be created or the
    ///   worker thread panicked
    pub async fn process_frame(&self, session_id: &str, frame: Frame) -> Result<FrameAnalysis, Error> {
        let session = self.session(session_id).await?;
        let mut guard = session.lock_owned().await;
        let analysis = tokio::task::spawn_blocking(move || guard.pipeline.process_frame(&frame)).await?;
        Ok(analysis)
    }

    pub async fn process_audio(&self, session_id: &str, samples: &[f32]) -> Result<AudioReading, Error> {
        let session = self.session(session_id).await?;
        let mut guard = session.lock().await;
        Ok(guard.audio.process_chunk(samples))
    }

    /// process_audio_pcm16 decodes a little-endian 16-bit PCM payload and processes it.
    pub async fn process_audio_pcm16(&self, session_id: &str, payload: &[u8]) -> Result<AudioReading, Error> {
        let samples = pcm16_le_to_samples(payload);
        self.process_audio(session_id, &samples).await
    }

    /// summary returns `None` for unknown sessions.
    pub async fn summary(&self, session_id: &str) -> Option<AttentionSummary> {
        let session = self.sessions.lock().await.get(session_id).cloned()?;
        let guard = session.lock().await;
        Some(guard.pipeline.summary())
    }

    /// remove drops a session with all of its history.
    pub async fn remove(&self, session_id: &str) -> bool {
        let removed = self.sessions.lock().await.remove(session_id).is_some();
        if removed {
            info!(session_id, "ended attention session");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
