use std::fmt;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::config::config::AudioConfig;
use crate::modules::history::HistoryWindow;

/// Full-scale magnitude of signed 16-bit PCM.
const PCM16_FULL_SCALE: f32 = 32768.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceStatus {
    #[serde(rename = "Speaking")]
    Speaking,
    #[serde(rename = "Noisy Environment")]
    NoisyEnvironment,
    #[serde(rename = "Silent")]
    Silent,
    #[serde(rename = "Background Noise")]
    BackgroundNoise,
}

impl VoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceStatus::Speaking => "Speaking",
            VoiceStatus::NoisyEnvironment => "Noisy Environment",
            VoiceStatus::Silent => "Silent",
            VoiceStatus::BackgroundNoise => "Background Noise",
        }
    }
}

impl fmt::Display for VoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one processed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioReading {
    pub voice_active: bool,
    pub noise_level: f32,
    pub combined_level: f32,
    pub is_noisy: bool,
    pub voice_status: VoiceStatus,
}

/// Streaming voice-activity and noise-level tracker.
///
/// The level window and the two run counters carry over between chunks; a session owns one
/// processor and feeds it chunks in arrival order.
#[derive(Debug, Clone)]
pub struct AudioProcessor {
    level_history: HistoryWindow<f32>,
    voice_frames: u32,
    silence_frames: u32,
    config: AudioConfig,
}

impl AudioProcessor {
    pub fn new(config: AudioConfig) -> Self {
        AudioProcessor {
            level_history: HistoryWindow::new(config.level_window),
            voice_frames: 0,
            silence_frames: 0,
            config,
        }
    }

    /// process_audio_chunk measures one chunk of samples.
    ///
    /// Samples already in [-1, 1] are used as-is; anything outside that range is taken to be
    /// 16-bit PCM and divided by 32768. An empty chunk reads as silence and leaves the state
    /// untouched.
    ///
    /// # Returns
    /// * `(voice_active, noise_level, combined_level)`
    pub fn process_audio_chunk(&mut self, samples: &[f32]) -> (bool, f32, f32) {
        if samples.is_empty() {
            return (false, 0.0, 0.0)
        }
        let finite = samples.iter().all(|s| s.is_finite());
        if !finite {
            debug!("dropping audio chunk with non-finite samples");
            return (false, 0.0, 0.0)
        }

        let needs_scaling = samples.iter().any(|&s| !(-1.0..=1.0).contains(&s));
        let scale = if needs_scaling { PCM16_FULL_SCALE } else { 1.0 };

        let (sum_sq, peak) = samples.iter().fold((0.0f64, 0.0f32), |(acc, peak), &s| {
            let v = s / scale;
            (acc + (v as f64) * (v as f64), peak.max(v.abs()))
        });
        let rms = (sum_sq / samples.len() as f64).sqrt() as f32;
        let combined_level = rms * self.config.rms_weight + peak * self.config.peak_weight;

        self.level_history.push(combined_level);
        let average = self.level_history.iter().sum::<f32>() / self.level_history.len().max(1) as f32;
        let noise_level = (average * self.config.noise_gain).min(1.0);

        let mut voice_active = false;
        if combined_level > self.config.voice_threshold {
            self.voice_frames += 1;
            self.silence_frames = 0;
            voice_active = self.voice_frames >= self.config.voice_confirm_chunks;
        } else {
            self.silence_frames += 1;
            if self.silence_frames >= self.config.silence_reset_chunks {
                self.voice_frames = 0;
            }
        }

        debug!(rms, peak, combined_level, noise_level, voice_active, "audio chunk");
        (voice_active, noise_level, combined_level)
    }

    /// process_chunk is `process_audio_chunk` plus the derived flags.
    pub fn process_chunk(&mut self, samples: &[f32]) -> AudioReading {
        let (voice_active, noise_level, combined_level) = self.process_audio_chunk(samples);
        AudioReading {
            voice_active,
            noise_level,
            combined_level,
            is_noisy: self.is_noisy_environment(noise_level),
            voice_status: self.get_voice_activity_status(voice_active, noise_level),
        }
    }

    pub fn is_noisy_environment(&self, noise_level: f32) -> bool {
        noise_level > self.config.noise_threshold
    }

    pub fn get_voice_activity_status(&self, voice_active: bool, noise_level: f32) -> VoiceStatus {
        if voice_active {
            VoiceStatus::Speaking
        } else if noise_level > self.config.noise_threshold {
            VoiceStatus::NoisyEnvironment
        } else if noise_level < self.config.silence_threshold {
            VoiceStatus::Silent
        } else {
            VoiceStatus::BackgroundNoise
        }
    }

    pub fn voice_frames(&self) -> u32 {
        self.voice_frames
    }

    pub fn silence_frames(&self) -> u32 {
        self.silence_frames
    }
}

#[cfg(test)]
mod tests {
    use crate::config::config::AudioConfig;
    use crate::modules::audio::{AudioProcessor, VoiceStatus};

    const LOUD: [f32; 4] = [0.5, -0.5, 0.5, -0.5];
    const QUIET: [f32; 4] = [0.001, -0.001, 0.001, -0.001];

    #[test]
    fn test_voice_needs_two_loud_chunks() {
        let mut processor = AudioProcessor::new(AudioConfig::default());
        let (active, _, level) = processor.process_audio_chunk(&LOUD);
        assert!(!active);
        assert!((level - 0.5).abs() < 1e-6);
        let (active, _, _) = processor.process_audio_chunk(&LOUD);
        assert!(active);
    }

    #[test]
    fn test_quiet_chunk_is_never_active() {
        let mut processor = AudioProcessor::new(AudioConfig::default());
        processor.process_audio_chunk(&LOUD);
        processor.process_audio_chunk(&LOUD);
        let (active, _, _) = processor.process_audio_chunk(&QUIET);
        assert!(!active);
        assert_eq!(processor.voice_frames(), 2);
    }

    #[test]
    fn test_five_silent_chunks_reset_the_run() {
        let mut processor = AudioProcessor::new(AudioConfig::default());
        processor.process_audio_chunk(&LOUD);
        for _ in 0..4 {
            processor.process_audio_chunk(&QUIET);
        }
        assert_eq!(processor.voice_frames(), 1);
        // one loud chunk still completes the confirmation
        let mut resumed = processor.clone();
        assert!(resumed.process_audio_chunk(&LOUD).0);

        processor.process_audio_chunk(&QUIET);
        assert_eq!(processor.voice_frames(), 0);
        assert!(!processor.process_audio_chunk(&LOUD).0);
    }

    #[test]
    fn test_pcm16_scale_is_normalized() {
        let mut processor = AudioProcessor::new(AudioConfig::default());
        let (_, _, level) = processor.process_audio_chunk(&[16384.0, -16384.0]);
        assert!((level - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_empty_chunk_reads_silent() {
        let mut processor = AudioProcessor::new(AudioConfig::default());
        assert_eq!(processor.process_audio_chunk(&[]), (false, 0.0, 0.0));
        assert_eq!(processor.silence_frames(), 0);
    }

    #[test]
    fn test_noise_level_and_status() {
        let mut processor = AudioProcessor::new(AudioConfig::default());
        let reading = processor.process_chunk(&QUIET);
        assert!((reading.noise_level - 0.02).abs() < 1e-6);
        assert_eq!(reading.voice_status, VoiceStatus::BackgroundNoise);
        assert!(!reading.is_noisy);

        let reading = processor.process_chunk(&LOUD);
        assert!((reading.noise_level - 1.0).abs() < 1e-6);
        assert!(reading.is_noisy);
        assert_eq!(reading.voice_status, VoiceStatus::NoisyEnvironment);

        let reading = processor.process_chunk(&LOUD);
        assert_eq!(reading.voice_status, VoiceStatus::Speaking);

        let silent = AudioProcessor::new(AudioConfig::default());
        assert_eq!(silent.get_voice_activity_status(false, 0.001), VoiceStatus::Silent);
        assert_eq!(VoiceStatus::NoisyEnvironment.to_string(), "Noisy Environment");
    }
}
