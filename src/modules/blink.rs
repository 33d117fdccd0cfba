use crate::config::config::BlinkConfig;
use crate::modules::history::HistoryWindow;

/// Falling-edge blink detector over the average-EAR stream.
#[derive(Debug, Clone)]
pub struct BlinkDetector {
    ear_history: HistoryWindow<f32>,
    blink_history: HistoryWindow<bool>,
    config: BlinkConfig,
}

impl BlinkDetector {
    pub fn new(config: BlinkConfig) -> Self {
        BlinkDetector {
            ear_history: HistoryWindow::new(config.ear_window),
            blink_history: HistoryWindow::new(config.blink_window),
            config,
        }
    }

    /// update records one EAR sample and reports whether it completes a blink.
    ///
    /// A blink fires when the newest `consecutive_frames` samples are all below the closed
    /// threshold and the sample right before them was above it, so at least
    /// `consecutive_frames + 1` samples must be buffered.
    pub fn update(&mut self, avg_ear: f32) -> bool {
        self.ear_history.push(avg_ear);

        let n = self.config.consecutive_frames;
        let threshold = self.config.closed_threshold;
        let closed_run = self.ear_history.len() > n
            && self.ear_history.recent(n).all(|&ear| ear < threshold);
        let opened_before = self
            .ear_history
            .nth_back(n)
            .map(|&ear| ear > threshold)
            .unwrap_or(false);

        let blink = closed_run && opened_before;
        self.blink_history.push(blink);
        blink
    }

    /// blink_rate is blinks in the newest `blink_window` flags divided by `assumed_fps`,
    /// i.e. blinks per second under the assumed arrival rate.
    pub fn blink_rate(&self) -> f32 {
        if self.blink_history.len() < self.config.min_samples {
            return 0.0
        }
        let blinks = self
            .blink_history
            .recent(self.config.blink_window)
            .filter(|&&b| b)
            .count();
        blinks as f32 / self.config.assumed_fps
    }

    pub fn ear_history(&self) -> &HistoryWindow<f32> {
        &self.ear_history
    }
}
