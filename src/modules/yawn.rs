use anyhow::Error;
use crate::config::config::YawnConfig;
use crate::modules::history::HistoryWindow;

#[derive(Debug, Clone)]
pub struct YawnDetector {
    mouth_history: HistoryWindow<f32>,
    config: YawnConfig,
}

impl YawnDetector {
    pub fn new(config: YawnConfig) -> Self {
        YawnDetector {
            mouth_history: HistoryWindow::new(config.window),
            config,
        }
    }

    /// mouth_aspect_ratio is the height of the mouth band (the face below `mouth_start_ratio`)
    /// over the face width.
    pub fn mouth_aspect_ratio(&self, face_width: usize, face_height: usize) -> Result<f32, Error> {
        if face_width == 0 || face_height == 0 {
            return Err(Error::msg("face region is empty"))
        }
        let mouth_top = (face_height as f32 * self.config.mouth_start_ratio) as usize;
        let mouth_height = face_height - mouth_top.min(face_height);
        if mouth_height == 0 {
            return Err(Error::msg("mouth region is empty"))
        }
        Ok(mouth_height as f32 / face_width as f32)
    }

    /// observe_face measures the face region and feeds the MAR into the window.
    ///
    /// # Returns
    /// * `Result<(bool, f32), Error>` - (yawn, current MAR); the window is untouched on error
    pub fn observe_face(&mut self, face_width: usize, face_height: usize) -> Result<(bool, f32), Error> {
        let mar = self.mouth_aspect_ratio(face_width, face_height)?;
        Ok((self.update(mar), mar))
    }

    /// update pushes one MAR sample; a yawn needs every one of the newest
    /// `consecutive_frames` samples above the threshold.
    pub fn update(&mut self, mar: f32) -> bool {
        self.mouth_history.push(mar);
        let n = self.config.consecutive_frames;
        self.mouth_history.len() >= n
            && self
                .mouth_history
                .recent(n)
                .all(|&m| m > self.config.mar_threshold)
    }
}
