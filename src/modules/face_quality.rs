use anyhow::Error;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use crate::helper::face_helper::laplacian;
use crate::utils::utils::mean_and_std;

/// Diagnostic image quality of the face ROI. It is reported next to the attention score and
/// never feeds into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceQuality {
    pub score: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub sharpness: f32,
}

impl FaceQuality {
    /// Neutral reading reported when the measurement itself failed.
    pub fn unknown() -> Self {
        FaceQuality { score: 0.5, brightness: 0.5, contrast: 0.5, sharpness: 0.5 }
    }
}

const CONTRAST_STD_SCALE: f64 = 50.0;
const SHARPNESS_VAR_SCALE: f64 = 100.0;

/// calculate_face_quality scores brightness (peaked at mid-gray), contrast (std / 50) and
/// sharpness (Laplacian variance / 100), each capped at 1, combined 0.3 / 0.4 / 0.3.
/// An empty ROI scores zero.
pub fn calculate_face_quality(face_roi: ArrayView2<u8>) -> Result<FaceQuality, Error> {
    if face_roi.is_empty() {
        return Ok(FaceQuality::default())
    }

    let (mean, std) = mean_and_std(face_roi.iter().map(|&v| v as f64));
    let brightness = 1.0 - (mean - 128.0).abs() / 128.0;
    let contrast = (std / CONTRAST_STD_SCALE).min(1.0);

    let lap = laplacian(face_roi)?;
    let (_, lap_std) = mean_and_std(lap.iter().copied());
    let sharpness = (lap_std * lap_std / SHARPNESS_VAR_SCALE).min(1.0);

    let score = brightness * 0.3 + contrast * 0.4 + sharpness * 0.3;
    if !score.is_finite() {
        return Err(Error::msg("face quality is not finite"))
    }
    Ok(FaceQuality {
        score: score as f32,
        brightness: brightness as f32,
        contrast: contrast as f32,
        sharpness: sharpness as f32,
    })
}
