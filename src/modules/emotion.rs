//! Heuristic facial-expression labelling from intensity statistics of a normalized face crop.
//!
//! This is not a trained classifier. The features are band means, contrast, edge density and
//! mirror symmetry of a 48x48 equalized crop, and each label has a gated linear score.

use std::fmt;
use anyhow::Error;
use ndarray::{s, ArrayView2};
use serde::{Deserialize, Serialize};
use crate::helper::face_helper::{canny_edges, equalize_histogram, resize_bilinear};
use crate::utils::coordinate::BoundingBox;
use crate::utils::utils::mean_and_std;

const FACE_SIZE: usize = 48;
const EDGE_LOW: f32 = 30.0;
const EDGE_HIGH: f32 = 150.0;
const MIN_TOP_SCORE: f64 = 0.18;
const MIN_SCORE_GAP: f64 = 0.05;
const FALLBACK_CONFIDENCE: f32 = 0.65;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    #[default]
    Neutral,
    Unknown,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Angry => "Angry",
            Emotion::Disgust => "Disgust",
            Emotion::Fear => "Fear",
            Emotion::Happy => "Happy",
            Emotion::Sad => "Sad",
            Emotion::Surprise => "Surprise",
            Emotion::Neutral => "Neutral",
            Emotion::Unknown => "Unknown",
        }
    }

    /// engagement_weight is how much this expression counts towards engagement.
    pub fn engagement_weight(&self) -> f32 {
        match self {
            Emotion::Happy => 1.0,
            Emotion::Surprise => 0.8,
            Emotion::Neutral => 0.5,
            Emotion::Sad => 0.2,
            Emotion::Angry | Emotion::Fear | Emotion::Disgust => 0.1,
            Emotion::Unknown => 0.5,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One labelled face of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionRecord {
    pub emotion: Emotion,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Copy)]
struct FaceFeatures {
    normalized_std: f64,
    normalized_edge: f64,
    symmetry: f64,
    mouth_curvature: f64,
    eye_diff: f64,
    forehead_diff: f64,
}

impl FaceFeatures {
    fn extract(face: ArrayView2<u8>) -> Result<FaceFeatures, Error> {
        let band_mean = |rows: std::ops::Range<usize>| -> f64 {
            let band = face.slice(s![rows, ..]);
            band.iter().map(|&v| v as f64).sum::<f64>() / band.len() as f64
        };

        let (mean, std_dev) = mean_and_std(face.iter().map(|&v| v as f64));
        let eye_mean = band_mean(10..24);
        let mouth_mean = band_mean(30..42);
        let forehead_mean = band_mean(0..10);

        let half = FACE_SIZE / 2;
        let left = face.slice(s![.., ..half]);
        let right = face.slice(s![.., half..;-1]);
        let mirror_diff = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| (l as f64 - r as f64).abs())
            .sum::<f64>()
            / left.len() as f64;

        Ok(FaceFeatures {
            normalized_std: (std_dev / 50.0).min(1.0),
            normalized_edge: (edge_density(face)? * 10.0).min(1.0),
            symmetry: 1.0 - mirror_diff / 255.0,
            mouth_curvature: (mouth_mean - mean) / 255.0,
            eye_diff: (eye_mean - mean) / 255.0,
            forehead_diff: (forehead_mean - mean) / 255.0,
        })
    }

    /// Gated scores in tie-break order: the first of equal scores wins.
    fn scores(&self) -> [(Emotion, f64); 7] {
        let FaceFeatures { normalized_std: contrast, normalized_edge: edge, symmetry: sym, .. } = *self;
        let mouth = self.mouth_curvature;
        let eyebrow_tension = self.forehead_diff.abs();
        let eye_aperture = self.eye_diff.abs();
        let gated = |cond: bool, score: f64| if cond { score.max(0.0) } else { 0.0 };

        [
            (Emotion::Happy, gated(
                mouth > 0.1 && edge > 0.12 && sym > 0.45 && eye_aperture < 0.1,
                mouth * 3.0 + edge * 0.8 + sym * 0.4,
            )),
            (Emotion::Sad, gated(
                mouth < -0.06 && (self.eye_diff < 0.0 || eyebrow_tension > 0.05),
                mouth.abs() * 2.0 + (1.0 - sym) * 0.5 + eye_aperture * 0.6,
            )),
            (Emotion::Surprise, gated(
                contrast > 0.28 && eye_aperture > 0.08 && mouth > -0.05,
                contrast + eye_aperture * 0.8 + edge * 0.4,
            )),
            (Emotion::Neutral, gated(
                mouth.abs() < 0.05 && contrast < 0.22 && sym > 0.4,
                sym * 0.8 + (1.0 - contrast * 2.0) * 0.4 + (1.0 - mouth.abs() * 5.0) * 0.3,
            )),
            (Emotion::Angry, gated(
                self.forehead_diff < -0.06 && mouth < 0.0 && sym < 0.7,
                (1.0 - sym) * 0.8 + eyebrow_tension * 0.6 + mouth.abs() * 0.4,
            )),
            (Emotion::Fear, gated(
                contrast > 0.22 && eye_aperture > 0.06 && mouth < -0.03,
                contrast * 0.6 + eye_aperture * 0.5 + mouth.abs() * 0.3,
            )),
            (Emotion::Disgust, gated(
                mouth < -0.04 && self.forehead_diff < -0.03 && sym < 0.75,
                (1.0 - sym) * 0.6 + mouth.abs() * 0.5 + eyebrow_tension * 0.3,
            )),
        ]
    }
}

/// edge_density is the fraction of pixels on a Canny edge.
fn edge_density(img: ArrayView2<u8>) -> Result<f64, Error> {
    if img.is_empty() {
        return Ok(0.0)
    }
    let edges = canny_edges(img, EDGE_LOW, EDGE_HIGH)?;
    let on_edge = edges.iter().filter(|&&v| v > 0).count();
    Ok(on_edge as f64 / edges.len() as f64)
}

/// classify_emotion labels one grayscale face crop.
///
/// # Arguments
/// * `face_roi` - grayscale face region of any size
///
/// # Returns
/// * `Result<(Emotion, f32), Error>` - label and confidence in [0.5, 0.9]; an empty crop is
///   `Unknown` with confidence 0, and ambiguous faces fall back to `Neutral` at 0.65
pub fn classify_emotion(face_roi: ArrayView2<u8>) -> Result<(Emotion, f32), Error> {
    if face_roi.is_empty() {
        return Ok((Emotion::Unknown, 0.0))
    }
    let resized = resize_bilinear(face_roi, FACE_SIZE, FACE_SIZE)?;
    let face = equalize_histogram(resized.view())?;

    let features = FaceFeatures::extract(face.view())?;
    let scores = features.scores();

    let (mut best, mut second) = ((Emotion::Neutral, f64::MIN), f64::MIN);
    for &(emotion, score) in scores.iter() {
        if score > best.1 {
            second = best.1;
            best = (emotion, score);
        } else if score > second {
            second = score;
        }
    }
    if !best.1.is_finite() {
        return Err(Error::msg("emotion scores are not finite"))
    }

    let gap = best.1 - second;
    if best.1 < MIN_TOP_SCORE || gap < MIN_SCORE_GAP {
        return Ok((Emotion::Neutral, FALLBACK_CONFIDENCE))
    }
    let confidence = (0.5 + (gap * 2.0).min(0.5)).clamp(0.5, 0.9);
    Ok((best.0, confidence as f32))
}

/// engagement_score is the confidence-weighted mean engagement weight of the records, 0 when
/// there are none or every confidence is 0.
pub fn engagement_score(records: &[EmotionRecord]) -> f32 {
    let (weighted, total_confidence) = records.iter().fold((0.0f32, 0.0f32), |(w, c), r| {
        (w + r.emotion.engagement_weight() * r.confidence, c + r.confidence)
    });
    if total_confidence > 0.0 {
        weighted / total_confidence
    } else {
        0.0
    }
}
