//! Eye openness and gaze from eye bounding boxes, with an optional six-point landmark path.
//!
//! The box heuristic and the landmark geometry measure EAR on the same nominal scale but use
//! different open thresholds (`ear_threshold * bbox_open_scale` against
//! `landmark_open_threshold`). Both are kept as configured; neither is derived from the other.

use serde::{Deserialize, Serialize};
use crate::config::config::EyeConfig;
use crate::utils::coordinate::{BoundingBox, Coordinate2D};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GazeDirection {
    Center,
    Left,
    Right,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeObservation {
    pub bbox: Option<BoundingBox>,
    pub aspect_ratio: f32,
    pub is_open: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EyeAnalysis {
    pub left: EyeObservation,
    pub right: EyeObservation,
    pub avg_ear: f32,
    pub gaze: GazeDirection,
    pub eyes_detected: usize,
}

impl EyeAnalysis {
    /// Both eyes closed with a low EAR; used whenever eye analysis could not run.
    pub fn closed_default(config: &EyeConfig) -> Self {
        let closed = EyeObservation {
            bbox: None,
            aspect_ratio: config.closed_ear,
            is_open: false,
        };
        EyeAnalysis {
            left: closed,
            right: closed,
            avg_ear: config.closed_ear,
            gaze: GazeDirection::Unknown,
            eyes_detected: 0,
        }
    }

    pub fn both_open(&self) -> bool {
        self.left.is_open && self.right.is_open
    }

    pub fn both_closed(&self) -> bool {
        !self.left.is_open && !self.right.is_open
    }

    pub fn any_open(&self) -> bool {
        self.left.is_open || self.right.is_open
    }
}

/// calculate_ear approximates eyelid openness from an eye box: `min(h / 2w, max_ear)`.
///
/// Degenerate boxes read as `default_ear`. The result always lies in `[0, max_ear]`.
pub fn calculate_ear(bbox: &BoundingBox, config: &EyeConfig) -> f32 {
    let ear = if bbox.width > 0 && bbox.height > 0 {
        bbox.height as f32 / (bbox.width as f32 * 2.0)
    } else {
        config.default_ear
    };
    ear.clamp(0.0, config.max_ear)
}

/// landmark_ear computes `(|p1-p5| + |p2-p4|) / (2 |p0-p3|)` over a six-point eye contour
/// (p0/p3 corners, p1/p2 upper lid, p5/p4 lower lid).
pub fn landmark_ear(points: &[Coordinate2D; 6], config: &EyeConfig) -> f32 {
    let vertical_1 = points[1].distance(&points[5]);
    let vertical_2 = points[2].distance(&points[4]);
    let horizontal = points[0].distance(&points[3]);
    if horizontal == 0.0 || !horizontal.is_finite() {
        return config.default_ear.clamp(0.0, config.max_ear)
    }
    let ear = (vertical_1 + vertical_2) / (2.0 * horizontal);
    if !ear.is_finite() {
        return config.default_ear.clamp(0.0, config.max_ear)
    }
    ear.clamp(0.0, config.max_ear)
}

/// analyze_eyes assigns located eyes to left/right, measures their EAR and estimates gaze.
///
/// # Arguments
/// * `eyes` - eye boxes relative to the face ROI
/// * `face_width` - width of the face ROI; decides the side of a lone eye and the gaze offset
/// * `config` - &EyeConfig
///
/// # Returns
/// * `EyeAnalysis`
pub fn analyze_eyes(eyes: &[BoundingBox], face_width: i32, config: &EyeConfig) -> EyeAnalysis {
    let mut left = EyeObservation { bbox: None, aspect_ratio: config.default_ear, is_open: false };
    let mut right = left;

    if eyes.len() >= 2 {
        let mut sorted = eyes.to_vec();
        sorted.sort_by_key(|e| e.x);
        left.bbox = Some(sorted[0]);
        right.bbox = Some(sorted[1]);
        left.aspect_ratio = calculate_ear(&sorted[0], config);
        right.aspect_ratio = calculate_ear(&sorted[1], config);
    } else if let Some(eye) = eyes.first() {
        let target = if (eye.x as f32) < face_width as f32 / 2.0 { &mut left } else { &mut right };
        target.bbox = Some(*eye);
        target.aspect_ratio = calculate_ear(eye, config);
    }

    let open_threshold = config.bbox_open_threshold();
    left.is_open = left.aspect_ratio > open_threshold;
    right.is_open = right.aspect_ratio > open_threshold;

    if !eyes.is_empty() && (left.aspect_ratio < config.very_low_ear || right.aspect_ratio < config.very_low_ear) {
        left.is_open = false;
        right.is_open = false;
    }

    let mut avg_ear = if eyes.len() >= 2 {
        (left.aspect_ratio + right.aspect_ratio) / 2.0
    } else {
        left.aspect_ratio.max(right.aspect_ratio)
    };

    if eyes.is_empty() {
        left.is_open = false;
        right.is_open = false;
        avg_ear = config.closed_ear;
    }

    let gaze = match (left.bbox, right.bbox) {
        (Some(l), Some(r)) => estimate_gaze(&l, &r, face_width, config),
        _ => GazeDirection::Center,
    };

    EyeAnalysis {
        left,
        right,
        avg_ear,
        gaze,
        eyes_detected: eyes.len(),
    }
}

/// apply_landmarks replaces box-derived EAR and openness with six-point landmark geometry.
/// Boxes and gaze are kept; a landmark model locating both contours counts as two eyes found.
pub fn apply_landmarks(
    analysis: &EyeAnalysis,
    left_points: &[Coordinate2D; 6],
    right_points: &[Coordinate2D; 6],
    config: &EyeConfig,
) -> EyeAnalysis {
    let mut out = *analysis;
    out.left.aspect_ratio = landmark_ear(left_points, config);
    out.right.aspect_ratio = landmark_ear(right_points, config);
    out.left.is_open = out.left.aspect_ratio > config.landmark_open_threshold;
    out.right.is_open = out.right.aspect_ratio > config.landmark_open_threshold;
    out.avg_ear = (out.left.aspect_ratio + out.right.aspect_ratio) / 2.0;
    out.eyes_detected = out.eyes_detected.max(2);
    out
}

fn estimate_gaze(left: &BoundingBox, right: &BoundingBox, face_width: i32, config: &EyeConfig) -> GazeDirection {
    if face_width <= 0 {
        return GazeDirection::Unknown
    }
    let (left_center_x, _) = left.center();
    let (right_center_x, _) = right.center();
    let eye_center_x = (left_center_x + right_center_x) as f32 / 2.0;
    let face_center_x = face_width as f32 / 2.0;
    let offset_ratio = (eye_center_x - face_center_x) / face_center_x;

    if offset_ratio > config.gaze_center_threshold {
        GazeDirection::Right
    } else if offset_ratio < -config.gaze_center_threshold {
        GazeDirection::Left
    } else {
        GazeDirection::Center
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use crate::config::config::EyeConfig;
    use crate::modules::eye_state::{analyze_eyes, apply_landmarks, calculate_ear, landmark_ear, EyeAnalysis, GazeDirection};
    use crate::utils::coordinate::{BoundingBox, Coordinate2D};

    fn eye_contour(width: f32, height: f32) -> [Coordinate2D; 6] {
        [
            Coordinate2D::new(0.0, 0.0),
            Coordinate2D::new(width / 3.0, -height / 2.0),
            Coordinate2D::new(2.0 * width / 3.0, -height / 2.0),
            Coordinate2D::new(width, 0.0),
            Coordinate2D::new(2.0 * width / 3.0, height / 2.0),
            Coordinate2D::new(width / 3.0, height / 2.0),
        ]
    }

    #[test]
    fn test_two_open_eyes() {
        let config = EyeConfig::default();
        let eyes = vec![BoundingBox::new(60, 30, 20, 14), BoundingBox::new(20, 30, 20, 14)];
        let analysis = analyze_eyes(&eyes, 100, &config);

        assert_eq!(analysis.left.bbox, Some(eyes[1]));
        assert_eq!(analysis.right.bbox, Some(eyes[0]));
        assert!((analysis.left.aspect_ratio - 0.35).abs() < 1e-6);
        assert!(analysis.both_open());
        assert!((analysis.avg_ear - 0.35).abs() < 1e-6);
        assert_eq!(analysis.gaze, GazeDirection::Center);
        assert_eq!(analysis.eyes_detected, 2);
    }

    #[test]
    fn test_single_eye_assigned_by_half_width() {
        let config = EyeConfig::default();
        let right_only = analyze_eyes(&[BoundingBox::new(60, 30, 20, 14)], 100, &config);
        assert!(right_only.left.bbox.is_none());
        assert!(right_only.right.is_open);
        assert!(!right_only.left.is_open);
        assert!((right_only.avg_ear - 0.35).abs() < 1e-6);

        let left_only = analyze_eyes(&[BoundingBox::new(10, 30, 20, 14)], 100, &config);
        assert!(left_only.left.is_open);
        assert!(left_only.right.bbox.is_none());
    }

    #[test]
    fn test_no_eyes_means_closed() {
        let config = EyeConfig::default();
        let analysis = analyze_eyes(&[], 100, &config);
        assert!(analysis.both_closed());
        assert_eq!(analysis.avg_ear, 0.15);
        assert_eq!(analysis.eyes_detected, 0);
    }

    #[test]
    fn test_very_low_ear_closes_both() {
        let config = EyeConfig::default();
        let eyes = vec![BoundingBox::new(20, 30, 20, 14), BoundingBox::new(60, 30, 20, 4)];
        let analysis = analyze_eyes(&eyes, 100, &config);
        assert!(analysis.both_closed());
    }

    #[test]
    fn test_gaze_offset() {
        let config = EyeConfig::default();
        let eyes = vec![BoundingBox::new(70, 30, 10, 8), BoundingBox::new(85, 30, 10, 8)];
        assert_eq!(analyze_eyes(&eyes, 100, &config).gaze, GazeDirection::Right);
        let eyes = vec![BoundingBox::new(0, 30, 10, 8), BoundingBox::new(15, 30, 10, 8)];
        assert_eq!(analyze_eyes(&eyes, 100, &config).gaze, GazeDirection::Left);
    }

    #[test]
    fn test_closed_default() {
        let analysis = EyeAnalysis::closed_default(&EyeConfig::default());
        assert!(analysis.both_closed());
        assert_eq!(analysis.gaze, GazeDirection::Unknown);
    }

    #[test]
    fn test_landmark_path_uses_its_own_threshold() {
        let config = EyeConfig::default();
        let open = eye_contour(30.0, 20.0);
        let narrow = eye_contour(30.0, 8.0);
        assert!((landmark_ear(&open, &config) - 0.4).abs() < 1e-6);
        assert!((landmark_ear(&narrow, &config) - 8.0 / 30.0).abs() < 1e-6);

        let base = analyze_eyes(&[], 100, &config);
        let analysis = apply_landmarks(&base, &open, &narrow, &config);
        assert!(analysis.left.is_open);
        assert!(!analysis.right.is_open);
        assert_eq!(analysis.eyes_detected, 2);

        let degenerate = [Coordinate2D::new(1.0, 1.0); 6];
        assert_eq!(landmark_ear(&degenerate, &config), 0.3);
    }

    proptest! {
        #[test]
        fn prop_ear_is_clamped(x in -500i32..500, y in -500i32..500, w in -50i32..500, h in -50i32..500) {
            let ear = calculate_ear(&BoundingBox::new(x, y, w, h), &EyeConfig::default());
            prop_assert!((0.0..=0.4).contains(&ear));
        }

        #[test]
        fn prop_landmark_ear_is_clamped(coords in proptest::array::uniform12(-1000.0f32..1000.0)) {
            let mut points = [Coordinate2D::default(); 6];
            for (i, p) in points.iter_mut().enumerate() {
                *p = Coordinate2D::new(coords[2 * i], coords[2 * i + 1]);
            }
            let ear = landmark_ear(&points, &EyeConfig::default());
            prop_assert!((0.0..=0.4).contains(&ear));
        }
    }
}
