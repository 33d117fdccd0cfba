use anyhow::Error;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use crate::config::config::HeadPoseConfig;
use crate::utils::coordinate::BoundingBox;

/// Head orientation in degrees. Positive yaw: eyes right of the face center; positive pitch:
/// eyes below the face center; roll: tilt of the line between the eyes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadPose {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl HeadPose {
    pub fn is_finite(&self) -> bool {
        self.pitch.is_finite() && self.yaw.is_finite() && self.roll.is_finite()
    }
}

/// 2D head pose from eye-center geometry only, with no 3D face model or camera calibration.
///
/// Without both eyes the pose is all zeros. That is an assumed forward pose, not a measured
/// one, so a face whose eyes were missed scores as if it looked straight ahead. Poses are
/// windowed by the engagement tracker, not here.
#[derive(Debug, Clone)]
pub struct HeadPoseEstimator {
    config: HeadPoseConfig,
}

impl HeadPoseEstimator {
    pub fn new(config: HeadPoseConfig) -> Self {
        HeadPoseEstimator { config }
    }

    /// estimate computes the pose for one face ROI.
    ///
    /// # Arguments
    /// * `left_eye`, `right_eye` - eye boxes relative to the face ROI
    /// * `face_width`, `face_height` - ROI size
    ///
    /// # Returns
    /// * `Result<HeadPose, Error>`
    pub fn estimate(
        &self,
        left_eye: Option<&BoundingBox>,
        right_eye: Option<&BoundingBox>,
        face_width: i32,
        face_height: i32,
    ) -> Result<HeadPose, Error> {
        if face_width <= 0 || face_height <= 0 {
            return Err(Error::msg("face region is empty"))
        }
        let (left, right) = match (left_eye, right_eye) {
            (Some(l), Some(r)) => (l, r),
            _ => return Ok(HeadPose::default()),
        };

        let face_center = Vector2::new(face_width as f32 / 2.0, face_height as f32 / 2.0);
        let (lx, ly) = left.center();
        let (rx, ry) = right.center();
        let left_center = Vector2::new(lx as f32, ly as f32);
        let right_center = Vector2::new(rx as f32, ry as f32);

        let eye_line = right_center - left_center;
        let roll = if rx != lx {
            eye_line.y.atan2(eye_line.x).to_degrees()
        } else {
            0.0
        };

        let midpoint = (left_center + right_center) / 2.0;
        let offset = (midpoint - face_center).component_div(&face_center);
        let pose = HeadPose {
            pitch: offset.y * self.config.pitch_scale_degrees,
            yaw: offset.x * self.config.yaw_scale_degrees,
            roll,
        };
        if !pose.is_finite() {
            return Err(Error::msg("head pose is not finite"))
        }
        Ok(pose)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::config::HeadPoseConfig;
    use crate::modules::head_pose::{HeadPose, HeadPoseEstimator};
    use crate::utils::coordinate::BoundingBox;

    #[test]
    fn test_centered_level_eyes_face_forward() {
        let estimator = HeadPoseEstimator::new(HeadPoseConfig::default());
        let left = BoundingBox::new(20, 40, 20, 20);
        let right = BoundingBox::new(60, 40, 20, 20);
        let pose = estimator.estimate(Some(&left), Some(&right), 100, 100).unwrap();
        assert_eq!(pose, HeadPose { pitch: 0.0, yaw: 0.0, roll: 0.0 });
    }

    #[test]
    fn test_offsets_scale_to_degrees() {
        let estimator = HeadPoseEstimator::new(HeadPoseConfig::default());
        let left = BoundingBox::new(40, 10, 20, 20);
        let right = BoundingBox::new(80, 50, 20, 20);
        let pose = estimator.estimate(Some(&left), Some(&right), 100, 100).unwrap();
        assert!((pose.yaw - 0.4 * 45.0).abs() < 1e-4);
        assert!((pose.pitch - -0.2 * 30.0).abs() < 1e-4);
        assert!((pose.roll - 45.0).abs() < 1e-4);
    }

    #[test]
    fn test_missing_eye_defaults_to_zero_pose() {
        let estimator = HeadPoseEstimator::new(HeadPoseConfig::default());
        let left = BoundingBox::new(20, 40, 20, 20);
        let pose = estimator.estimate(Some(&left), None, 100, 100).unwrap();
        assert_eq!(pose, HeadPose::default());
        assert!(estimator.estimate(None, None, 0, 100).is_err());
    }
}
