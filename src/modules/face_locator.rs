use anyhow::Error;
use ndarray::{Array2, ArrayView2};
#[cfg(feature = "opencv")]
use opencv::core::{Rect, Size, Vector};
#[cfg(feature = "opencv")]
use opencv::objdetect::{CascadeClassifier, CascadeClassifierTrait, CascadeClassifierTraitConst, CASCADE_SCALE_IMAGE};
use tracing::{debug, warn};
use crate::config::config::{DetectionParams, EyeDetectionParams, LocatorConfig};
#[cfg(feature = "opencv")]
use crate::helper::cv_backend::gray_to_mat;
use crate::helper::face_helper::{equalize_histogram, gaussian_blur, pad_face_box, resize_bilinear};
use crate::utils::coordinate::BoundingBox;

const BLUR_KERNEL: usize = 5;

/// A multi-scale object detector run over a grayscale image with one parameter preset.
pub trait CascadeDetector: Send {
    fn detect(&mut self, image: ArrayView2<u8>, params: &DetectionParams) -> Result<Vec<BoundingBox>, Error>;
}

impl<F> CascadeDetector for F
where
    F: FnMut(ArrayView2<u8>, &DetectionParams) -> Result<Vec<BoundingBox>, Error> + Send,
{
    fn detect(&mut self, image: ArrayView2<u8>, params: &DetectionParams) -> Result<Vec<BoundingBox>, Error> {
        self(image, params)
    }
}

/// OpenCV Haar cascade, e.g. `haarcascade_frontalface_default.xml` or `haarcascade_eye.xml`.
#[cfg(feature = "opencv")]
pub struct HaarCascade {
    classifier: CascadeClassifier,
}

#[cfg(feature = "opencv")]
impl HaarCascade {
    pub fn from_file(path: &str) -> Result<Self, Error> {
        let classifier = CascadeClassifier::new(path)?;
        if classifier.empty()? {
            return Err(Error::msg(format!("could not load cascade {path}")))
        }
        debug!(path, "loaded cascade");
        Ok(HaarCascade { classifier })
    }
}

#[cfg(feature = "opencv")]
impl CascadeDetector for HaarCascade {
    fn detect(&mut self, image: ArrayView2<u8>, params: &DetectionParams) -> Result<Vec<BoundingBox>, Error> {
        let mat = gray_to_mat(image)?;

        let mut objects = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &mat,
            &mut objects,
            params.scale_factor,
            params.min_neighbors,
            CASCADE_SCALE_IMAGE,
            Size::new(params.min_size.0, params.min_size.1),
            Size::new(0, 0),
        )?;
        Ok(objects
            .iter()
            .map(|r| BoundingBox::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

pub struct FaceLocator {
    detectors: Vec<Box<dyn CascadeDetector>>,
    config: LocatorConfig,
}

impl FaceLocator {

    /// new initializes a face locator that tries `detectors` in order.
    pub fn new(detectors: Vec<Box<dyn CascadeDetector>>, config: LocatorConfig) -> Self {
        FaceLocator { detectors, config }
    }

    /// preprocess equalizes and blurs the luminance plane before detection. When either step
    /// fails the plane is used as it is.
    pub fn preprocess(&self, gray: ArrayView2<u8>) -> Array2<u8> {
        match self.try_preprocess(gray) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "detection preprocessing failed, using raw luminance");
                gray.to_owned()
            }
        }
    }

    fn try_preprocess(&self, gray: ArrayView2<u8>) -> Result<Array2<u8>, Error> {
        let mut prepared = if self.config.equalize {
            equalize_histogram(gray)?
        } else {
            gray.to_owned()
        };
        if self.config.blur {
            prepared = gaussian_blur(prepared.view(), BLUR_KERNEL)?;
        }
        Ok(prepared)
    }

    /// locate_faces returns padded face boxes in frame coordinates, or nothing on any failure.
    ///
    /// # Arguments
    /// * `prepared` - output of `preprocess`
    ///
    /// # Returns
    /// * `Vec<BoundingBox>`
    pub fn locate_faces(&mut self, prepared: ArrayView2<u8>) -> Vec<BoundingBox> {
        let (h, w) = prepared.dim();
        match self.try_locate(prepared) {
            Ok(faces) => faces
                .iter()
                .map(|face| pad_face_box(face, self.config.padding_ratio, w as i32, h as i32))
                .filter(|face| !face.is_empty())
                .collect(),
            Err(e) => {
                warn!(error = %e, "face detection failed, treating frame as empty");
                vec![]
            }
        }
    }

    fn try_locate(&mut self, prepared: ArrayView2<u8>) -> Result<Vec<BoundingBox>, Error> {
        let (h, w) = prepared.dim();
        if h == 0 || w == 0 {
            return Err(Error::msg("cannot detect faces in an empty image"))
        }

        let mut scale_up = 1.0f32;
        let upscaled;
        let target = if h.max(w) < self.config.upscale_below {
            scale_up = 2.0;
            upscaled = resize_bilinear(prepared, h * 2, w * 2)?;
            upscaled.view()
        } else {
            prepared.reborrow()
        };

        for (detector_idx, detector) in self.detectors.iter_mut().enumerate() {
            for params in &self.config.face_presets {
                let faces = detector.detect(target.view(), params)?;
                debug!(
                    detector = detector_idx,
                    scale = params.scale_factor,
                    neighbors = params.min_neighbors,
                    faces = faces.len(),
                    "face cascade attempt"
                );
                if !faces.is_empty() {
                    return Ok(faces.iter().map(|f| f.scale(1.0 / scale_up)).collect())
                }
            }
        }
        Ok(vec![])
    }
}

pub struct EyeLocator {
    detector: Box<dyn CascadeDetector>,
    strict: EyeDetectionParams,
    lenient: EyeDetectionParams,
}

impl EyeLocator {
    pub fn new(detector: Box<dyn CascadeDetector>, config: &LocatorConfig) -> Self {
        EyeLocator {
            detector,
            strict: config.eye_strict,
            lenient: config.eye_lenient,
        }
    }

    /// locate_eyes searches the face ROI with strict parameters and falls back to lenient ones
    /// when fewer than two eyes were found. Boxes are relative to the ROI.
    pub fn locate_eyes(&mut self, face_roi: ArrayView2<u8>) -> Result<Vec<BoundingBox>, Error> {
        let (h, w) = face_roi.dim();
        if h == 0 || w == 0 {
            return Err(Error::msg("face region is empty"))
        }
        let eyes = self.detector.detect(face_roi, &self.strict.resolve(w as i32, h as i32))?;
        if eyes.len() >= 2 {
            return Ok(eyes)
        }
        let eyes = self.detector.detect(face_roi, &self.lenient.resolve(w as i32, h as i32))?;
        debug!(eyes = eyes.len(), "lenient eye cascade attempt");
        Ok(eyes)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use anyhow::Error;
    use ndarray::{Array2, ArrayView2};
    use crate::config::config::{DetectionParams, LocatorConfig};
    use crate::modules::face_locator::{CascadeDetector, EyeLocator, FaceLocator};
    use crate::utils::coordinate::BoundingBox;

    fn recording_detector(
        calls: Arc<Mutex<Vec<(usize, f64)>>>,
        hit_on_neighbors: i32,
        hit: BoundingBox,
    ) -> Box<dyn CascadeDetector> {
        Box::new(move |img: ArrayView2<u8>, params: &DetectionParams| -> Result<Vec<BoundingBox>, Error> {
            calls.lock().unwrap().push((img.ncols(), params.scale_factor));
            if params.min_neighbors == hit_on_neighbors {
                Ok(vec![hit])
            } else {
                Ok(vec![])
            }
        })
    }

    #[test]
    fn test_first_successful_preset_wins() {
        let calls = Arc::new(Mutex::new(vec![]));
        let detector = recording_detector(calls.clone(), 4, BoundingBox::new(100, 100, 200, 200));
        let mut locator = FaceLocator::new(vec![detector], LocatorConfig::default());
        let frame = Array2::<u8>::zeros((600, 800));

        let faces = locator.locate_faces(frame.view());
        assert_eq!(faces, vec![BoundingBox::new(80, 80, 240, 240)]);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, 1.05);
        assert_eq!(calls[1].1, 1.1);
    }

    #[test]
    fn test_second_detector_used_when_first_finds_nothing() {
        let calls = Arc::new(Mutex::new(vec![]));
        let empty = recording_detector(calls.clone(), -1, BoundingBox::default());
        let profile = recording_detector(calls.clone(), 3, BoundingBox::new(10, 10, 100, 100));
        let mut locator = FaceLocator::new(vec![empty, profile], LocatorConfig::default());

        let faces = locator.locate_faces(Array2::<u8>::zeros((600, 800)).view());
        assert_eq!(faces.len(), 1);
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_small_frames_are_upscaled_and_mapped_back() {
        let calls = Arc::new(Mutex::new(vec![]));
        let detector = recording_detector(calls.clone(), 3, BoundingBox::new(100, 60, 80, 80));
        let mut locator = FaceLocator::new(vec![detector], LocatorConfig::default());

        let faces = locator.locate_faces(Array2::<u8>::zeros((240, 320)).view());
        assert_eq!(calls.lock().unwrap()[0].0, 640);
        assert_eq!(faces, vec![BoundingBox::new(46, 26, 48, 48)]);
    }

    #[test]
    fn test_detector_error_means_no_faces() {
        let failing: Box<dyn CascadeDetector> = Box::new(
            |_: ArrayView2<u8>, _: &DetectionParams| -> Result<Vec<BoundingBox>, Error> {
                Err(Error::msg("cascade not loaded"))
            },
        );
        let mut locator = FaceLocator::new(vec![failing], LocatorConfig::default());
        assert!(locator.locate_faces(Array2::<u8>::zeros((600, 800)).view()).is_empty());
        assert!(locator.locate_faces(Array2::<u8>::zeros((0, 0)).view()).is_empty());
    }

    #[test]
    fn test_eye_locator_falls_back_to_lenient() {
        let calls = Arc::new(Mutex::new(vec![]));
        let detector = recording_detector(calls.clone(), 2, BoundingBox::new(5, 5, 10, 5));
        let mut locator = EyeLocator::new(detector, &LocatorConfig::default());

        let eyes = locator.locate_eyes(Array2::<u8>::zeros((100, 100)).view()).unwrap();
        assert_eq!(eyes.len(), 1);
        assert_eq!(*calls.lock().unwrap(), vec![(100, 1.1), (100, 1.05)]);
        assert!(locator.locate_eyes(Array2::<u8>::zeros((0, 10)).view()).is_err());
    }

    #[test]
    fn test_preprocess_keeps_dimensions() {
        let locator = FaceLocator::new(vec![], LocatorConfig::default());
        let gray = Array2::from_shape_fn((20, 30), |(y, x)| (y * 7 + x * 3) as u8);
        assert_eq!(locator.preprocess(gray.view()).dim(), (20, 30));
    }
}
