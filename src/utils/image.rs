use anyhow::Error;
use ndarray::{Array2, Array3, ArrayView2};
#[cfg(feature = "opencv")]
use opencv::core::{Mat, MatTraitConst, MatTraitConstManual};
#[cfg(feature = "opencv")]
use opencv::imgcodecs::{imdecode, IMREAD_COLOR};
use crate::helper::backend;
use crate::utils::coordinate::BoundingBox;

/// One webcam frame: the BGR color planes plus the derived luminance plane.
#[derive(Debug, Clone)]
pub struct Frame {
    color: Array3<u8>,
    gray: Array2<u8>,
}

impl Frame {

    /// from_bgr wraps an `height x width x 3` BGR array and derives its grayscale plane.
    ///
    /// # Arguments
    /// * `color` - Array3<u8> in BGR channel order
    ///
    /// # Returns
    /// * `Result<Frame, Error>`
    pub fn from_bgr(color: Array3<u8>) -> Result<Frame, Error> {
        let (h, w, c) = color.dim();
        if h == 0 || w == 0 {
            return Err(Error::msg("frame is empty"))
        }
        if c != 3 {
            return Err(Error::msg(format!("frame must have 3 channels, got {c}")))
        }
        let gray = bgr_to_gray(&color)?;
        Ok(Frame { color, gray })
    }

    /// from_bgr_bytes builds a frame from an interleaved BGR byte buffer.
    pub fn from_bgr_bytes(bytes: &[u8], height: usize, width: usize) -> Result<Frame, Error> {
        let expected = height
            .checked_mul(width)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| Error::msg(format!("frame size {height}x{width} overflows")))?;
        if bytes.len() != expected {
            return Err(Error::msg(format!(
                "expected {} bytes for a {}x{} BGR frame, got {}",
                expected, height, width, bytes.len()
            )))
        }
        let color = Array3::from_shape_vec((height, width, 3), bytes.to_vec())?;
        Frame::from_bgr(color)
    }

    /// from_mat copies an 8-bit 3-channel OpenCV matrix into a frame.
    #[cfg(feature = "opencv")]
    pub fn from_mat(mat: &Mat) -> Result<Frame, Error> {
        if mat.empty() {
            return Err(Error::msg("frame is empty"))
        }
        if mat.channels() != 3 {
            return Err(Error::msg(format!("frame must have 3 channels, got {}", mat.channels())))
        }
        // try_clone always yields a continuous buffer
        let continuous = mat.try_clone()?;
        let bytes = continuous.data_bytes()?;
        Frame::from_bgr_bytes(bytes, mat.rows() as usize, mat.cols() as usize)
    }

    pub fn color(&self) -> &Array3<u8> {
        &self.color
    }

    pub fn gray(&self) -> ArrayView2<'_, u8> {
        self.gray.view()
    }

    pub fn width(&self) -> usize {
        self.gray.ncols()
    }

    pub fn height(&self) -> usize {
        self.gray.nrows()
    }

    pub fn into_color(self) -> Array3<u8> {
        self.color
    }
}

/// decode_image decodes an encoded image (jpeg, png, ...) into a BGR frame.
#[cfg(feature = "opencv")]
pub fn decode_image(im_bytes: &[u8]) -> Result<Frame, Error> {
    let img_as_mat = Mat::from_slice(im_bytes)?;
    let img_as_arr_bgr = imdecode(&img_as_mat, IMREAD_COLOR)?;
    Frame::from_mat(&img_as_arr_bgr)
}

/// bgr_to_gray derives the luminance plane of a BGR image.
pub fn bgr_to_gray(color: &Array3<u8>) -> Result<Array2<u8>, Error> {
    if color.is_empty() {
        return Err(Error::msg("frame is empty"))
    }
    backend::bgr_to_gray(color.view())
}

/// draw_rectangles outlines every box on a BGR image in place; parts outside the image are
/// clipped.
///
/// # Arguments
/// * `img` - BGR image
/// * `boxes` - &[BoundingBox]
/// * `color` - BGR triple
/// * `thickness` - line width in pixels
pub fn draw_rectangles(
    img: &mut Array3<u8>,
    boxes: &[BoundingBox],
    color: [u8; 3],
    thickness: i32,
) -> Result<(), Error> {
    if boxes.is_empty() || img.is_empty() {
        return Ok(())
    }
    backend::draw_rectangles(img, boxes, color, thickness)
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;
    use crate::utils::coordinate::BoundingBox;
    use crate::utils::image::{draw_rectangles, Frame};

    #[test]
    fn test_from_bgr_derives_gray() {
        let mut color = Array3::<u8>::zeros((2, 2, 3));
        color[[0, 0, 2]] = 255;
        color[[0, 1, 1]] = 255;
        color[[1, 0, 0]] = 255;
        color.slice_mut(ndarray::s![1, 1, ..]).fill(200);

        let frame = Frame::from_bgr(color).unwrap();
        let gray = frame.gray();
        // green weighs most, blue least
        assert!(gray[[0, 1]] > gray[[0, 0]]);
        assert!(gray[[0, 0]] > gray[[1, 0]]);
        assert!(gray[[1, 0]] > 0);
        assert_eq!(gray[[1, 1]], 200);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
    }

    #[test]
    fn test_from_bgr_rejects_malformed_frames() {
        assert!(Frame::from_bgr(Array3::<u8>::zeros((0, 4, 3))).is_err());
        assert!(Frame::from_bgr(Array3::<u8>::zeros((4, 4, 1))).is_err());
        assert!(Frame::from_bgr_bytes(&[0u8; 10], 2, 2).is_err());
        assert!(Frame::from_bgr_bytes(&[0u8; 12], 2, 2).is_ok());
    }

    #[test]
    fn test_from_bgr_bytes_rejects_overflowing_dimensions() {
        assert!(Frame::from_bgr_bytes(&[0u8; 12], usize::MAX / 2, 3).is_err());
        assert!(Frame::from_bgr_bytes(&[0u8; 12], usize::MAX, usize::MAX).is_err());
    }

    #[test]
    fn test_draw_rectangles_outline_only() {
        let mut img = Array3::<u8>::zeros((10, 10, 3));
        draw_rectangles(&mut img, &[BoundingBox::new(2, 2, 6, 6)], [255, 0, 0], 1).unwrap();
        assert_eq!(img[[2, 2, 0]], 255);
        assert_eq!(img[[7, 7, 0]], 255);
        assert_eq!(img[[2, 5, 1]], 0);
        assert_eq!(img[[4, 4, 0]], 0);
    }

    #[test]
    fn test_draw_rectangles_clips_boxes_outside_the_image() {
        let mut img = Array3::<u8>::zeros((10, 10, 3));
        let boxes = [BoundingBox::new(-5, -5, 8, 8), BoundingBox::new(20, 20, 4, 4)];
        draw_rectangles(&mut img, &boxes, [0, 0, 255], 1).unwrap();
        assert_eq!(img[[2, 0, 2]], 255);
        assert_eq!(img[[0, 0, 2]], 0);
        assert_eq!(img[[9, 9, 2]], 0);
    }
}
