use anyhow::Error;
use ndarray::{s, Array2, ArrayView2};
use crate::helper::backend;
use crate::utils::coordinate::BoundingBox;

/// equalize_histogram spreads the grayscale histogram over the full 0..=255 range.
pub fn equalize_histogram(img: ArrayView2<u8>) -> Result<Array2<u8>, Error> {
    if img.is_empty() {
        return Ok(img.to_owned())
    }
    backend::equalize_histogram(img)
}

/// gaussian_blur applies a `ksize x ksize` Gaussian whose sigma follows from the kernel size.
pub fn gaussian_blur(img: ArrayView2<u8>, ksize: usize) -> Result<Array2<u8>, Error> {
    if img.is_empty() || ksize < 3 {
        return Ok(img.to_owned())
    }
    if ksize % 2 == 0 {
        return Err(Error::msg(format!("gaussian kernel size must be odd, got {ksize}")))
    }
    backend::gaussian_blur(img, ksize)
}

/// resize_bilinear resamples to `(out_h, out_w)` with linear interpolation.
///
/// # Arguments
/// * `img` - ArrayView2<u8>
/// * `out_h`, `out_w` - target size, both positive
///
/// # Returns
/// * `Result<Array2<u8>, Error>`
pub fn resize_bilinear(img: ArrayView2<u8>, out_h: usize, out_w: usize) -> Result<Array2<u8>, Error> {
    if img.is_empty() {
        return Err(Error::msg("cannot resize an empty image"))
    }
    if out_h == 0 || out_w == 0 {
        return Err(Error::msg("target size must be positive"))
    }
    backend::resize_linear(img, out_h, out_w)
}

/// laplacian applies the 3x3 aperture `[0 1 0; 1 -4 1; 0 1 0]`.
pub fn laplacian(img: ArrayView2<u8>) -> Result<Array2<f64>, Error> {
    if img.is_empty() {
        return Ok(Array2::zeros(img.raw_dim()))
    }
    backend::laplacian(img)
}

/// canny_edges marks edge pixels with 255 using hysteresis thresholds `low` and `high`.
pub fn canny_edges(img: ArrayView2<u8>, low: f32, high: f32) -> Result<Array2<u8>, Error> {
    if img.is_empty() {
        return Ok(img.to_owned())
    }
    if low > high {
        return Err(Error::msg("canny low threshold must not exceed the high one"))
    }
    backend::canny(img, low, high)
}

/// crop_roi returns the part of `img` covered by `bbox` after clamping it to the image.
pub fn crop_roi<'a>(img: ArrayView2<'a, u8>, bbox: &BoundingBox) -> ArrayView2<'a, u8> {
    let (h, w) = img.dim();
    let b = bbox.clamp_to(w as i32, h as i32);
    let (x0, y0) = (b.x as usize, b.y as usize);
    img.slice_move(s![y0..y0 + b.height as usize, x0..x0 + b.width as usize])
}

/// pad_face_box grows a detection by `ratio` of its width on every side, staying inside the frame.
pub fn pad_face_box(bbox: &BoundingBox, ratio: f32, frame_width: i32, frame_height: i32) -> BoundingBox {
    let padding = (ratio * bbox.width as f32) as i32;
    let x = (bbox.x - padding).max(0);
    let y = (bbox.y - padding).max(0);
    let w = (frame_width - x).min(bbox.width + 2 * padding);
    let h = (frame_height - y).min(bbox.height + 2 * padding);
    BoundingBox::new(x, y, w.max(0), h.max(0))
}

/// get_largest_face returns the box with the largest clamped area and its index.
pub fn get_largest_face(det_faces: &[BoundingBox], h: i32, w: i32) -> Option<(BoundingBox, usize)> {
    det_faces
        .iter()
        .enumerate()
        .max_by_key(|(_, face)| face.clamp_to(w, h).area())
        .map(|(index, face)| (*face, index))
}

#[cfg(test)]
mod tests {
    use ndarray::{array, Array2};
    use crate::helper::face_helper::{
        canny_edges, crop_roi, equalize_histogram, gaussian_blur, get_largest_face, laplacian,
        pad_face_box, resize_bilinear,
    };
    use crate::utils::coordinate::BoundingBox;

    #[test]
    fn test_equalize_histogram_stretches_range() {
        let img = Array2::from_shape_fn((8, 8), |(y, x)| (100 + y * 2 + x) as u8);
        let eq = equalize_histogram(img.view()).unwrap();
        assert_eq!(eq.dim(), (8, 8));
        assert_eq!(eq[[7, 7]], 255);
        assert!(eq[[0, 0]] < img[[0, 0]]);
        let empty = Array2::<u8>::zeros((0, 4));
        assert_eq!(equalize_histogram(empty.view()).unwrap().dim(), (0, 4));
    }

    #[test]
    fn test_gaussian_blur_keeps_flat_images_flat() {
        let flat = Array2::<u8>::from_elem((7, 9), 100);
        let blurred = gaussian_blur(flat.view(), 5).unwrap();
        assert_eq!(blurred.dim(), (7, 9));
        assert!(blurred.iter().all(|&v| (v as i32 - 100).abs() <= 1));

        let mut spike = Array2::<u8>::zeros((9, 9));
        spike[[4, 4]] = 255;
        let blurred = gaussian_blur(spike.view(), 5).unwrap();
        assert!(blurred[[4, 4]] < 255);
        assert!(blurred[[4, 5]] > 0);
        assert!(gaussian_blur(spike.view(), 4).is_err());
    }

    #[test]
    fn test_resize_bilinear() {
        let img = array![[0u8, 100], [100, 200]];
        let up = resize_bilinear(img.view(), 4, 4).unwrap();
        assert_eq!(up.dim(), (4, 4));
        assert!(up[[0, 0]] < up[[3, 3]]);

        let flat = Array2::<u8>::from_elem((50, 30), 77);
        let down = resize_bilinear(flat.view(), 48, 48).unwrap();
        assert_eq!(down.dim(), (48, 48));
        assert!(down.iter().all(|&v| v == 77));
        assert!(resize_bilinear(Array2::<u8>::zeros((0, 3)).view(), 4, 4).is_err());
        assert!(resize_bilinear(flat.view(), 0, 4).is_err());
    }

    #[test]
    fn test_laplacian_of_flat_and_spike() {
        let flat = Array2::<u8>::from_elem((4, 4), 9);
        assert!(laplacian(flat.view()).unwrap().iter().all(|&v| v == 0.0));

        let mut img = Array2::<u8>::zeros((5, 5));
        img[[2, 2]] = 10;
        let lap = laplacian(img.view()).unwrap();
        assert_eq!(lap[[2, 2]], -40.0);
        assert_eq!(lap[[1, 2]], 10.0);
        assert_eq!(lap[[0, 0]], 0.0);
    }

    #[test]
    fn test_canny_marks_step_only() {
        let flat = Array2::<u8>::from_elem((16, 16), 90);
        assert!(canny_edges(flat.view(), 30.0, 150.0).unwrap().iter().all(|&v| v == 0));

        let step = Array2::from_shape_fn((16, 16), |(_, x)| if x < 8 { 0u8 } else { 255 });
        let edges = canny_edges(step.view(), 30.0, 150.0).unwrap();
        assert!(edges.iter().any(|&v| v == 255));
        assert!(edges.column(0).iter().all(|&v| v == 0));
        assert!(edges.column(15).iter().all(|&v| v == 0));
        assert!(canny_edges(step.view(), 150.0, 30.0).is_err());
    }

    #[test]
    fn test_pad_face_box_clamps_to_frame() {
        let padded = pad_face_box(&BoundingBox::new(5, 5, 100, 100), 0.1, 640, 480);
        assert_eq!(padded, BoundingBox::new(0, 0, 120, 120));

        let edge = pad_face_box(&BoundingBox::new(600, 400, 100, 100), 0.1, 640, 480);
        assert_eq!(edge, BoundingBox::new(590, 390, 50, 90));
    }

    #[test]
    fn test_get_largest_face() {
        let faces = vec![
            BoundingBox::new(0, 0, 10, 10),
            BoundingBox::new(50, 50, 40, 40),
            BoundingBox::new(90, 90, 60, 60),
        ];
        let (largest, idx) = get_largest_face(&faces, 100, 100).unwrap();
        assert_eq!(idx, 1);
        assert_eq!(largest, faces[1]);
        assert!(get_largest_face(&[], 100, 100).is_none());
    }

    #[test]
    fn test_crop_roi() {
        let img = Array2::from_shape_fn((10, 10), |(y, x)| (y * 10 + x) as u8);
        let roi = crop_roi(img.view(), &BoundingBox::new(8, 2, 5, 3));
        assert_eq!(roi.dim(), (3, 2));
        assert_eq!(roi[[0, 0]], 28);
    }
}
