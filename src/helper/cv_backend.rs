use anyhow::Error;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3};
use opencv::core::{Mat, MatTraitConst, MatTraitConstManual, Rect, Scalar, Size, BORDER_DEFAULT, CV_64F};
use opencv::imgproc;
use crate::utils::coordinate::BoundingBox;

/// gray_to_mat copies a luminance plane into an owned single-channel matrix.
pub fn gray_to_mat(img: ArrayView2<u8>) -> Result<Mat, Error> {
    let contiguous = img.as_standard_layout();
    let data = contiguous
        .as_slice()
        .ok_or_else(|| Error::msg("image is not contiguous"))?;
    Ok(Mat::from_slice_rows_cols(data, img.nrows(), img.ncols())?.try_clone()?)
}

/// mat_to_gray copies a single-channel 8-bit matrix back into an ndarray.
pub fn mat_to_gray(mat: &Mat) -> Result<Array2<u8>, Error> {
    // try_clone always yields a continuous buffer
    let continuous = mat.try_clone()?;
    let bytes = continuous.data_bytes()?;
    Ok(Array2::from_shape_vec((mat.rows() as usize, mat.cols() as usize), bytes.to_vec())?)
}

fn bgr_to_mat(color: ArrayView3<u8>) -> Result<Mat, Error> {
    let (h, w, _) = color.dim();
    let contiguous = color.as_standard_layout();
    let data = contiguous
        .as_slice()
        .ok_or_else(|| Error::msg("image is not contiguous"))?;
    let flat = Mat::from_slice_rows_cols(data, h, w * 3)?;
    Ok(flat.reshape(3, h as i32)?.try_clone()?)
}

pub fn bgr_to_gray(color: ArrayView3<u8>) -> Result<Array2<u8>, Error> {
    let src = bgr_to_mat(color)?;
    let mut gray = Mat::default();
    imgproc::cvt_color(&src, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;
    mat_to_gray(&gray)
}

pub fn equalize_histogram(img: ArrayView2<u8>) -> Result<Array2<u8>, Error> {
    let src = gray_to_mat(img)?;
    let mut dst = Mat::default();
    imgproc::equalize_hist(&src, &mut dst)?;
    mat_to_gray(&dst)
}

/// Sigma 0 lets OpenCV derive it from the kernel size.
pub fn gaussian_blur(img: ArrayView2<u8>, ksize: usize) -> Result<Array2<u8>, Error> {
    let src = gray_to_mat(img)?;
    let mut dst = Mat::default();
    let k = ksize as i32;
    imgproc::gaussian_blur(&src, &mut dst, Size::new(k, k), 0.0, 0.0, BORDER_DEFAULT)?;
    mat_to_gray(&dst)
}

pub fn resize_linear(img: ArrayView2<u8>, out_h: usize, out_w: usize) -> Result<Array2<u8>, Error> {
    let src = gray_to_mat(img)?;
    let mut dst = Mat::default();
    imgproc::resize(
        &src,
        &mut dst,
        Size::new(out_w as i32, out_h as i32),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;
    mat_to_gray(&dst)
}

pub fn laplacian(img: ArrayView2<u8>) -> Result<Array2<f64>, Error> {
    let src = gray_to_mat(img)?;
    let mut dst = Mat::default();
    imgproc::laplacian(&src, &mut dst, CV_64F, 1, 1.0, 0.0, BORDER_DEFAULT)?;
    let values = dst.data_typed::<f64>()?;
    Ok(Array2::from_shape_vec((img.nrows(), img.ncols()), values.to_vec())?)
}

pub fn canny(img: ArrayView2<u8>, low: f32, high: f32) -> Result<Array2<u8>, Error> {
    let src = gray_to_mat(img)?;
    let mut dst = Mat::default();
    imgproc::canny(&src, &mut dst, low as f64, high as f64, 3, false)?;
    mat_to_gray(&dst)
}

pub fn draw_rectangles(
    img: &mut Array3<u8>,
    boxes: &[BoundingBox],
    color: [u8; 3],
    thickness: i32,
) -> Result<(), Error> {
    let mut canvas = bgr_to_mat(img.view())?;
    let color = Scalar::new(color[0] as f64, color[1] as f64, color[2] as f64, 0.0);
    for bbox in boxes {
        let rect = Rect::new(bbox.x, bbox.y, bbox.width, bbox.height);
        imgproc::rectangle(&mut canvas, rect, color, thickness, imgproc::LINE_8, 0)?;
    }
    let bytes = canvas.data_bytes()?;
    *img = Array3::from_shape_vec(img.dim(), bytes.to_vec())?;
    Ok(())
}
