use anyhow::Error;
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::filter::{gaussian_blur_f32, laplacian_filter};
use imageproc::rect::Rect;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};
use crate::utils::coordinate::BoundingBox;

fn to_gray_image(img: ArrayView2<u8>) -> Result<GrayImage, Error> {
    let (h, w) = img.dim();
    GrayImage::from_raw(w as u32, h as u32, img.iter().copied().collect())
        .ok_or_else(|| Error::msg("luminance buffer does not match its dimensions"))
}

fn from_gray_image(img: GrayImage) -> Result<Array2<u8>, Error> {
    let (w, h) = img.dimensions();
    Ok(Array2::from_shape_vec((h as usize, w as usize), img.into_raw())?)
}

/// bgr_to_gray swaps to RGB order and uses the `image` crate's luma weights.
pub fn bgr_to_gray(color: ArrayView3<u8>) -> Result<Array2<u8>, Error> {
    let (h, w, _) = color.dim();
    let rgb: Vec<u8> = color.slice(s![.., .., ..;-1]).iter().copied().collect();
    let rgb = RgbImage::from_raw(w as u32, h as u32, rgb)
        .ok_or_else(|| Error::msg("color buffer does not match its dimensions"))?;
    from_gray_image(imageops::grayscale(&rgb))
}

pub fn equalize_histogram(img: ArrayView2<u8>) -> Result<Array2<u8>, Error> {
    from_gray_image(imageproc::contrast::equalize_histogram(&to_gray_image(img)?))
}

/// The sigma is the one OpenCV derives from the kernel size.
pub fn gaussian_blur(img: ArrayView2<u8>, ksize: usize) -> Result<Array2<u8>, Error> {
    let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    from_gray_image(gaussian_blur_f32(&to_gray_image(img)?, sigma))
}

pub fn resize_linear(img: ArrayView2<u8>, out_h: usize, out_w: usize) -> Result<Array2<u8>, Error> {
    let resized = imageops::resize(&to_gray_image(img)?, out_w as u32, out_h as u32, FilterType::Triangle);
    from_gray_image(resized)
}

pub fn laplacian(img: ArrayView2<u8>) -> Result<Array2<f64>, Error> {
    let filtered = laplacian_filter(&to_gray_image(img)?);
    let values: Vec<f64> = filtered.into_raw().into_iter().map(f64::from).collect();
    Ok(Array2::from_shape_vec(img.raw_dim(), values)?)
}

pub fn canny(img: ArrayView2<u8>, low: f32, high: f32) -> Result<Array2<u8>, Error> {
    from_gray_image(imageproc::edges::canny(&to_gray_image(img)?, low, high))
}

/// draw_rectangles keeps the buffer in BGR order; `color` is written as given.
pub fn draw_rectangles(
    img: &mut Array3<u8>,
    boxes: &[BoundingBox],
    color: [u8; 3],
    thickness: i32,
) -> Result<(), Error> {
    let (h, w, _) = img.dim();
    let mut canvas = RgbImage::from_raw(w as u32, h as u32, img.iter().copied().collect())
        .ok_or_else(|| Error::msg("color buffer does not match its dimensions"))?;
    for bbox in boxes {
        for inset in 0..thickness {
            let (width, height) = (bbox.width - 2 * inset, bbox.height - 2 * inset);
            if width <= 0 || height <= 0 {
                break
            }
            let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
            draw_hollow_rect_mut(&mut canvas, rect, Rgb(color));
        }
    }
    *img = Array3::from_shape_vec((h, w, 3), canvas.into_raw())?;
    Ok(())
}
