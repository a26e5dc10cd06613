// Model input preparation
//
// The classifier was calibrated on frames produced by OpenCV
// (imread → resize INTER_CUBIC → BGR2GRAY → /255), so both the resize kernel
// and the grey weights below follow OpenCV rather than the `image` crate
// defaults (CatmullRom uses a = -0.5, `to_luma8` uses BT.709 weights).

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use ndarray::Array4;
use tracing::trace;

/// Spatial edge of the model input
pub const INPUT_EDGE: u32 = 28;

/// OpenCV's bicubic coefficient
const CUBIC_A: f32 = -0.75;

/// BT.601 weights in OpenCV's 14-bit fixed point (R, G, B)
const GRAY_R: u32 = 4899;
const GRAY_G: u32 = 9617;
const GRAY_B: u32 = 1868;
const GRAY_SHIFT: u32 = 14;

/// Turn a decoded photo into the `[1, 1, 28, 28]` tensor the model expects
pub fn prepare_input(image: &DynamicImage) -> Array4<f32> {
    trace!(
        "Preprocessing image: {}x{} → {}x{}",
        image.width(),
        image.height(),
        INPUT_EDGE,
        INPUT_EDGE
    );

    // Alpha is dropped and grey replicated, as the reference image reader does
    let rgb = image.to_rgb8();
    let resized = resize_cubic(&rgb, INPUT_EDGE, INPUT_EDGE);
    let gray = to_gray(&resized);
    to_tensor(&gray)
}

/// Bicubic resize matching `cv2.resize(..., interpolation=INTER_CUBIC)`.
///
/// Separable: a horizontal pass into an f32 buffer, then a vertical pass with
/// rounding and saturation to u8. Borders are replicated and no antialiasing
/// is applied when shrinking.
pub fn resize_cubic(src: &RgbImage, dst_width: u32, dst_height: u32) -> RgbImage {
    let (src_width, src_height) = src.dimensions();
    if src_width == 0 || src_height == 0 || dst_width == 0 || dst_height == 0 {
        return RgbImage::new(dst_width, dst_height);
    }

    let x_taps = cubic_taps(src_width, dst_width);
    let y_taps = cubic_taps(src_height, dst_height);

    // Horizontal pass: src_height rows × dst_width columns × 3 channels
    let mut horizontal = vec![0.0f32; src_height as usize * dst_width as usize * 3];
    for y in 0..src_height {
        for (dx, tap) in x_taps.iter().enumerate() {
            let mut acc = [0.0f32; 3];
            for (&sx, &weight) in tap.indices.iter().zip(tap.weights.iter()) {
                let pixel = src.get_pixel(sx, y);
                for (c, value) in acc.iter_mut().enumerate() {
                    *value += weight * pixel[c] as f32;
                }
            }
            let offset = (y as usize * dst_width as usize + dx) * 3;
            horizontal[offset..offset + 3].copy_from_slice(&acc);
        }
    }

    let mut dst = RgbImage::new(dst_width, dst_height);
    for (dy, tap) in y_taps.iter().enumerate() {
        for dx in 0..dst_width as usize {
            let mut acc = [0.0f32; 3];
            for (&sy, &weight) in tap.indices.iter().zip(tap.weights.iter()) {
                let offset = (sy as usize * dst_width as usize + dx) * 3;
                for (c, value) in acc.iter_mut().enumerate() {
                    *value += weight * horizontal[offset + c];
                }
            }
            dst.put_pixel(
                dx as u32,
                dy as u32,
                Rgb([saturate(acc[0]), saturate(acc[1]), saturate(acc[2])]),
            );
        }
    }

    dst
}

/// Grey conversion with OpenCV's `BGR2GRAY` fixed-point arithmetic
pub fn to_gray(rgb: &RgbImage) -> GrayImage {
    let (width, height) = rgb.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let luma = (r as u32 * GRAY_R + g as u32 * GRAY_G + b as u32 * GRAY_B
            + (1 << (GRAY_SHIFT - 1)))
            >> GRAY_SHIFT;
        Luma([luma.min(255) as u8])
    })
}

/// Scale to [0, 1] and lay out as NCHW with N = C = 1
pub fn to_tensor(gray: &GrayImage) -> Array4<f32> {
    let (width, height) = gray.dimensions();
    Array4::from_shape_fn((1, 1, height as usize, width as usize), |(_, _, y, x)| {
        gray.get_pixel(x as u32, y as u32)[0] as f32 / 255.0
    })
}

/// Source indices and weights contributing to one destination coordinate
struct CubicTap {
    indices: [u32; 4],
    weights: [f32; 4],
}

fn cubic_taps(src_len: u32, dst_len: u32) -> Vec<CubicTap> {
    let scale = src_len as f32 / dst_len as f32;
    let last = src_len as i64 - 1;

    (0..dst_len)
        .map(|d| {
            let position = (d as f32 + 0.5) * scale - 0.5;
            let base = position.floor();
            let frac = position - base;
            let base = base as i64;

            let mut indices = [0u32; 4];
            for (k, index) in indices.iter_mut().enumerate() {
                *index = (base - 1 + k as i64).clamp(0, last) as u32;
            }

            CubicTap {
                indices,
                weights: cubic_weights(frac),
            }
        })
        .collect()
}

/// Kernel weights for the four taps around a fractional offset `t` in [0, 1)
fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let w0 = ((a * (t + 1.0) - 5.0 * a) * (t + 1.0) + 8.0 * a) * (t + 1.0) - 4.0 * a;
    let w1 = ((a + 2.0) * t - (a + 3.0)) * t * t + 1.0;
    let w2 = ((a + 2.0) * (1.0 - t) - (a + 3.0)) * (1.0 - t) * (1.0 - t) + 1.0;
    let w3 = 1.0 - w0 - w1 - w2;
    [w0, w1, w2, w3]
}

#[inline]
fn saturate(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_weights_sum_to_one() {
        for t in [0.0, 0.25, 0.5, 0.75, 0.99] {
            let sum: f32 = cubic_weights(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
        // Integer positions sample the centre pixel exactly
        let w = cubic_weights(0.0);
        assert!((w[1] - 1.0).abs() < 1e-6);
        assert!(w[0].abs() < 1e-6 && w[2].abs() < 1e-6);
    }

    #[test]
    fn test_uniform_image_stays_uniform() {
        let src = RgbImage::from_pixel(200, 120, Rgb([90, 140, 200]));
        let dst = resize_cubic(&src, INPUT_EDGE, INPUT_EDGE);
        assert_eq!(dst.dimensions(), (28, 28));
        assert!(dst.pixels().all(|p| p.0 == [90, 140, 200]));
    }

    #[test]
    fn test_identity_resize() {
        let src = RgbImage::from_fn(28, 28, |x, y| Rgb([(x * 9) as u8, (y * 9) as u8, 7]));
        let dst = resize_cubic(&src, 28, 28);
        assert_eq!(src, dst);
    }

    #[test]
    fn test_gray_weights() {
        let rgb = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let gray = to_gray(&rgb);
        // 0.299, 0.587, 0.114 of 255, rounded
        assert_eq!(gray.get_pixel(0, 0)[0], 76);
        assert_eq!(gray.get_pixel(1, 0)[0], 150);
        assert_eq!(gray.get_pixel(2, 0)[0], 29);

        let white = to_gray(&RgbImage::from_pixel(1, 1, Rgb([255, 255, 255])));
        assert_eq!(white.get_pixel(0, 0)[0], 255);
    }

    #[test]
    fn test_prepare_input_shape_and_range() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 48, |x, y| {
            Rgba([(x * 4) as u8, (y * 5) as u8, 128, 10])
        }));
        let tensor = prepare_input(&img);
        assert_eq!(tensor.shape(), &[1, 1, 28, 28]);
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_white_image_normalizes_to_one() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let tensor = prepare_input(&img);
        assert!(tensor.iter().all(|&v| v == 1.0));
    }

    fn gray_row(values: &[u8]) -> RgbImage {
        RgbImage::from_fn(values.len() as u32, 1, |x, _| Rgb([values[x as usize]; 3]))
    }

    fn row_values(img: &RgbImage) -> Vec<u8> {
        img.pixels().map(|p| p[0]).collect()
    }

    #[test]
    fn test_half_pixel_weights() {
        // A 2x downscale samples every destination pixel at t = 0.5
        let w = cubic_weights(0.5);
        let expected = [-0.09375, 0.59375, 0.59375, -0.09375];
        for (got, want) in w.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{:?}", w);
        }

        let taps = cubic_taps(8, 4);
        assert_eq!(taps[0].indices, [0, 0, 1, 2]);
        assert_eq!(taps[1].indices, [1, 2, 3, 4]);
        assert_eq!(taps[3].indices, [5, 6, 7, 7]);
    }

    #[test]
    fn test_gradient_downscale_matches_opencv() {
        // cv2.resize(row, (4, 1), interpolation=cv2.INTER_CUBIC)
        let src = gray_row(&[0, 20, 40, 60, 80, 100, 120, 140]);
        let dst = resize_cubic(&src, 4, 1);
        // Interior pixels land on the line; the ends bend toward the replicated edge
        assert_eq!(row_values(&dst), vec![8, 50, 90, 132]);
    }

    #[test]
    fn test_border_step_uses_replicated_edge() {
        // With a zero border the first pixel would be 0.59375 * 255 = 151
        let src = gray_row(&[255, 0, 0, 0, 0, 0, 0, 0]);
        let dst = resize_cubic(&src, 4, 1);
        assert_eq!(row_values(&dst), vec![128, 0, 0, 0]);
    }

    #[test]
    fn test_overshoot_saturates() {
        let src = gray_row(&[0, 0, 0, 0, 255, 255, 255, 255]);
        let dst = resize_cubic(&src, 4, 1);
        // -0.09375 * 255 and 1.09375 * 255 clamp to the u8 range
        assert_eq!(row_values(&dst), vec![0, 0, 255, 255]);
    }

    #[test]
    fn test_vertical_pass_matches_horizontal() {
        let values = [0u8, 20, 40, 60, 80, 100, 120, 140];
        let src = RgbImage::from_fn(1, 8, |_, y| Rgb([values[y as usize]; 3]));
        let dst = resize_cubic(&src, 1, 4);
        assert_eq!(row_values(&dst), vec![8, 50, 90, 132]);
    }
}
