//! Canvas-to-tensor preprocessing
//!
//! Converts an arbitrary-size RGBA surface into the `[1, 3, 224, 224]`
//! ImageNet-normalized tensor the doodle models were trained on.

use doodletank_core::{ImageSurface, InputTensor, INPUT_SIZE};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage, RgbaImage};

/// Per-channel ImageNet mean, (R, G, B)
pub const IMAGENET_MEAN: [f64; 3] = [0.485, 0.456, 0.406];

/// Per-channel ImageNet standard deviation, (R, G, B)
pub const IMAGENET_STD: [f64; 3] = [0.229, 0.224, 0.225];

/// Convert a surface into a model input tensor.
///
/// The surface is composited over opaque white (the models were trained on
/// a white background), stretched to 224x224 without preserving the aspect
/// ratio, and standardized per channel. Values are laid out channel-major:
/// index `i` holds red for pixel `i`, `224*224 + i` green, `2*224*224 + i`
/// blue.
pub fn preprocess(surface: &ImageSurface) -> InputTensor {
    let opaque = flatten_on_white(surface.as_image());

    let size = INPUT_SIZE as u32;
    let resized = if opaque.dimensions() == (size, size) {
        opaque
    } else {
        imageops::resize(&opaque, size, size, FilterType::Triangle)
    };

    let plane = INPUT_SIZE * INPUT_SIZE;
    let mut tensor = InputTensor::zeros();
    let data = tensor.as_mut_slice();

    for (i, pixel) in resized.pixels().enumerate() {
        for c in 0..3 {
            data[c * plane + i] = standardize(pixel[c], c);
        }
    }

    tensor
}

/// Normalize one channel value to [0, 1] and standardize it.
///
/// Computed in f64 and narrowed once, matching a float64 pipeline that
/// stores into a float32 buffer.
#[inline]
fn standardize(value: u8, channel: usize) -> f32 {
    let normalized = value as f64 / 255.0;
    ((normalized - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]) as f32
}

/// Alpha-composite every pixel over opaque white.
///
/// Done at source resolution so transparent pixels never bleed their
/// (usually black) color channels into neighbours during resampling.
fn flatten_on_white(src: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(src.width(), src.height(), |x, y| {
        let [r, g, b, a] = src.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let over = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        Rgb([over(r), over(g), over(b)])
    })
}
