//! Peak signal-to-noise ratio between two images.

use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::utils::DataError;

const MAX_SAMPLE: f64 = 255.0;

/// Decodes a PNG held in memory. Failure is a data problem, never I/O.
pub fn decode_png(data: &[u8]) -> Result<DynamicImage, DataError> {
    image::load_from_memory_with_format(data, ImageFormat::Png)
        .map_err(|e| DataError::Decode(format!("failed to decode as png: {e}")))
}

fn premultiply(sample: u16, alpha: u16) -> i64 {
    (sample as u32 * alpha as u32 / 65535) as i64
}

/// PSNR in dB over the colour channels, alpha excluded.
///
/// Samples are compared as 16-bit alpha-premultiplied values and each squared
/// difference is scaled back to 8-bit range before accumulating. Identical
/// pixels give `f64::INFINITY`.
pub fn psnr(a: &DynamicImage, b: &DynamicImage) -> Result<f64, DataError> {
    let (width, height) = a.dimensions();
    if (width, height) != b.dimensions() {
        let (right_width, right_height) = b.dimensions();
        return Err(DataError::DimensionMismatch {
            left_width: width,
            left_height: height,
            right_width,
            right_height,
        });
    }
    if width == 0 || height == 0 {
        return Ok(f64::INFINITY);
    }

    let left = a.to_rgba16();
    let right = b.to_rgba16();

    let mut sum: i64 = 0;
    for (p, q) in left.pixels().zip(right.pixels()) {
        for channel in 0..3 {
            let d = premultiply(p[channel], p[3]) - premultiply(q[channel], q[3]);
            sum += (d * d) >> 16;
        }
    }

    if sum == 0 {
        return Ok(f64::INFINITY);
    }

    let mse = sum as f64 / (width as f64 * height as f64 * 3.0);
    Ok(10.0 * (MAX_SAMPLE * MAX_SAMPLE / mse).log10())
}

/// [`psnr`] over two encoded PNGs.
pub fn png_psnr(a: &[u8], b: &[u8]) -> Result<f64, DataError> {
    psnr(&decode_png(a)?, &decode_png(b)?)
}
