//! Turns a decoded PNG into the pixel buffer the quantizer takes.

use png::{BitDepth, ColorType, Decoder, Transformations};

use crate::utils::DataError;

/// Alpha-weighted RGBA pixels, row-major, 4 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaBuffer {
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// What the adapter made of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Palette-based already; there is nothing to quantize.
    AlreadyIndexed,
    Rgba(RgbaBuffer),
}

fn weight(channel: u8, alpha: u8) -> u8 {
    ((channel as u32 * alpha as u32 + 127) / 255) as u8
}

fn push_weighted(out: &mut Vec<u8>, r: u8, g: u8, b: u8, a: u8) {
    out.extend_from_slice(&[weight(r, a), weight(g, a), weight(b, a), a]);
}

/// Decodes `data` and prepares it for quantization.
///
/// 8-bit RGB, RGBA and grey+alpha images (including those whose `tRNS`
/// expands them to one of these) become an [`RgbaBuffer`] whose colour
/// channels are multiplied by alpha. Plain greyscale and 16-bit images are
/// not supported.
pub fn prepare_rgba(data: &[u8]) -> Result<Prepared, DataError> {
    let mut decoder = Decoder::new(data);
    decoder.set_transformations(Transformations::EXPAND);
    let mut reader = decoder
        .read_info()
        .map_err(|e| DataError::Decode(format!("failed to decode: {e}")))?;

    if reader.info().color_type == ColorType::Indexed {
        return Ok(Prepared::AlreadyIndexed);
    }

    let (color_type, bit_depth) = reader.output_color_type();
    if bit_depth != BitDepth::Eight {
        return Err(DataError::UnsupportedPixelLayout(format!(
            "{color_type:?} at {} bits",
            bit_depth as u8
        )));
    }
    if color_type == ColorType::Grayscale {
        return Err(DataError::UnsupportedPixelLayout("Grayscale without alpha".to_string()));
    }

    let mut raw = vec![0; reader.output_buffer_size()];
    let frame = reader
        .next_frame(&mut raw)
        .map_err(|e| DataError::Decode(format!("failed to decode: {e}")))?;
    raw.truncate(frame.buffer_size());

    let mut pixels = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);
    match color_type {
        ColorType::Rgb => {
            for px in raw.chunks_exact(3) {
                pixels.extend_from_slice(&[px[0], px[1], px[2], u8::MAX]);
            }
        }
        ColorType::Rgba => {
            for px in raw.chunks_exact(4) {
                push_weighted(&mut pixels, px[0], px[1], px[2], px[3]);
            }
        }
        ColorType::GrayscaleAlpha => {
            for px in raw.chunks_exact(2) {
                push_weighted(&mut pixels, px[0], px[0], px[0], px[1]);
            }
        }
        other => {
            return Err(DataError::UnsupportedPixelLayout(format!("{other:?}")));
        }
    }

    Ok(Prepared::Rgba(RgbaBuffer {
        width: frame.width,
        height: frame.height,
        pixels,
    }))
}
