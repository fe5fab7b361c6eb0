//! Colour quantization: the engine seam and the indexed PNG re-encoder.

use color_quant::NeuQuant;
use png::{BitDepth, ColorType, Compression, Encoder};

use crate::processing::color::RgbaBuffer;
use crate::utils::{DataError, QuantizeError};

/// Palette plus one palette index per pixel.
///
/// Palette entries are in the same alpha-weighted space as the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quantized {
    pub palette: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

/// A colour quantization engine.
pub trait Quantizer: Send + Sync {
    fn quantize(&self, image: &RgbaBuffer) -> Result<Quantized, QuantizeError>;
}

/// In-process NeuQuant engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeuQuantizer {
    /// 1 examines every pixel, 30 samples one in thirty
    pub sample_factor: i32,
    /// Palette size, 2 to 256
    pub colors: usize,
}

impl Default for NeuQuantizer {
    fn default() -> Self {
        Self {
            sample_factor: 10,
            colors: 256,
        }
    }
}

impl Quantizer for NeuQuantizer {
    fn quantize(&self, image: &RgbaBuffer) -> Result<Quantized, QuantizeError> {
        if !(1..=30).contains(&self.sample_factor) || !(2..=256).contains(&self.colors) {
            return Err(QuantizeError::ValueOutOfRange);
        }
        if image.width == 0 || image.height == 0 {
            return Err(QuantizeError::ValueOutOfRange);
        }
        if image.pixels.len() != image.pixel_count() * 4 {
            return Err(QuantizeError::BufferTooSmall);
        }

        let nq = NeuQuant::new(self.sample_factor, self.colors, &image.pixels);
        let palette = nq
            .color_map_rgba()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        let indices = image
            .pixels
            .chunks_exact(4)
            .map(|px| nq.index_of(px) as u8)
            .collect();

        Ok(Quantized { palette, indices })
    }
}

fn unweight(channel: u8, alpha: u8) -> u8 {
    if alpha == 0 {
        return 0;
    }
    (channel as u32 * 255 / alpha as u32).min(255) as u8
}

/// Encodes `quantized` as an 8-bit indexed PNG.
///
/// Palette colours are divided back by alpha for `PLTE`; `tRNS` is trimmed
/// after the last entry that is not fully opaque and omitted when none is.
pub fn encode_indexed(width: u32, height: u32, quantized: &Quantized) -> Result<Vec<u8>, DataError> {
    let Quantized { palette, indices } = quantized;
    if palette.is_empty() || palette.len() > 256 {
        return Err(DataError::QuantizerOutput(format!(
            "palette has {} entries",
            palette.len()
        )));
    }
    let expected = width as usize * height as usize;
    if indices.len() != expected {
        return Err(DataError::QuantizerOutput(format!(
            "{} indices for {expected} pixels",
            indices.len()
        )));
    }
    if let Some(&bad) = indices.iter().find(|&&i| i as usize >= palette.len()) {
        return Err(DataError::QuantizerOutput(format!(
            "index {bad} outside palette of {}",
            palette.len()
        )));
    }

    let plte: Vec<u8> = palette
        .iter()
        .flat_map(|&[r, g, b, a]| [unweight(r, a), unweight(g, a), unweight(b, a)])
        .collect();
    let trns: Option<Vec<u8>> = palette
        .iter()
        .rposition(|c| c[3] < u8::MAX)
        .map(|last| palette[..=last].iter().map(|c| c[3]).collect());

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Indexed);
        encoder.set_depth(BitDepth::Eight);
        encoder.set_compression(Compression::Best);
        encoder.set_palette(plte);
        if let Some(trns) = trns {
            encoder.set_trns(trns);
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| DataError::Encode(e.to_string()))?;
        writer
            .write_image_data(indices)
            .map_err(|e| DataError::Encode(e.to_string()))?;
        writer.finish().map_err(|e| DataError::Encode(e.to_string()))?;
    }
    Ok(out)
}
