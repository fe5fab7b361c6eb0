//! Removal of ancillary chunks that browsers do not need to render a PNG.

use crate::core::StripSummary;
use crate::processing::chunk::{ChunkType, PngContainer};
use crate::utils::DataError;

/// Stripped bytes and what was taken out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripped {
    pub data: Vec<u8>,
    pub summary: StripSummary,
}

/// Removes metadata from a whole PNG held in memory.
pub trait MetadataStripper: Send + Sync {
    fn strip(&self, data: &[u8]) -> Result<Stripped, DataError>;
}

/// Ancillary chunks that affect how pixels are displayed or animated.
const RENDERING_CHUNKS: [&[u8; 4]; 10] = [
    b"tRNS", b"gAMA", b"cHRM", b"sRGB", b"iCCP", b"sBIT", b"pHYs", b"acTL", b"fcTL", b"fdAT",
];

/// Keeps critical chunks and the rendering set, drops everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebStripper;

impl WebStripper {
    fn keeps(chunk_type: &ChunkType) -> bool {
        chunk_type.is_critical() || RENDERING_CHUNKS.contains(&chunk_type.as_bytes())
    }
}

impl MetadataStripper for WebStripper {
    fn strip(&self, data: &[u8]) -> Result<Stripped, DataError> {
        let mut png = PngContainer::parse(data).map_err(|e| DataError::Strip(e.to_string()))?;

        let mut summary = StripSummary::default();
        png.retain(|chunk| {
            if Self::keeps(&chunk.chunk_type) {
                return true;
            }
            match chunk.chunk_type {
                ChunkType::TEXT | ChunkType::ZTXT | ChunkType::ITXT => summary.text_chunks += 1,
                ChunkType::TIME => summary.time_chunks += 1,
                ChunkType::EXIF => summary.exif_chunks += 1,
                _ => summary.other_chunks += 1,
            }
            summary.bytes_removed += chunk.encoded_len();
            false
        });

        Ok(Stripped {
            data: png.to_bytes(),
            summary,
        })
    }
}
