//! The PNG optimization pipeline and its building blocks.

pub mod chunk;
pub mod color;
pub mod comment;
mod optimizer;
pub mod psnr;
pub mod quantize;
pub mod strip;

pub use chunk::{Chunk, ChunkType, PngContainer};
pub use color::{Prepared, RgbaBuffer, prepare_rgba};
pub use comment::{EmbeddedComment, build_comment, read_comment, write_comment};
pub use optimizer::{Optimizer, optimize};
pub use psnr::{png_psnr, psnr};
pub use quantize::{NeuQuantizer, Quantized, Quantizer, encode_indexed};
pub use strip::{MetadataStripper, Stripped, WebStripper};
