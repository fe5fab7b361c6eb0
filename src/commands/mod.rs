//! Host-level command handlers.
//!
//! - [`optimize_image`]: Optimize a single image
//! - [`optimize_images`]: Batch optimize multiple images with bounded concurrency

mod image;

pub use image::*;
