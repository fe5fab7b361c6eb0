use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::core::{
    LightFileComment, MaybeInf, OptimizationResult, OptimizerConfig, QualityLevel, QuantizeOutcome,
    StripOutcome, TOOL_NAME,
};
use crate::processing::chunk::PngContainer;
use crate::processing::color::{Prepared, prepare_rgba};
use crate::processing::comment::{build_comment, find_comment, write_comment};
use crate::processing::psnr::png_psnr;
use crate::processing::quantize::{NeuQuantizer, Quantizer, encode_indexed};
use crate::processing::strip::{MetadataStripper, WebStripper};
use crate::utils::{
    DataError, LogSink, OptimizerError, OptimizerResult, TracingSink, format_bytes, get_file_size,
    read_file, reduction_percent, write_file,
};

/// Runs the PNG optimization pipeline.
///
/// Holds no per-run state: clones share their collaborators and may run
/// concurrently on different files.
#[derive(Clone)]
pub struct Optimizer {
    quality: QualityLevel,
    inspection_floor: f64,
    quantizer: Arc<dyn Quantizer>,
    stripper: Arc<dyn MetadataStripper>,
    sink: Option<Arc<dyn LogSink>>,
}

impl fmt::Debug for Optimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Optimizer")
            .field("quality", &self.quality)
            .field("inspection_floor", &self.inspection_floor)
            .field("logging", &self.sink.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::from_config(&OptimizerConfig::default())
    }
}

impl Optimizer {
    pub fn new(quality: QualityLevel) -> Self {
        Self::from_config(&OptimizerConfig {
            quality,
            ..OptimizerConfig::default()
        })
    }

    /// NeuQuant engine, web stripper, messages forwarded to `tracing`.
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self {
            quality: config.quality,
            inspection_floor: config.inspection_floor,
            quantizer: Arc::new(NeuQuantizer::default()),
            stripper: Arc::new(WebStripper),
            sink: Some(Arc::new(TracingSink)),
        }
    }

    pub fn with_quality(mut self, quality: QualityLevel) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_quantizer(mut self, quantizer: Arc<dyn Quantizer>) -> Self {
        self.quantizer = quantizer;
        self
    }

    pub fn with_stripper(mut self, stripper: Arc<dyn MetadataStripper>) -> Self {
        self.stripper = stripper;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Drops every pipeline message.
    pub fn without_logging(mut self) -> Self {
        self.sink = None;
        self
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    /// Optimizes `src` into `dest`.
    ///
    /// Nothing is written unless the run ends in the optimized state. The
    /// destination's parent directory must exist.
    pub fn run(&self, src: impl AsRef<Path>, dest: impl AsRef<Path>) -> OptimizerResult<OptimizationResult> {
        let dest = dest.as_ref();
        let data = read_file(src).inspect_err(|e| self.error(format_args!("Failed to read PNG file: {e}")))?;

        let (mut result, output) = self.optimize_bytes(data)?;
        let Some(output) = output else {
            return Ok(result);
        };

        self.debug(format_args!("Writing optimized PNG"));
        write_file(dest, &output)
            .inspect_err(|e| self.error(format_args!("Failed to write optimized PNG: {e}")))?;
        result.after_size = get_file_size(dest)
            .inspect_err(|e| self.error(format_args!("Failed to stat destination file: {e}")))?;

        self.info(format_args!(
            "Optimization completed: {} -> {} ({:.1}% reduction), PSNR: {} dB, PNGQuant: {}",
            format_bytes(result.before_size),
            format_bytes(result.after_size),
            reduction_percent(result.before_size, result.after_size),
            result.final_psnr.unwrap_or_default(),
            result.quantize.applied(),
        ));
        Ok(result)
    }

    /// Runs every in-memory step on `original`.
    ///
    /// Returns the result and, when the run ends optimized, the bytes to
    /// commit.
    pub fn optimize_bytes(&self, original: Vec<u8>) -> OptimizerResult<(OptimizationResult, Option<Vec<u8>>)> {
        self.info(format_args!("Starting PNG optimization (quality: {})", self.quality));
        let mut result = OptimizationResult {
            before_size: original.len() as u64,
            ..Default::default()
        };

        let png = PngContainer::parse(&original)
            .map_err(|e| self.data_error("failed to read PNG comment", e))?;
        if let Some(by) = find_comment(&png).as_ref().and_then(|c| c.optimized_by()) {
            self.info(format_args!("Already optimized by {by}, skipping"));
            result.already_optimized = true;
            result.already_optimized_by = Some(by.to_string());
            return Ok((result, None));
        }

        let mut working = match self.stripper.strip(&original) {
            Ok(stripped) => {
                self.debug(format_args!(
                    "Stripped metadata - size: {} -> {}",
                    format_bytes(result.before_size),
                    format_bytes(stripped.data.len() as u64)
                ));
                result.strip = StripOutcome::Applied(stripped.summary);
                stripped.data
            }
            Err(e) => {
                self.warn(format_args!("Failed to strip metadata: {e}"));
                result.strip = StripOutcome::Failed(e);
                original.clone()
            }
        };
        result.size_after_strip = working.len() as u64;

        match self.quantize(&working) {
            Ok(None) => {
                self.debug(format_args!("Image is already indexed, skipping quantization"));
            }
            Ok(Some(quantized)) => match png_psnr(&working, &quantized) {
                Ok(score) if self.quality.accepts(score) => {
                    self.debug(format_args!(
                        "Applied PNGQuant - PSNR: {} dB, size: {}",
                        MaybeInf(score),
                        format_bytes(quantized.len() as u64)
                    ));
                    result.quantize = QuantizeOutcome::Applied { psnr: MaybeInf(score) };
                    working = quantized;
                }
                Ok(score) => {
                    self.debug(format_args!(
                        "Rejected PNGQuant - PSNR: {} (below threshold for quality: {})",
                        MaybeInf(score),
                        self.quality
                    ));
                    result.quantize = QuantizeOutcome::Rejected { psnr: MaybeInf(score) };
                }
                Err(e) => {
                    self.warn(format_args!("Failed to calculate PSNR after quantization: {e}"));
                    result.quantize = QuantizeOutcome::Failed { error: e };
                }
            },
            Err(e) => {
                self.warn(format_args!("Failed to quantize: {e}"));
                result.quantize = QuantizeOutcome::Failed { error: e };
            }
        }
        result.size_after_quantize = working.len() as u64;

        let final_psnr = png_psnr(&original, &working)
            .map_err(|e| self.data_error("failed to calculate final PSNR", e))?;
        result.final_psnr = Some(MaybeInf(final_psnr));

        let comment = LightFileComment {
            by: TOOL_NAME.to_string(),
            before: result.before_size as i64,
            after: working.len() as i64,
            pngquant: result.quantize.applied(),
            psnr: MaybeInf(final_psnr),
        };
        let (text, cost) =
            build_comment(&comment).map_err(|e| self.data_error("failed to build comment", e))?;

        let final_size = working.len() as u64 + cost as u64;
        if final_size >= result.before_size {
            self.info(format_args!(
                "Cannot optimize: final size ({}) >= original size ({})",
                format_bytes(final_size),
                format_bytes(result.before_size)
            ));
            result.cant_optimize = true;
            return Ok((result, None));
        }

        let commented =
            write_comment(&working, &text).map_err(|e| self.data_error("failed to write comment", e))?;

        if final_psnr != f64::INFINITY && final_psnr < self.inspection_floor {
            self.warn(format_args!(
                "PSNR inspection failed: {:.2} dB < {:.2} dB",
                final_psnr, self.inspection_floor
            ));
            result.inspection_failed = true;
            return Ok((result, None));
        }

        Ok((result, Some(commented)))
    }

    /// Re-encodes `data` through the quantizer. `None` when already indexed.
    fn quantize(&self, data: &[u8]) -> Result<Option<Vec<u8>>, DataError> {
        let buffer = match prepare_rgba(data)? {
            Prepared::AlreadyIndexed => return Ok(None),
            Prepared::Rgba(buffer) => buffer,
        };
        let quantized = self.quantizer.quantize(&buffer)?;
        encode_indexed(buffer.width, buffer.height, &quantized).map(Some)
    }

    fn data_error(&self, context: &str, source: DataError) -> OptimizerError {
        self.error(format_args!("{context}: {source}"));
        OptimizerError::data(context, source)
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink.debug(args);
        }
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink.info(args);
        }
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink.warn(args);
        }
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.sink {
            sink.error(args);
        }
    }
}

/// Optimizes `src` into `dest` with the default collaborators.
///
/// `quality` is `"high"`, `"low"`, `"force"`, or anything else for the
/// default level.
pub fn optimize(src: impl AsRef<Path>, dest: impl AsRef<Path>, quality: &str) -> OptimizerResult<OptimizationResult> {
    Optimizer::new(QualityLevel::from(quality)).run(src, dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StripSummary;
    use crate::processing::color::RgbaBuffer;
    use crate::processing::quantize::Quantized;
    use crate::processing::strip::Stripped;
    use crate::utils::QuantizeError;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::Mutex;

    struct FailingStripper;

    impl MetadataStripper for FailingStripper {
        fn strip(&self, _data: &[u8]) -> Result<Stripped, DataError> {
            Err(DataError::Strip("refused".into()))
        }
    }

    struct FailingQuantizer(QuantizeError);

    impl Quantizer for FailingQuantizer {
        fn quantize(&self, _image: &RgbaBuffer) -> Result<Quantized, QuantizeError> {
            Err(self.0)
        }
    }

    /// Lossless for images with at most 256 distinct colours.
    struct ExactQuantizer;

    impl Quantizer for ExactQuantizer {
        fn quantize(&self, image: &RgbaBuffer) -> Result<Quantized, QuantizeError> {
            let mut palette: Vec<[u8; 4]> = Vec::new();
            let mut indices = Vec::with_capacity(image.pixel_count());
            for px in image.pixels.chunks_exact(4) {
                let color = [px[0], px[1], px[2], px[3]];
                let index = match palette.iter().position(|c| *c == color) {
                    Some(i) => i,
                    None if palette.len() < 256 => {
                        palette.push(color);
                        palette.len() - 1
                    }
                    None => return Err(QuantizeError::QualityTooLow),
                };
                indices.push(index as u8);
            }
            Ok(Quantized { palette, indices })
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    impl RecordingSink {
        fn push(&self, level: &str, args: fmt::Arguments<'_>) {
            self.0.lock().unwrap().push(format!("{level}: {args}"));
        }
    }

    impl LogSink for RecordingSink {
        fn debug(&self, args: fmt::Arguments<'_>) {
            self.push("debug", args);
        }
        fn info(&self, args: fmt::Arguments<'_>) {
            self.push("info", args);
        }
        fn warn(&self, args: fmt::Arguments<'_>) {
            self.push("warn", args);
        }
        fn error(&self, args: fmt::Arguments<'_>) {
            self.push("error", args);
        }
    }

    /// Four-colour RGBA image padded with a large text chunk.
    fn padded_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(32, 32, |x, y| match (x / 16, y / 16) {
            (0, 0) => Rgba([255, 0, 0, 255]),
            (1, 0) => Rgba([0, 255, 0, 255]),
            (0, 1) => Rgba([0, 0, 255, 128]),
            _ => Rgba([255, 255, 255, 0]),
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img).write_to(&mut out, ImageFormat::Png).unwrap();
        let mut png = PngContainer::parse(out.get_ref()).unwrap();
        png.insert_before_end(crate::processing::chunk::Chunk::text("Comment", &"x".repeat(4096)));
        png.to_bytes()
    }

    fn quiet() -> Optimizer {
        Optimizer::default().without_logging()
    }

    #[test]
    fn exact_quantization_is_applied() {
        let optimizer = quiet().with_quantizer(Arc::new(ExactQuantizer));
        let original = padded_png();
        let (result, output) = optimizer.optimize_bytes(original.clone()).unwrap();

        assert_eq!(result.before_size, original.len() as u64);
        assert_eq!(result.strip.summary().map(StripSummary::total), Some(1));
        assert_eq!(result.quantize, QuantizeOutcome::Applied { psnr: MaybeInf::INFINITY });
        assert_eq!(result.final_psnr, Some(MaybeInf::INFINITY));
        assert!(result.size_after_strip < result.before_size);

        let output = output.unwrap();
        let comment = crate::processing::comment::read_comment(&output).unwrap().unwrap();
        let record = comment.parsed.unwrap();
        assert_eq!(record.by, TOOL_NAME);
        assert_eq!(record.after, result.size_after_quantize as i64);
        assert!(record.pngquant);
        assert!(record.psnr.is_infinite());
    }

    #[test]
    fn output_is_never_reprocessed() {
        let optimizer = quiet().with_quantizer(Arc::new(ExactQuantizer));
        let (_, output) = optimizer.optimize_bytes(padded_png()).unwrap();
        let (again, none) = optimizer.optimize_bytes(output.unwrap()).unwrap();
        assert!(again.already_optimized);
        assert_eq!(again.already_optimized_by.as_deref(), Some(TOOL_NAME));
        assert_eq!(again.size_after_strip, 0);
        assert!(none.is_none());
    }

    #[test]
    fn strip_failure_is_recorded_and_run_continues() {
        let optimizer = quiet()
            .with_stripper(Arc::new(FailingStripper))
            .with_quantizer(Arc::new(ExactQuantizer));
        let original = padded_png();
        let (result, _) = optimizer.optimize_bytes(original.clone()).unwrap();
        assert_eq!(result.strip.error(), Some(&DataError::Strip("refused".into())));
        assert_eq!(result.size_after_strip, original.len() as u64);
        assert!(result.quantize.applied());
    }

    #[test]
    fn quantizer_failure_is_recorded_and_run_continues() {
        let optimizer = quiet().with_quantizer(Arc::new(FailingQuantizer(QuantizeError::Aborted)));
        let (result, output) = optimizer.optimize_bytes(padded_png()).unwrap();
        assert_eq!(
            result.quantize.error(),
            Some(&DataError::Quantize(QuantizeError::Aborted))
        );
        assert_eq!(result.size_after_quantize, result.size_after_strip);
        assert_eq!(result.final_psnr, Some(MaybeInf::INFINITY));
        // Stripping alone removed enough to pay for the record.
        assert!(output.is_some());
    }

    #[test]
    fn corrupted_input_is_data_error() {
        let err = quiet().optimize_bytes(b"definitely not a png".to_vec()).unwrap_err();
        assert!(err.is_data_error());
        assert_eq!(err.as_data_error(), Some(&DataError::InvalidSignature));
    }

    #[test]
    fn sink_receives_messages() {
        let sink = Arc::new(RecordingSink::default());
        let optimizer = Optimizer::new(QualityLevel::High)
            .with_quantizer(Arc::new(FailingQuantizer(QuantizeError::OutOfMemory)))
            .with_sink(sink.clone());
        optimizer.optimize_bytes(padded_png()).unwrap();

        let lines = sink.0.lock().unwrap();
        assert_eq!(lines[0], "info: Starting PNG optimization (quality: high)");
        assert!(lines.iter().any(|l| l.starts_with("debug: Stripped metadata")));
        assert!(lines.iter().any(|l| l.starts_with("warn: Failed to quantize") && l.contains("code 101")));
    }

    #[test]
    fn clones_are_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<Optimizer>();
    }
}
