//! Per-file conversion: decode, flatten, quantize, encode

use crate::encode::write_gif;
use crate::error::*;
use crate::export::{export_frames, ExportOutcome};
use crate::job::{ConversionJob, ExportJob, JobOutcome};
use crate::quantize::{QuantizedFrame, Quantizer};
use crate::source::SourceImage;
use crate::Settings;
use log::{debug, error, info};
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Conversion {
    Converted { frames: usize },
    /// Only one frame, and `Settings::skip_static` is on. Nothing was written.
    SkippedStatic,
}

pub fn convert_file(input: &Path, output: &Path, settings: &Settings) -> ConvResult<Conversion> {
    let source = SourceImage::open(input)?;
    convert_source(&source, output, settings)
}

/// Writes `output` only if every frame was quantized successfully
pub fn convert_source(source: &SourceImage, output: &Path, settings: &Settings) -> ConvResult<Conversion> {
    if !source.is_animated() && settings.skip_static {
        return Ok(Conversion::SkippedStatic);
    }
    let frames = quantize_frames(source, settings)?;
    write_gif(output, &frames, settings.optimize)?;
    Ok(Conversion::Converted { frames: frames.len() })
}

/// All frames, mapped to the palette of the first one
pub fn quantize_frames(source: &SourceImage, settings: &Settings) -> ConvResult<Vec<QuantizedFrame>> {
    let mut quantizer = Quantizer::new(&settings.compositing, settings.dither);
    source.frames()?.map(|frame| {
        let frame = frame?;
        debug!("frame {} {}×{} {}ms", frame.index, frame.image.width(), frame.image.height(), frame.duration_ms);
        let flat = settings.compositing.composite(frame.image.as_ref());
        quantizer.quantize(flat, frame.duration_ms)
    }).collect()
}

/// Converts and logs the result; errors are reported here and not propagated
pub fn run_conversion(job: &ConversionJob) -> JobOutcome {
    match convert_file(&job.input, &job.output, &job.settings) {
        Ok(Conversion::Converted { frames }) => {
            info!("Converted {} -> {} ({} frames)", job.input.display(), job.output.display(), frames);
            JobOutcome::Done
        },
        Ok(Conversion::SkippedStatic) => {
            info!("Skipping static image {}", job.input.display());
            JobOutcome::Skipped
        },
        Err(err) => {
            error!("Failed to convert {}: {}", job.input.display(), err);
            JobOutcome::Failed
        },
    }
}

pub fn run_export(job: &ExportJob) -> JobOutcome {
    let res = SourceImage::open(&job.input)
        .and_then(|source| export_frames(&source, &job.target_dir, job.overwrite, job.include_static));
    match res {
        Ok(ExportOutcome::Exported { frames }) => {
            info!("Exported {} -> {} ({} frames)", job.input.display(), job.target_dir.display(), frames);
            JobOutcome::Done
        },
        Ok(ExportOutcome::SkippedStatic) => {
            info!("Skipping PNG export of static image {}", job.input.display());
            JobOutcome::Skipped
        },
        Ok(ExportOutcome::SkippedExisting) => {
            info!("Frame directory exists, skipping {}", job.target_dir.display());
            JobOutcome::Skipped
        },
        Err(err) => {
            error!("Failed to export frames of {}: {}", job.input.display(), err);
            JobOutcome::Failed
        },
    }
}
