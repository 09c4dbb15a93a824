//! Dumping every frame as a separate PNG, with full alpha

use crate::error::*;
use crate::source::SourceImage;
use std::fs;
use std::path::Path;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported { frames: usize },
    /// Not animated, and static images weren't asked for
    SkippedStatic,
    /// Target directory exists and overwriting is off
    SkippedExisting,
}

/// Writes `0000.png`, `0001.png`, … into `target_dir`.
///
/// With `overwrite` an existing `target_dir` is removed first. On error the
/// directory may be left with some of the frames in it.
pub fn export_frames(source: &SourceImage, target_dir: &Path, overwrite: bool, include_static: bool) -> ConvResult<ExportOutcome> {
    if !source.is_animated() && !include_static {
        return Ok(ExportOutcome::SkippedStatic);
    }

    if target_dir.exists() {
        if !overwrite {
            return Ok(ExportOutcome::SkippedExisting);
        }
        if let Err(err) = fs::remove_dir_all(target_dir) {
            log::warn!("Can't remove old frames in {}: {}", target_dir.display(), err);
        }
    }
    fs::create_dir_all(target_dir).map_err(|e| Error::Export(format!("{}: {}", target_dir.display(), e)))?;

    let mut count = 0;
    for frame in source.frames()? {
        let frame = frame?;
        let path = target_dir.join(format!("{:04}.png", frame.index));
        let (buf, width, height) = frame.image.as_ref().to_contiguous_buf();
        lodepng::encode32_file(&path, &buf[..], width, height)
            .map_err(|e| Error::Export(format!("{}: {}", path.display(), e)))?;
        log::debug!("wrote {}", path.display());
        count += 1;
    }

    if count == 0 {
        return Err(Error::Export(format!("{}: no frames", target_dir.display())));
    }
    Ok(ExportOutcome::Exported { frames: count })
}
