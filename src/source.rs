//! Reading animation frames out of WebP files

use crate::error::*;
use image::codecs::webp::WebPDecoder;
use image::{AnimationDecoder, DynamicImage, RgbaImage};
use imgref::*;
use rgb::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Used when a frame has no usable delay of its own
pub const DEFAULT_FRAME_DURATION_MS: u32 = 100;

/// One decoded bitmap of the animation
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: ImgVec<RGBA8>,
    /// Always positive, see `resolve_duration`
    pub duration_ms: u32,
    /// 0..
    pub index: usize,
}

/// Iterator over decoded frames, in display order
pub type Frames<'a> = Box<dyn Iterator<Item = ConvResult<Frame>> + 'a>;

enum Backing {
    File(PathBuf),
    Memory(Vec<(ImgVec<RGBA8>, Option<u32>)>),
}

/// An opened image that may have one or many frames.
///
/// Frames are decoded lazily. Every call to `frames()` starts again from the first frame.
pub struct SourceImage {
    backing: Backing,
    animated: bool,
    default_duration_ms: Option<u32>,
}

impl SourceImage {
    /// Reads the file header. Fails if the file can't be opened or isn't a WebP.
    pub fn open(path: &Path) -> ConvResult<Self> {
        let decoder = open_webp(path)?;
        Ok(Self {
            animated: decoder.has_animation(),
            backing: Backing::File(path.to_owned()),
            default_duration_ms: None,
        })
    }

    /// Wraps already-decoded frames with their own delays (if any) in milliseconds
    pub fn from_frames(frames: Vec<(ImgVec<RGBA8>, Option<u32>)>) -> Self {
        Self {
            animated: frames.len() > 1,
            backing: Backing::Memory(frames),
            default_duration_ms: None,
        }
    }

    /// Delay for frames that don't specify one, before falling back to `DEFAULT_FRAME_DURATION_MS`
    pub fn with_default_duration(mut self, duration_ms: Option<u32>) -> Self {
        self.default_duration_ms = duration_ms;
        self
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path),
            Backing::Memory(_) => None,
        }
    }

    pub fn frames(&self) -> ConvResult<Frames<'_>> {
        let default_ms = self.default_duration_ms;
        match &self.backing {
            Backing::Memory(frames) => Ok(Box::new(frames.iter().enumerate().map(move |(index, (image, ms))| {
                Ok(Frame {
                    image: image.clone(),
                    duration_ms: resolve_duration(ms.map(|ms| (ms, 1)), default_ms),
                    index,
                })
            }))),
            Backing::File(path) => {
                let decoder = open_webp(path)?;
                if !self.animated {
                    let image = DynamicImage::from_decoder(decoder)
                        .map_err(|e| Error::Decode(format!("{}: {}", path.display(), e)))?
                        .into_rgba8();
                    return Ok(Box::new(std::iter::once(Ok(Frame {
                        image: to_imgvec(image),
                        duration_ms: resolve_duration(None, default_ms),
                        index: 0,
                    }))));
                }

                Ok(Box::new(decoder.into_frames().enumerate().map(move |(index, frame)| {
                    let frame = frame.map_err(|e| Error::Decode(format!("{} frame {}: {}", path.display(), index, e)))?;
                    let duration_ms = resolve_duration(Some(frame.delay().numer_denom_ms()), default_ms);
                    Ok(Frame {
                        image: to_imgvec(frame.into_buffer()),
                        duration_ms,
                        index,
                    })
                })))
            },
        }
    }
}

fn open_webp(path: &Path) -> ConvResult<WebPDecoder<BufReader<File>>> {
    let file = File::open(path).map_err(|e| Error::Decode(format!("{}: {}", path.display(), e)))?;
    WebPDecoder::new(BufReader::new(file)).map_err(|e| Error::Decode(format!("{}: {}", path.display(), e)))
}

fn to_imgvec(image: RgbaImage) -> ImgVec<RGBA8> {
    let (width, height) = image.dimensions();
    let pixels = image.into_raw().as_rgba().to_vec();
    ImgVec::new(pixels, width as usize, height as usize)
}

/// Frame delay in whole milliseconds.
///
/// `frame_ms` is the frame's own delay as a `numer/denom` millisecond ratio.
/// A missing frame delay falls back to the source default. Anything
/// zero or fractional ends up as `DEFAULT_FRAME_DURATION_MS`.
pub fn resolve_duration(frame_ms: Option<(u32, u32)>, source_default_ms: Option<u32>) -> u32 {
    let ms = match frame_ms {
        Some((numer, denom)) => (denom != 0 && numer % denom == 0).then(|| numer / denom),
        None => source_default_ms,
    };
    ms.filter(|&ms| ms > 0).unwrap_or(DEFAULT_FRAME_DURATION_MS)
}
