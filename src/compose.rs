//! Flattening RGBA frames for a format without partial transparency

use crate::color::WHITE;
use imgref::*;
use rgb::*;
use serde::{Deserialize, Serialize};

/// How alpha is resolved before quantization
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Compositing {
    /// Blend everything over opaque white. The GIF has no transparency.
    #[default]
    Matte,
    /// Blend over `matte`, and mark pixels with alpha ≤ `alpha_threshold` as transparent.
    ///
    /// Pixels above the threshold stay fully opaque, whatever their alpha.
    Transparent { matte: RGB8, alpha_threshold: u8 },
}

/// A flattened frame, ready for quantization
pub struct Composited {
    pub image: ImgVec<RGB8>,
    /// Row-major, `true` where the output must use the transparency index.
    /// Only present in `Compositing::Transparent` mode.
    pub mask: Option<Vec<bool>>,
}

impl Compositing {
    pub fn is_transparent(&self) -> bool {
        matches!(self, Self::Transparent { .. })
    }

    /// Color that frames are flattened onto
    pub fn background(&self) -> RGB8 {
        match *self {
            Self::Matte => WHITE,
            Self::Transparent { matte, .. } => matte,
        }
    }

    pub fn composite(&self, frame: ImgRef<'_, RGBA8>) -> Composited {
        let bg = self.background();
        let (width, height) = (frame.width(), frame.height());
        let image = Img::new_stride(frame.pixels().map(|px| blend(px, bg)).collect(), width, height, width.max(1));

        let mask = match *self {
            Self::Matte => None,
            Self::Transparent { alpha_threshold, .. } => {
                Some(frame.pixels().map(|px| px.a <= alpha_threshold).collect())
            },
        };
        Composited { image, mask }
    }
}

/// `fg` over opaque `bg`, rounded to nearest
#[inline]
fn blend(fg: RGBA8, bg: RGB8) -> RGB8 {
    let a = u16::from(fg.a);
    let mix = |f: u8, b: u8| ((u16::from(f) * a + u16::from(b) * (255 - a) + 127) / 255) as u8;
    RGB8::new(mix(fg.r, bg.r), mix(fg.g, bg.g), mix(fg.b, bg.b))
}
