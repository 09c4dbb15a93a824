//! One palette per animation, taken from the first frame

use crate::compose::{Composited, Compositing};
use crate::error::*;
use imagequant::{Attributes, Image, QuantizationResult};
use imgref::*;
use rgb::*;
use std::sync::Arc;

/// Palette slot reserved for transparent pixels in transparent mode
pub const TRANSPARENT_INDEX: u8 = 255;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<RGB8>,
    /// Leading entries that pixels may be mapped to; excludes padding and the reserved slot
    usable: usize,
    transparent: Option<u8>,
}

impl Palette {
    /// All entries, as they're written to the file
    pub fn colors(&self) -> &[RGB8] {
        &self.colors
    }

    /// Entries chosen for the image content
    pub fn usable_colors(&self) -> &[RGB8] {
        &self.colors[..self.usable]
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.transparent
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

/// Palette-indexed frame. All frames of one animation point to the same `Palette`.
#[derive(Debug, Clone)]
pub struct QuantizedFrame {
    pub indices: ImgVec<u8>,
    pub palette: Arc<Palette>,
    /// Pixels forced to the transparency index, if any
    pub mask: Option<Vec<bool>>,
    pub duration_ms: u32,
}

/// The palette of the first frame, and an imagequant result that maps onto its usable entries only
struct FixedPalette {
    palette: Arc<Palette>,
    remapper: QuantizationResult,
}

impl FixedPalette {
    fn remap(&mut self, img: &mut Image<'_>) -> ConvResult<Vec<u8>> {
        let (pal, indices) = self.remapper.remapped(img)?;
        let usable = self.palette.usable_colors();
        if pal.len() == usable.len() && pal.iter().zip(usable).all(|(p, &c)| RGB8::new(p.r, p.g, p.b) == c) {
            return Ok(indices);
        }

        // same colors, different order
        let mut renumber = [0_u8; 256];
        for (old, p) in pal.iter().enumerate() {
            let color = RGB8::new(p.r, p.g, p.b);
            let new = usable.iter().position(|&c| c == color)
                .ok_or_else(|| Error::Quantize(format!("remapping produced {color:?}, which isn't in the palette")))?;
            renumber[old] = new as u8;
        }
        Ok(indices.into_iter().map(|i| renumber[usize::from(i)]).collect())
    }
}

/// Feed frames in display order. The first one decides the palette.
pub struct Quantizer {
    liq: Attributes,
    dither: bool,
    /// Matte color stored at `TRANSPARENT_INDEX`
    reserved: Option<RGB8>,
    fixed: Option<FixedPalette>,
}

impl Quantizer {
    pub fn new(compositing: &Compositing, dither: bool) -> Self {
        Self {
            liq: imagequant::new(),
            dither,
            reserved: compositing.is_transparent().then(|| compositing.background()),
            fixed: None,
        }
    }

    /// `None` until the first frame has been quantized
    pub fn palette(&self) -> Option<&Arc<Palette>> {
        self.fixed.as_ref().map(|f| &f.palette)
    }

    pub fn quantize(&mut self, frame: Composited, duration_ms: u32) -> ConvResult<QuantizedFrame> {
        let Composited { image, mask } = frame;
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(Error::Quantize(format!("frame is {width}×{height}")));
        }
        if let Some(mask) = &mask {
            if mask.len() != width * height {
                return Err(Error::Quantize("transparency mask doesn't match the frame".into()));
            }
        }

        let pixels: Vec<RGBA8> = image.pixels().map(|px| RGBA8::new(px.r, px.g, px.b, 255)).collect();
        let mut img = self.liq.new_image(pixels, width, height, 0.)?;
        let (palette, mut indices) = match &mut self.fixed {
            Some(fixed) => (Arc::clone(&fixed.palette), fixed.remap(&mut img)?),
            None => {
                let (fixed, indices) = self.first_palette(&mut img)?;
                let palette = Arc::clone(&fixed.palette);
                self.fixed = Some(fixed);
                (palette, indices)
            },
        };

        // the mask wins over whatever color the pixel got
        if let (Some(mask), Some(key)) = (&mask, palette.transparent) {
            for (idx, &t) in indices.iter_mut().zip(mask) {
                if t {
                    *idx = key;
                }
            }
        }

        Ok(QuantizedFrame {
            indices: Img::new(indices, width, height),
            palette,
            mask,
            duration_ms,
        })
    }

    fn first_palette(&mut self, img: &mut Image<'_>) -> ConvResult<(FixedPalette, Vec<u8>)> {
        let dithering = if self.dither { 1. } else { 0. };
        self.liq.set_max_colors(if self.reserved.is_some() { 255 } else { 256 })?;
        self.liq.set_quality(0, 100)?;
        let mut res = self.liq.quantize(img)?;
        res.set_dithering_level(dithering)?;
        let (pal, indices) = res.remapped(img)?;

        let mut remapper = QuantizationResult::from_palette(&self.liq, &pal, 0.)?;
        remapper.set_dithering_level(dithering)?;

        let mut colors: Vec<RGB8> = pal.iter().map(|p| RGB8::new(p.r, p.g, p.b)).collect();
        let usable = colors.len();
        let transparent = self.reserved.map(|matte| {
            colors.resize(usize::from(TRANSPARENT_INDEX), RGB8::new(0, 0, 0));
            colors.push(matte);
            TRANSPARENT_INDEX
        });
        log::debug!("first frame palette has {usable} colors");

        let palette = Arc::new(Palette { colors, usable, transparent });
        Ok((FixedPalette { palette, remapper }, indices))
    }
}
