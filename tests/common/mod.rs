#![allow(dead_code)]

use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, RgbaImage};
use std::fs;
use std::path::Path;

pub type Rgba = [u8; 4];

/// `w`×`h` image filled with one color
pub fn solid(w: u32, h: u32, px: Rgba) -> RgbaImage {
    RgbaImage::from_pixel(w, h, image::Rgba(px))
}

/// Left half and right half in different colors
pub fn halves(w: u32, h: u32, left: Rgba, right: Rgba) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, _| image::Rgba(if x < w / 2 { left } else { right }))
}

pub fn write_static(path: &Path, image: &RgbaImage) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image.save(path).unwrap();
}

/// Writes an animated WebP with full-canvas, non-blended frames
pub fn write_animated(path: &Path, frames: &[(RgbaImage, u32)]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, animated_webp(frames)).unwrap();
}

pub fn animated_webp(frames: &[(RgbaImage, u32)]) -> Vec<u8> {
    let (w, h) = frames[0].0.dimensions();

    let mut vp8x = vec![0x10 | 0x02, 0, 0, 0];
    vp8x.extend_from_slice(&u24(w - 1));
    vp8x.extend_from_slice(&u24(h - 1));

    let mut body = b"WEBP".to_vec();
    chunk(&mut body, b"VP8X", &vp8x);
    // white background, loop forever
    chunk(&mut body, b"ANIM", &[255, 255, 255, 255, 0, 0]);

    for (image, duration_ms) in frames {
        let mut anmf = Vec::new();
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(0));
        anmf.extend_from_slice(&u24(image.width() - 1));
        anmf.extend_from_slice(&u24(image.height() - 1));
        anmf.extend_from_slice(&u24(*duration_ms));
        anmf.push(0b10);
        anmf.extend_from_slice(&lossless_chunk(image));
        chunk(&mut body, b"ANMF", &anmf);
    }

    let mut out = b"RIFF".to_vec();
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(&body);
    out
}

/// The complete `VP8L` chunk of a still lossless WebP
fn lossless_chunk(image: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    WebPEncoder::new_lossless(&mut out)
        .encode(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
        .unwrap();
    assert_eq!(b"VP8L", &out[12..16]);
    out[12..].to_vec()
}

fn chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(fourcc);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

fn u24(n: u32) -> [u8; 3] {
    let b = n.to_le_bytes();
    [b[0], b[1], b[2]]
}

/// Every frame of a GIF, decoded as palette indices
pub struct DecodedGif {
    pub palette: Vec<u8>,
    pub frames: Vec<gif::Frame<'static>>,
    pub bytes: Vec<u8>,
}

pub fn read_gif(path: &Path) -> DecodedGif {
    let bytes = fs::read(path).unwrap();
    let mut opts = gif::DecodeOptions::new();
    opts.set_color_output(gif::ColorOutput::Indexed);
    let mut dec = opts.read_info(&bytes[..]).unwrap();
    let palette = dec.global_palette().unwrap().to_vec();
    let mut frames = Vec::new();
    while let Some(frame) = dec.read_next_frame().unwrap() {
        frames.push(frame.clone());
    }
    DecodedGif { palette, frames, bytes }
}

impl DecodedGif {
    pub fn loops_forever(&self) -> bool {
        self.bytes.windows(15).any(|w| &w[..11] == b"NETSCAPE2.0" && w[11..15] == [3, 1, 0, 0])
    }
}
