//! GIF writing with the `gif` crate

use crate::error::*;
use crate::quantize::QuantizedFrame;
use rgb::*;
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Writes frames sharing one global palette. Loops forever.
pub(crate) struct RustEncoder<W: Write> {
    gif_enc: gif::Encoder<W>,
    transparent: Option<u8>,
    frames: usize,
}

impl<W: Write> RustEncoder<W> {
    pub fn new(writer: W, width: u16, height: u16, palette: &[RGB8], transparent: Option<u8>) -> ConvResult<Self> {
        let mut pal_rgb = Vec::with_capacity(3 * palette.len());
        for p in palette {
            pal_rgb.extend_from_slice(&[p.r, p.g, p.b]);
        }
        let mut gif_enc = gif::Encoder::new(writer, width, height, &pal_rgb)?;
        gif_enc.set_repeat(gif::Repeat::Infinite)?;
        Ok(Self { gif_enc, transparent, frames: 0 })
    }

    pub fn write_frame(&mut self, indices: &[u8], width: u16, height: u16, duration_ms: u32) -> ConvResult<()> {
        self.gif_enc.write_frame(&gif::Frame {
            delay: (duration_ms / 10).min(u16::MAX.into()) as u16,
            // clear the canvas between frames, so that transparent areas don't show the previous frame
            dispose: gif::DisposalMethod::Background,
            transparent: self.transparent,
            width,
            height,
            buffer: Cow::Borrowed(indices),
            ..gif::Frame::default()
        })?;
        self.frames += 1;
        Ok(())
    }

    /// Writes the trailer
    pub fn finish(self) -> ConvResult<()> {
        if self.frames == 0 {
            return Err(Error::NoFrames);
        }
        self.gif_enc.into_inner().map_err(|e| Error::Encode(e.to_string()))?;
        Ok(())
    }
}

/// Encodes a whole animation in memory.
///
/// Loops forever. With `optimize`, unused palette entries are dropped
/// (unless the palette has a transparency key, which must stay at its index).
pub fn encode_gif(frames: &[QuantizedFrame], optimize: bool) -> ConvResult<Vec<u8>> {
    let first = frames.first().ok_or(Error::NoFrames)?;
    let (width, height) = (first.indices.width(), first.indices.height());
    let screen_width = u16::try_from(width).map_err(|_| Error::Encode(format!("{width}×{height} is too large for GIF")))?;
    let screen_height = u16::try_from(height).map_err(|_| Error::Encode(format!("{width}×{height} is too large for GIF")))?;

    let palette = &first.palette;
    let transparent = palette.transparent_index();
    let (colors, renumber) = if optimize && transparent.is_none() {
        compact_palette(frames, palette.colors())
    } else {
        (palette.colors().to_vec(), None)
    };

    let mut out = Vec::new();
    let mut enc = RustEncoder::new(&mut out, screen_width, screen_height, &colors, transparent)?;
    let mut buf = Vec::new();
    for (n, frame) in frames.iter().enumerate() {
        if frame.indices.width() != width || frame.indices.height() != height {
            return Err(Error::WrongSize(format!("Frame {} has wrong size ({}×{}, expected {}×{})", n,
                frame.indices.width(), frame.indices.height(), width, height)));
        }
        let indices = match &renumber {
            Some(map) => {
                buf.clear();
                buf.extend(frame.indices.buf().iter().map(|&i| map[usize::from(i)]));
                &buf[..]
            },
            None => &frame.indices.buf()[..],
        };
        enc.write_frame(indices, screen_width, screen_height, frame.duration_ms)?;
    }
    enc.finish()?;
    Ok(out)
}

/// Keeps only referenced entries, in their original order.
///
/// Returns the new palette and an old→new index map (`None` if nothing was dropped).
fn compact_palette(frames: &[QuantizedFrame], colors: &[RGB8]) -> (Vec<RGB8>, Option<[u8; 256]>) {
    let mut used = [false; 256];
    for frame in frames {
        for &i in frame.indices.buf().iter() {
            used[usize::from(i)] = true;
        }
    }

    let mut map = [0_u8; 256];
    let mut compact = Vec::with_capacity(colors.len());
    for (old, &color) in colors.iter().enumerate() {
        if used[old] {
            map[old] = compact.len() as u8;
            compact.push(color);
        }
    }

    if compact.len() == colors.len() {
        (compact, None)
    } else {
        log::debug!("palette reduced from {} to {} colors", colors.len(), compact.len());
        (compact, Some(map))
    }
}

/// Encodes the frames and replaces `dst` in one step.
///
/// Missing parent directories are created. Nothing is written to `dst` if encoding fails.
pub fn write_gif(dst: &Path, frames: &[QuantizedFrame], optimize: bool) -> ConvResult<()> {
    let data = encode_gif(frames, optimize)?;

    let dir = match dst.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let write_err = |e: std::io::Error| Error::Encode(format!("Can't write {}: {}", dst.display(), e));
    fs::create_dir_all(dir).map_err(write_err)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(&data).map_err(write_err)?;
    tmp.persist(dst).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::Compositing;
    use crate::quantize::{Quantizer, TRANSPARENT_INDEX};
    use imgref::*;

    fn quantized(comp: Compositing, frames: &[ImgVec<RGBA8>]) -> Vec<QuantizedFrame> {
        let mut q = Quantizer::new(&comp, false);
        frames.iter().map(|f| q.quantize(comp.composite(f.as_ref()), 120).unwrap()).collect()
    }

    fn solid(px: RGBA8) -> ImgVec<RGBA8> {
        Img::new(vec![px; 12], 4, 3)
    }

    fn decode(data: &[u8]) -> (Option<Vec<u8>>, Vec<(gif::DisposalMethod, Option<u8>, u16, Vec<u8>)>) {
        let mut opts = gif::DecodeOptions::new();
        opts.set_color_output(gif::ColorOutput::Indexed);
        let mut dec = opts.read_info(data).unwrap();
        let pal = dec.global_palette().map(|p| p.to_vec());
        let mut frames = Vec::new();
        while let Some(f) = dec.read_next_frame().unwrap() {
            frames.push((f.dispose, f.transparent, f.delay, f.buffer.to_vec()));
        }
        (pal, frames)
    }

    fn loops_forever(data: &[u8]) -> bool {
        let tag = b"NETSCAPE2.0";
        data.windows(tag.len() + 4)
            .any(|w| w.starts_with(tag) && w[tag.len()..] == [3, 1, 0, 0])
    }

    #[test]
    fn matte_animation() {
        let red = RGBA8::new(255, 0, 0, 255);
        let blue = RGBA8::new(0, 0, 255, 255);
        let white = RGBA8::new(255, 255, 255, 255);
        let first = Img::new([red, blue, white].iter().flat_map(|&px| [px; 4]).collect(), 4, 3);
        let frames = quantized(Compositing::Matte, &[first, solid(blue), solid(RGBA8::new(0, 0, 0, 0))]);
        let data = encode_gif(&frames, true).unwrap();
        assert!(loops_forever(&data));

        let (pal, decoded) = decode(&data);
        let pal = pal.unwrap();
        assert_eq!(3, decoded.len());
        for (dispose, transparent, delay, _) in &decoded {
            assert_eq!(gif::DisposalMethod::Background, *dispose);
            assert_eq!(None, *transparent);
            assert_eq!(12, *delay);
        }
        // fully transparent pixels were flattened onto white
        let i = usize::from(decoded[2].3[0]) * 3;
        assert!(pal[i..i + 3].iter().all(|&c| c >= 250), "{:?}", &pal[i..i + 3]);
    }

    #[test]
    fn transparent_key_is_kept() {
        let comp = Compositing::Transparent { matte: RGB8::new(0, 0, 0), alpha_threshold: 0 };
        let frames = quantized(comp, &[solid(RGBA8::new(0, 200, 0, 255)), solid(RGBA8::new(0, 0, 0, 0))]);
        for optimize in [true, false] {
            let (pal, decoded) = decode(&encode_gif(&frames, optimize).unwrap());
            assert_eq!(256 * 3, pal.unwrap().len());
            assert_eq!(Some(TRANSPARENT_INDEX), decoded[1].1);
            assert!(decoded[1].3.iter().all(|&i| i == TRANSPARENT_INDEX));
            assert!(decoded[0].3.iter().all(|&i| i != TRANSPARENT_INDEX));
        }
    }

    #[test]
    fn optimize_drops_unused_colors() {
        let mut frames = quantized(Compositing::Matte, &[Img::new(
            vec![RGBA8::new(255, 0, 0, 255), RGBA8::new(0, 255, 0, 255), RGBA8::new(0, 0, 255, 255), RGBA8::new(9, 9, 9, 255)], 2, 2)]);
        let colors = frames[0].palette.colors().to_vec();
        assert_eq!(colors, compact_palette(&frames, &colors).0);

        // nothing uses the first pixel's entry anymore
        let drop_idx = frames[0].indices.buf()[0];
        let keep_idx = frames[0].indices.buf()[1];
        assert_ne!(drop_idx, keep_idx);
        for i in frames[0].indices.buf_mut().iter_mut() {
            if *i == drop_idx {
                *i = keep_idx;
            }
        }

        let (compact, map) = compact_palette(&frames, &colors);
        let map = map.unwrap();
        assert_eq!(colors.len() - 1, compact.len());
        assert!(!compact.contains(&colors[usize::from(drop_idx)]));
        assert_eq!(colors[usize::from(keep_idx)], compact[usize::from(map[usize::from(keep_idx)])]);

        let (_, decoded) = decode(&encode_gif(&frames, true).unwrap());
        assert!(decoded[0].3.iter().all(|&i| usize::from(i) < compact.len()));
    }

    #[test]
    fn no_frames() {
        assert!(matches!(encode_gif(&[], true), Err(Error::NoFrames)));
    }

    #[test]
    fn mismatched_sizes() {
        let mut frames = quantized(Compositing::Matte, &[solid(RGBA8::new(1, 2, 3, 255)), solid(RGBA8::new(1, 2, 3, 255))]);
        frames[1].indices = Img::new(vec![0; 4], 2, 2);
        assert!(matches!(encode_gif(&frames, true), Err(Error::WrongSize(_))));
    }

    #[test]
    fn writes_into_new_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("a/b/out.gif");
        let frames = quantized(Compositing::Matte, &[solid(RGBA8::new(1, 2, 3, 255))]);
        write_gif(&dst, &frames, true).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), encode_gif(&frames, true).unwrap());
        assert_eq!(1, fs::read_dir(dst.parent().unwrap()).unwrap().count());

        assert!(write_gif(&dir.path().join("empty.gif"), &[], true).is_err());
        assert!(!dir.path().join("empty.gif").exists());
    }

    #[test]
    fn unwritable_destination_is_encode_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"").unwrap();
        let frames = quantized(Compositing::Matte, &[solid(RGBA8::new(1, 2, 3, 255))]);
        let res = write_gif(&blocker.join("out.gif"), &frames, true);
        assert!(matches!(res, Err(Error::Encode(ref msg)) if msg.contains("out.gif")), "{res:?}");
    }

    #[test]
    fn encoder_needs_a_frame() {
        let mut out = Vec::new();
        let enc = RustEncoder::new(&mut out, 2, 2, &[RGB8::new(0, 0, 0)], None).unwrap();
        assert!(matches!(enc.finish(), Err(Error::NoFrames)));

        let mut out = Vec::new();
        let mut enc = RustEncoder::new(&mut out, 2, 2, &[RGB8::new(0, 0, 0), RGB8::new(9, 9, 9)], None).unwrap();
        enc.write_frame(&[0, 1, 1, 0], 2, 2, 30).unwrap();
        enc.finish().unwrap();
        assert_eq!(Some(&0x3B), out.last());
    }
}
