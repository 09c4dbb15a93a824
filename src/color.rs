//! Matte color parsing

use crate::error::*;
use rgb::RGB8;
use std::num::IntErrorKind;

pub const WHITE: RGB8 = RGB8 { r: 255, g: 255, b: 255 };

/// Accepts `#RRGGBB` or `R,G,B` (decimal, clamped to 0-255).
pub fn try_parse_color(s: &str) -> ConvResult<RGB8> {
    let s = s.trim();
    if s.starts_with('#') && s.len() == 7 && s.is_ascii() {
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16);
        if let (Ok(r), Ok(g), Ok(b)) = (channel(1), channel(3), channel(5)) {
            return Ok(RGB8::new(r, g, b));
        }
        return Err(Error::Config(format!("'{s}' has non-hex digits")));
    }

    let parts: Vec<_> = s.split(',').collect();
    if parts.len() != 3 {
        return Err(Error::Config(format!("'{s}' is neither #RRGGBB nor R,G,B")));
    }
    let mut rgb = [0_u8; 3];
    for (out, part) in rgb.iter_mut().zip(parts) {
        *out = match part.trim().parse::<i64>() {
            Ok(v) => v.clamp(0, 255) as u8,
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => 255,
            Err(e) if *e.kind() == IntErrorKind::NegOverflow => 0,
            Err(_) => return Err(Error::Config(format!("'{part}' in '{s}' is not a number"))),
        };
    }
    Ok(RGB8::new(rgb[0], rgb[1], rgb[2]))
}

/// Like `try_parse_color`, but never fails: anything unparseable becomes white.
pub fn parse_color(s: &str) -> RGB8 {
    try_parse_color(s).unwrap_or_else(|err| {
        log::warn!("{err}; using white matte");
        WHITE
    })
}
