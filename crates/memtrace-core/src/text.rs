//! Text rasterization into an off-screen alpha buffer.
//!
//! Lines are drawn with the built-in 8×8 bitmap font, left-aligned, one line
//! per fixed vertical step. Only coverage matters here: a lit glyph pixel is
//! written as full alpha, everything else stays 0.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{GrayImage, Luma};

/// Glyph cell edge in font pixels.
pub const GLYPH_SIZE: u32 = 8;

/// Largest glyph magnification; larger layout scales are clamped to it.
pub const MAX_TEXT_SCALE: u32 = 64;

const COVERED: Luma<u8> = Luma([255]);

/// Where lines go on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLayout {
    /// Baseline of the first line, from the top edge.
    pub top_margin: u32,
    /// Baseline-to-baseline distance.
    pub line_step: u32,
    /// Integer magnification of the 8×8 glyphs.
    pub scale: u32,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            top_margin: 20,
            line_step: 15,
            scale: 1,
        }
    }
}

impl TextLayout {
    fn effective_scale(&self) -> u32 {
        self.scale.clamp(1, MAX_TEXT_SCALE)
    }

    fn cell(&self) -> u32 {
        GLYPH_SIZE * self.effective_scale()
    }

    /// Baseline y of line `i`.
    pub fn baseline(&self, i: usize) -> u64 {
        self.top_margin as u64 + i as u64 * self.line_step as u64
    }
}

/// Bitmap for `c`, one byte per row, least significant bit leftmost.
pub fn glyph(c: char) -> Option<[u8; 8]> {
    let c = match c {
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201c}' | '\u{201d}' => '"',
        '\u{2013}' | '\u{2014}' => '-',
        other => other,
    };
    BASIC_FONTS
        .get(c)
        .or_else(|| LATIN_FONTS.get(c))
}

/// Clear `buffer` and draw `lines` into it per `layout`.
///
/// Glyphs sit on the line's baseline; anything past the buffer edges is
/// clipped.
pub fn render_lines_into<S: AsRef<str>>(buffer: &mut GrayImage, lines: &[S], layout: &TextLayout) {
    for p in buffer.pixels_mut() {
        *p = Luma([0]);
    }

    let (width, height) = buffer.dimensions();
    let scale = layout.effective_scale();
    let cell = layout.cell();

    for (i, line) in lines.iter().enumerate() {
        let top = layout.baseline(i) as i64 - cell as i64;
        if top >= height as i64 {
            break;
        }

        for (col, c) in line.as_ref().chars().enumerate() {
            let left = col as u64 * cell as u64;
            if left >= width as u64 {
                break;
            }
            let Some(bitmap) = glyph(c) else {
                continue;
            };
            draw_glyph(buffer, &bitmap, left as u32, top, scale);
        }
    }
}

/// Allocate a `width × height` alpha buffer holding `lines`.
pub fn render_lines<S: AsRef<str>>(lines: &[S], width: u32, height: u32, layout: &TextLayout) -> GrayImage {
    let mut buffer = GrayImage::new(width, height);
    render_lines_into(&mut buffer, lines, layout);
    buffer
}

fn draw_glyph(buffer: &mut GrayImage, bitmap: &[u8; 8], left: u32, top: i64, scale: u32) {
    let (width, height) = buffer.dimensions();

    for (row, &bits) in bitmap.iter().enumerate() {
        if bits == 0 {
            continue;
        }
        for col in 0..GLYPH_SIZE {
            if bits & (1u8 << col) == 0 {
                continue;
            }
            for dy in 0..scale {
                let y = top + (row as u32 * scale + dy) as i64;
                if y < 0 || y >= height as i64 {
                    continue;
                }
                for dx in 0..scale {
                    let x = left as u64 + (col * scale + dx) as u64;
                    if x >= width as u64 {
                        break;
                    }
                    buffer.put_pixel(x as u32, y as u32, COVERED);
                }
            }
        }
    }
}
