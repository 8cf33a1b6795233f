//! Text-mask compositing.
//!
//! Each tick the camera frame is cover-scaled onto the canvas, the current
//! lines are rasterized into an alpha buffer of the same size, and every canvas
//! pixel not covered by a glyph is made fully transparent. The video stays
//! visible only through the letter shapes.

use image::{GrayImage, Rgba, RgbImage, RgbaImage};
use thiserror::Error;

use crate::text::{render_lines_into, TextLayout};

const BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CompositeError {
    #[error("mask is {mask_width}x{mask_height} but frame is {frame_width}x{frame_height}")]
    DimensionMismatch {
        frame_width: u32,
        frame_height: u32,
        mask_width: u32,
        mask_height: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

impl CanvasSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Uniform scale that makes a `video_w × video_h` frame cover the canvas.
///
/// Returns 0.0 for an empty frame.
pub fn cover_scale(video_w: u32, video_h: u32, canvas: CanvasSize) -> f32 {
    if video_w == 0 || video_h == 0 {
        return 0.0;
    }
    let sx = canvas.width as f32 / video_w as f32;
    let sy = canvas.height as f32 / video_h as f32;
    sx.max(sy)
}

/// Source index sampled by destination pixel `dst` (nearest neighbour).
fn source_coord(dst: u32, offset: f32, scale: f32, len: u32) -> u32 {
    let src = ((dst as f32 + 0.5 - offset) / scale).floor();
    (src.max(0.0) as u32).min(len - 1)
}

/// Draw `video` into `canvas`, scaled to cover it and centered.
///
/// An empty frame leaves the canvas fully transparent.
pub fn draw_cover(canvas: &mut RgbaImage, video: &RgbImage) {
    let (cw, ch) = canvas.dimensions();
    let (vw, vh) = video.dimensions();
    if vw == 0 || vh == 0 {
        for p in canvas.pixels_mut() {
            *p = TRANSPARENT;
        }
        return;
    }

    let scale = cover_scale(vw, vh, CanvasSize::new(cw, ch));
    let offset_x = (cw as f32 - vw as f32 * scale) / 2.0;
    let offset_y = (ch as f32 - vh as f32 * scale) / 2.0;

    let columns: Vec<u32> = (0..cw).map(|x| source_coord(x, offset_x, scale, vw)).collect();

    for y in 0..ch {
        let sy = source_coord(y, offset_y, scale, vh);
        for (x, &sx) in columns.iter().enumerate() {
            let [r, g, b] = video.get_pixel(sx, sy).0;
            canvas.put_pixel(x as u32, y, Rgba([r, g, b, 255]));
        }
    }
}

/// Hide every pixel of `frame` whose mask alpha is zero; leave the rest as is.
pub fn apply_mask_in_place(frame: &mut RgbaImage, mask: &GrayImage) -> Result<(), CompositeError> {
    if frame.dimensions() != mask.dimensions() {
        return Err(CompositeError::DimensionMismatch {
            frame_width: frame.width(),
            frame_height: frame.height(),
            mask_width: mask.width(),
            mask_height: mask.height(),
        });
    }

    for (pixel, coverage) in frame.pixels_mut().zip(mask.pixels()) {
        if coverage.0[0] == 0 {
            pixel.0[3] = 0;
        }
    }
    Ok(())
}

/// Pure form of [`apply_mask_in_place`]: returns a new masked frame.
pub fn apply_mask(frame: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage, CompositeError> {
    let mut out = frame.clone();
    apply_mask_in_place(&mut out, mask)?;
    Ok(out)
}

/// Reusable compositing state: the canvas and its off-screen text buffer.
///
/// Buffers are allocated once per canvas size and overwritten every tick.
pub struct Compositor {
    layout: TextLayout,
    frame: RgbaImage,
    text: GrayImage,
}

impl Compositor {
    pub fn new(canvas: CanvasSize, layout: TextLayout) -> Self {
        Self {
            layout,
            frame: RgbaImage::from_pixel(canvas.width, canvas.height, BACKGROUND),
            text: GrayImage::new(canvas.width, canvas.height),
        }
    }

    pub fn canvas(&self) -> CanvasSize {
        CanvasSize::new(self.frame.width(), self.frame.height())
    }

    pub fn layout(&self) -> &TextLayout {
        &self.layout
    }

    /// Composite one tick. With no video yet the canvas is fully transparent.
    pub fn composite<S: AsRef<str>>(&mut self, video: Option<&RgbImage>, lines: &[S]) -> &RgbaImage {
        match video {
            Some(video) => draw_cover(&mut self.frame, video),
            None => {
                for p in self.frame.pixels_mut() {
                    *p = TRANSPARENT;
                }
            }
        }

        render_lines_into(&mut self.text, lines, &self.layout);
        // Both buffers are sized from the same canvas in `new`.
        if let Err(e) = apply_mask_in_place(&mut self.frame, &self.text) {
            tracing::error!(error = %e, "compositor buffers out of sync");
        }
        &self.frame
    }
}

/// Composite `video` against `lines` on a fresh `canvas`.
pub fn composite_frame<S: AsRef<str>>(
    video: &RgbImage,
    lines: &[S],
    canvas: CanvasSize,
    layout: &TextLayout,
) -> RgbaImage {
    let mut compositor = Compositor::new(canvas, *layout);
    compositor.composite(Some(video), lines).clone()
}
