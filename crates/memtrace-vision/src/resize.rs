//! Bilinear resampling of interleaved 8-bit images into model input planes.

/// Source-space rectangle to resample, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn full(width: usize, height: usize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Resample `region` of an interleaved `width × height × channels` image to
/// `out_w × out_h`, returning interleaved float samples in 0.0–255.0.
///
/// Pixel centers are aligned (half-pixel offset) and reads outside the source
/// clamp to the nearest edge pixel.
pub fn resize_region(
    src: &[u8],
    width: usize,
    height: usize,
    channels: usize,
    region: Region,
    out_w: usize,
    out_h: usize,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(out_w * out_h * channels);
    if width == 0 || height == 0 || src.len() < width * height * channels {
        out.resize(out_w * out_h * channels, 0.0);
        return out;
    }

    let step_x = region.width / out_w as f32;
    let step_y = region.height / out_h as f32;
    let at = |x: usize, y: usize, c: usize| src[(y * width + x) * channels + c] as f32;

    for oy in 0..out_h {
        let fy = region.y + (oy as f32 + 0.5) * step_y - 0.5;
        let y0 = (fy.floor() as i64).clamp(0, height as i64 - 1) as usize;
        let y1 = (y0 + 1).min(height - 1);
        let wy = (fy - fy.floor()).clamp(0.0, 1.0);

        for ox in 0..out_w {
            let fx = region.x + (ox as f32 + 0.5) * step_x - 0.5;
            let x0 = (fx.floor() as i64).clamp(0, width as i64 - 1) as usize;
            let x1 = (x0 + 1).min(width - 1);
            let wx = (fx - fx.floor()).clamp(0.0, 1.0);

            for c in 0..channels {
                let top = at(x0, y0, c) * (1.0 - wx) + at(x1, y0, c) * wx;
                let bottom = at(x0, y1, c) * (1.0 - wx) + at(x1, y1, c) * wx;
                out.push(top * (1.0 - wy) + bottom * wy);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_stays_uniform() {
        let src = vec![128u8; 100 * 80 * 3];
        let out = resize_region(&src, 100, 80, 3, Region::full(100, 80), 320, 240);
        assert_eq!(out.len(), 320 * 240 * 3);
        assert!(out.iter().all(|&v| (v - 128.0).abs() < 1e-3));
    }

    #[test]
    fn test_identity_resize() {
        let src: Vec<u8> = (0..16).map(|i| i * 10).collect();
        let out = resize_region(&src, 4, 4, 1, Region::full(4, 4), 4, 4);
        for (a, b) in src.iter().zip(out.iter()) {
            assert!((*a as f32 - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_region_crop() {
        // Left half 0, right half 200: cropping the right half is all 200.
        let src: Vec<u8> = (0..8 * 4).map(|i| if i % 8 >= 4 { 200 } else { 0 }).collect();
        let region = Region { x: 4.0, y: 0.0, width: 4.0, height: 4.0 };
        let out = resize_region(&src, 8, 4, 1, region, 2, 2);
        assert!(out.iter().all(|&v| (v - 200.0).abs() < 1e-3), "{out:?}");
    }

    #[test]
    fn test_short_source_yields_zeros() {
        let out = resize_region(&[1, 2, 3], 4, 4, 1, Region::full(4, 4), 2, 2);
        assert_eq!(out, vec![0.0; 4]);
    }
}
