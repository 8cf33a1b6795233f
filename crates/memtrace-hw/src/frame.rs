//! Frame type and pixel conversion, YUYV and GREY to RGB + luma.

use image::RgbImage;

/// A captured camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Color image for display.
    pub image: RgbImage,
    /// Luma plane (width * height bytes) for detection.
    pub luma: Vec<u8>,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Build a frame from packed YUYV 4:2:2 bytes.
    pub fn from_yuyv(yuyv: &[u8], width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let (image, luma) = yuyv_to_rgb(yuyv, width, height)?;
        Ok(Self {
            image,
            luma,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }

    /// Build a frame from 8-bit grayscale bytes.
    pub fn from_grey(grey: &[u8], width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let pixels = (width * height) as usize;
        if grey.len() < pixels {
            return Err(FrameError::InvalidLength {
                expected: pixels,
                actual: grey.len(),
            });
        }
        let luma = grey[..pixels].to_vec();
        let image = RgbImage::from_fn(width, height, |x, y| {
            let v = luma[(y * width + x) as usize];
            image::Rgb([v, v, v])
        });
        Ok(Self {
            image,
            luma,
            timestamp: std::time::Instant::now(),
            sequence,
        })
    }
}

/// BT.601 limited-range YCbCr to RGB, integer approximation.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = y as i32 - 16;
    let d = cb as i32 - 128;
    let e = cr as i32 - 128;
    let clamp = |v: i32| (v >> 8).clamp(0, 255) as u8;
    [
        clamp(298 * c + 409 * e + 128),
        clamp(298 * c - 100 * d - 208 * e + 128),
        clamp(298 * c + 516 * d + 128),
    ]
}

/// Convert packed YUYV (4:2:2) to an RGB image and its luma plane.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V], both pixels sharing
/// the chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<(RgbImage, Vec<u8>), FrameError> {
    let pixels = (width * height) as usize;
    let expected = pixels * 2;
    if yuyv.len() < expected || width % 2 != 0 {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    let mut luma = Vec::with_capacity(pixels);
    for quad in yuyv[..expected].chunks_exact(4) {
        let [y0, u, y1, v] = [quad[0], quad[1], quad[2], quad[3]];
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
        luma.push(y0);
        luma.push(y1);
    }

    let image = RgbImage::from_raw(width, height, rgb).ok_or(FrameError::InvalidLength {
        expected,
        actual: yuyv.len(),
    })?;
    Ok((image, luma))
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_black_and_white() {
        // 2x1: one black pixel (Y=16), one white pixel (Y=235), neutral chroma.
        let yuyv = vec![16, 128, 235, 128];
        let (image, luma) = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [255, 255, 255]);
        assert_eq!(luma, vec![16, 235]);
    }

    #[test]
    fn test_yuyv_red_chroma() {
        // Strong Cr with mid luma leans red.
        let (image, _) = yuyv_to_rgb(&[81, 90, 81, 240], 2, 1).unwrap();
        let [r, g, b] = image.get_pixel(0, 0).0;
        assert!(r > 200 && g < 60 && b < 60, "got {r},{g},{b}");
    }

    #[test]
    fn test_yuyv_4x2_luma_plane() {
        let yuyv: Vec<u8> = (0..16).collect();
        let (image, luma) = yuyv_to_rgb(&yuyv, 4, 2).unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(luma, vec![0, 2, 4, 6, 8, 10, 12, 14]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        assert!(yuyv_to_rgb(&[100, 128], 2, 1).is_err());
        assert!(yuyv_to_rgb(&[0; 6], 3, 1).is_err());
    }

    #[test]
    fn test_grey_frame_replicates_channels() {
        let frame = Frame::from_grey(&[0, 50, 200, 255], 2, 2, 7).unwrap();
        assert_eq!(frame.image.get_pixel(1, 1).0, [255, 255, 255]);
        assert_eq!(frame.image.get_pixel(0, 1).0, [200, 200, 200]);
        assert_eq!(frame.sequence, 7);
        assert_eq!((frame.width(), frame.height()), (2, 2));
    }

    #[test]
    fn test_grey_frame_too_short() {
        assert!(Frame::from_grey(&[1, 2, 3], 2, 2, 0).is_err());
    }
}
