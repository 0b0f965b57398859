//! Frame type and pixel conversion — YUYV to RGB, dark-frame detection.

/// A captured RGB888 camera frame.
#[derive(Clone)]
pub struct RgbFrame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
}

impl RgbFrame {
    /// Average luma (BT.601, 0.0–255.0).
    pub fn avg_luma(&self) -> f32 {
        let pixels = self.data.chunks_exact(3);
        let count = pixels.len();
        if count == 0 {
            return 0.0;
        }
        let sum: f32 = pixels.map(|p| luma(p[0], p[1], p[2])).sum();
        sum / count as f32
    }

    /// True when the frame is too dark to be worth submitting — more than
    /// `threshold_pct` of pixels below luma 32 (camera warm-up, lens cap).
    pub fn is_dark(&self, threshold_pct: f32) -> bool {
        let pixels = self.data.chunks_exact(3);
        let count = pixels.len();
        if count == 0 {
            return true;
        }
        let dark = pixels.filter(|p| luma(p[0], p[1], p[2]) < 32.0).count();
        (dark as f32 / count as f32) > threshold_pct
    }
}

fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

/// Convert packed YUYV (4:2:2) to RGB888 using BT.601 full-swing conversion.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share
/// one chroma pair.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let pixels = (width as usize) * (height as usize);
    let expected = pixels * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(pixels * 3);
    for group in yuyv[..expected].chunks_exact(4) {
        let (y0, u, y1, v) = (group[0], group[1], group[2], group[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

/// BT.601 limited-range YCbCr to RGB for one pixel.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = y as f32 - 16.0;
    let d = cb as f32 - 128.0;
    let e = cr as f32 - 128.0;

    let r = 1.164 * c + 1.596 * e;
    let g = 1.164 * c - 0.392 * d - 0.813 * e;
    let b = 1.164 * c + 2.017 * d;

    [
        r.round().clamp(0.0, 255.0) as u8,
        g.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_from_rgb(data: Vec<u8>, width: u32, height: u32) -> RgbFrame {
        RgbFrame {
            data,
            width,
            height,
            timestamp: std::time::Instant::now(),
            sequence: 0,
        }
    }

    #[test]
    fn test_yuyv_neutral_chroma_is_grayscale() {
        // U = V = 128 means zero chroma: R == G == B.
        let yuyv = vec![128, 128, 200, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(rgb.len(), 6);
        assert_eq!(rgb[0], rgb[1]);
        assert_eq!(rgb[1], rgb[2]);
        assert_eq!(rgb[3], rgb[4]);
        assert_eq!(rgb[4], rgb[5]);
        // Second pixel (Y=200) is brighter than the first (Y=128).
        assert!(rgb[3] > rgb[0]);
    }

    #[test]
    fn test_yuyv_black_and_white_extremes() {
        // Y=16 is reference black, Y=235 reference white in limited range.
        let yuyv = vec![16, 128, 235, 128];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert_eq!(&rgb[..3], &[0, 0, 0]);
        assert_eq!(&rgb[3..], &[255, 255, 255]);
    }

    #[test]
    fn test_yuyv_red_cast() {
        // High Cr pushes red up and green down.
        let yuyv = vec![128, 128, 128, 240];
        let rgb = yuyv_to_rgb(&yuyv, 2, 1).unwrap();
        assert!(rgb[0] > rgb[1]);
        assert!(rgb[0] > rgb[2]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_rgb(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_yuyv_output_size() {
        let yuyv = vec![128u8; 640 * 480 * 2];
        let rgb = yuyv_to_rgb(&yuyv, 640, 480).unwrap();
        assert_eq!(rgb.len(), 640 * 480 * 3);
    }

    #[test]
    fn test_dark_frame_all_black() {
        let f = frame_from_rgb(vec![0u8; 30], 10, 1);
        assert!(f.is_dark(0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        let f = frame_from_rgb(vec![128u8; 30], 10, 1);
        assert!(!f.is_dark(0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        let f = frame_from_rgb(vec![], 0, 0);
        assert!(f.is_dark(0.95));
    }

    #[test]
    fn test_dark_frame_mostly_dark() {
        // 96 dark pixels, 4 bright → dark at a 95% threshold.
        let mut data = vec![10u8; 96 * 3];
        data.extend(vec![200u8; 4 * 3]);
        let f = frame_from_rgb(data, 100, 1);
        assert!(f.is_dark(0.95));
    }

    #[test]
    fn test_avg_luma_uniform() {
        let f = frame_from_rgb(vec![100u8; 30], 10, 1);
        // Uniform gray: luma equals the channel value.
        assert!((f.avg_luma() - 100.0).abs() < 0.5);
    }
}
