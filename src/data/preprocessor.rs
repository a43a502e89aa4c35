// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns a decoded image into the flat CHW float buffer the
// networks expect.
//
// Steps (applied in order):
//   1. Convert to 8-bit RGB (grayscale / RGBA are widened or
//      dropped to three channels)
//   2. Resize to INPUT_SIZE × INPUT_SIZE with the configured
//      resampling filter (aspect ratio is not preserved)
//   3. Optionally mirror left/right (training only)
//   4. Scale every channel value from [0, 255] to [-1, 1]
//   5. Lay the values out channel-major: [R plane, G plane, B plane]
//
// Reference: image crate documentation (imageops)

use image::{imageops::FilterType, DynamicImage};

use crate::domain::config::ImageProcessingConfig;
use crate::domain::errors::ConfigError;

/// Number of colour channels fed to every network
pub const CHANNELS: usize = 3;

/// Map a filter name from the config to the image crate's enum.
pub fn parse_filter(name: &str) -> Result<FilterType, ConfigError> {
    match name {
        "nearest"    => Ok(FilterType::Nearest),
        "triangle"   => Ok(FilterType::Triangle),
        "catmullrom" => Ok(FilterType::CatmullRom),
        "gaussian"   => Ok(FilterType::Gaussian),
        "lanczos3"   => Ok(FilterType::Lanczos3),
        other        => Err(ConfigError::UnknownResizeFilter(other.to_string())),
    }
}

#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    input_size:  u32,
    filter:      FilterType,
    random_flip: bool,
}

impl ImagePreprocessor {
    /// Build from config. `training = false` disables augmentation.
    pub fn new(cfg: &ImageProcessingConfig, training: bool) -> Result<Self, ConfigError> {
        Ok(Self {
            input_size:  cfg.input_size,
            filter:      parse_filter(&cfg.resize_filter)?,
            random_flip: training && cfg.random_flip,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size as usize
    }

    /// Whether this preprocessor is allowed to mirror images
    pub fn random_flip(&self) -> bool {
        self.random_flip
    }

    /// Length of the flat buffer produced by `process`
    pub fn output_len(&self) -> usize {
        CHANNELS * self.input_size() * self.input_size()
    }

    /// Resize, optionally mirror, and normalise one image.
    pub fn process(&self, img: &DynamicImage, flip: bool) -> Vec<f32> {
        let size    = self.input_size;
        let resized = img.resize_exact(size, size, self.filter);
        let resized = if flip && self.random_flip { resized.fliph() } else { resized };
        let rgb     = resized.to_rgb8();

        let plane   = (size * size) as usize;
        let mut out = vec![0.0f32; CHANNELS * plane];

        for (i, pixel) in rgb.pixels().enumerate() {
            for c in 0..CHANNELS {
                // [0, 255] → [-1, 1]
                out[c * plane + i] = pixel.0[c] as f32 / 127.5 - 1.0;
            }
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn cfg(size: u32) -> ImageProcessingConfig {
        ImageProcessingConfig {
            input_size:    size,
            random_flip:   true,
            resize_filter: "nearest".to_string(),
        }
    }

    #[test]
    fn test_output_is_chw_and_normalised() {
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(0, 1, Rgb([0, 0, 255]));
        img.put_pixel(1, 1, Rgb([255, 255, 255]));

        let prep = ImagePreprocessor::new(&cfg(2), false).unwrap();
        let out  = prep.process(&DynamicImage::ImageRgb8(img), false);

        assert_eq!(out.len(), prep.output_len());
        // R plane: 255, 0, 0, 255
        assert_eq!(&out[0..4], &[1.0, -1.0, -1.0, 1.0]);
        // G plane: 0, 255, 0, 255
        assert_eq!(&out[4..8], &[-1.0, 1.0, -1.0, 1.0]);
        // B plane: 0, 0, 255, 255
        assert_eq!(&out[8..12], &[-1.0, -1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.put_pixel(1, 0, Rgb([0, 0, 0]));
        let img = DynamicImage::ImageRgb8(img);

        let mut c = cfg(2);
        c.input_size = 2;
        let prep = ImagePreprocessor::new(&c, true).unwrap();

        // Resize 2x1 → 2x2 with nearest keeps the column pattern
        let plain   = prep.process(&img, false);
        let flipped = prep.process(&img, true);
        assert_eq!(&plain[0..2],   &[1.0, -1.0]);
        assert_eq!(&flipped[0..2], &[-1.0, 1.0]);
    }

    #[test]
    fn test_eval_mode_never_flips() {
        let prep = ImagePreprocessor::new(&cfg(4), false).unwrap();
        assert!(!prep.random_flip());
    }

    #[test]
    fn test_unknown_filter_rejected() {
        assert_eq!(
            parse_filter("bicubic").unwrap_err(),
            ConfigError::UnknownResizeFilter("bicubic".to_string())
        );
    }
}
