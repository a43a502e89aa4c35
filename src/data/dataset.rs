use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::path::{Path, PathBuf};

use crate::data::preprocessor::ImagePreprocessor;
use crate::domain::example::LabeledExample;

/// One decoded, preprocessed image and its class index.
/// `pixels` is CHW, length = 3 * size * size, values in [-1, 1].
#[derive(Debug, Clone)]
pub struct ImageItem {
    pub pixels: Vec<f32>,
    pub label:  usize,
    /// Set when the image could not be decoded; `pixels` is then all zeros.
    pub decode_error: Option<DecodeError>,
}

/// A decode failure carried through the loader to the consumer of the batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Failed to decode image '{}': {message}", path.display())]
pub struct DecodeError {
    pub path:    PathBuf,
    pub message: String,
}

/// Lazily decodes images listed by the manifests.
/// Decoding happens in `get`, i.e. on the data loader's workers.
pub struct ImageDataset {
    examples:     Vec<LabeledExample>,
    preprocessor: ImagePreprocessor,
    seed:         u64,
}

impl ImageDataset {
    /// Fails if any image is missing or its header is unreadable.
    /// Only headers are read here, pixels are decoded on demand.
    pub fn new(examples: Vec<LabeledExample>, preprocessor: ImagePreprocessor) -> anyhow::Result<Self> {
        for ex in &examples {
            check_readable(&ex.image_path)?;
        }
        Ok(Self { examples, preprocessor, seed: 0 })
    }

    /// Seed for the random flips; the same seed and index always flip alike.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn sample_count(&self) -> usize { self.examples.len() }

    pub fn input_size(&self) -> usize { self.preprocessor.input_size() }

    fn flip(&self, index: usize) -> bool {
        if !self.preprocessor.random_flip() {
            return false;
        }
        let mut rng = StdRng::seed_from_u64(self.seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        rng.gen_bool(0.5)
    }
}

fn check_readable(path: &Path) -> anyhow::Result<()> {
    image::image_dimensions(path)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("Cannot read image '{}': {e}", path.display()))
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        let ex = self.examples.get(index)?;

        // None would end the pass, so a bad image travels with the batch instead.
        let item = match image::open(&ex.image_path) {
            Ok(img) => ImageItem {
                pixels:       self.preprocessor.process(&img, self.flip(index)),
                label:        ex.label,
                decode_error: None,
            },
            Err(e) => ImageItem {
                pixels:       vec![0.0; self.preprocessor.output_len()],
                label:        ex.label,
                decode_error: Some(DecodeError { path: ex.image_path.clone(), message: e.to_string() }),
            },
        };
        Some(item)
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ImageProcessingConfig;
    use image::{Rgb, RgbImage};

    fn prep() -> ImagePreprocessor {
        ImagePreprocessor::new(&ImageProcessingConfig { input_size: 4, ..Default::default() }, false).unwrap()
    }

    #[test]
    fn test_get_decodes_and_preprocesses() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])).save(&path).unwrap();

        let ds   = ImageDataset::new(vec![LabeledExample::new(&path, 1)], prep()).unwrap();
        let item = ds.get(0).unwrap();

        assert_eq!(ds.len(), 1);
        assert_eq!(item.label, 1);
        assert_eq!(item.pixels.len(), 3 * 4 * 4);
        assert!(item.pixels.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert!(ds.get(1).is_none());
    }

    #[test]
    fn test_truncated_image_reports_decode_error() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("cut.png");
        RgbImage::from_pixel(10, 10, Rgb([200, 20, 20])).save(&path).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 20]).unwrap();

        // the header still reads, so construction succeeds
        let ds   = ImageDataset::new(vec![LabeledExample::new(&path, 0)], prep()).unwrap();
        let item = ds.get(0).expect("a broken image still yields an item");

        let err = item.decode_error.unwrap();
        assert_eq!(err.path, path);
        assert_eq!(item.pixels, vec![0.0; 3 * 4 * 4]);
    }

    #[test]
    fn test_flips_follow_the_seed() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(0, 0, Rgb([255, 255, 255]));
        img.save(&path).unwrap();

        let cfg      = ImageProcessingConfig { input_size: 4, random_flip: true, ..Default::default() };
        let examples = vec![LabeledExample::new(&path, 0); 16];
        let make = |seed| {
            let prep = ImagePreprocessor::new(&cfg, true).unwrap();
            ImageDataset::new(examples.clone(), prep).unwrap().with_seed(seed)
        };

        let pixels = |ds: &ImageDataset| -> Vec<Vec<f32>> { (0..16).map(|i| ds.get(i).unwrap().pixels).collect() };
        let a = make(7);
        let b = make(7);
        assert_eq!(pixels(&a), pixels(&b));

        // 16 fair coin flips from one seed are not all the same
        let flipped = (0..16).filter(|&i| a.flip(i)).count();
        assert!(flipped > 0 && flipped < 16);
    }

    #[test]
    fn test_missing_image_rejected_up_front() {
        let examples = vec![LabeledExample::new("/nope/missing.png", 0)];
        assert!(ImageDataset::new(examples, prep()).is_err());
    }
}
