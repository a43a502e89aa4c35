// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks N preprocessed
// ImageItems into one image tensor and one label tensor.
//
//   Input:  Vec of N ImageItems, each 3 * S * S floats (CHW)
//   Output: images [N, 3, S, S] (float), labels [N] (int)
//
// All items share the same S because the preprocessor resizes
// every image to INPUT_SIZE, so batching is a plain flatten +
// reshape — no padding needed.
//
// An item whose image failed to decode still fills its slot
// (with zeros); its error rides along in the batch and the
// consumer must call `ensure_decoded` before using it.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::{DecodeError, ImageItem};
use crate::data::preprocessor::CHANNELS;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Shape [batch_size, 3, input_size, input_size]
    pub images: Tensor<B, 4>,

    /// Shape [batch_size] — class indices
    pub labels: Tensor<B, 1, Int>,

    /// Items of this batch whose image could not be decoded
    pub decode_errors: Vec<DecodeError>,
}

impl<B: Backend> ImageBatch<B> {
    /// Fail with the first decode error, if any item had one.
    pub fn ensure_decoded(&self) -> Result<(), DecodeError> {
        match self.decode_errors.first() {
            Some(err) => Err(err.clone()),
            None      => Ok(()),
        }
    }
}

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    input_size: usize,
}

impl ImageBatcher {
    pub fn new(input_size: usize) -> Self {
        Self { input_size }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();
        let size       = self.input_size;

        // ── Flatten pixels: Vec<Vec<f32>> → Vec<f32> ─────────────────────────
        let pixels: Vec<f32> = items
            .iter()
            .flat_map(|item| item.pixels.iter().copied())
            .collect();

        let labels: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let decode_errors: Vec<DecodeError> = items.iter().filter_map(|item| item.decode_error.clone()).collect();

        let images = Tensor::<B, 4>::from_data(
            TensorData::new(pixels, [batch_size, CHANNELS, size, size]).convert::<B::FloatElem>(),
            device,
        );
        let labels = Tensor::<B, 1, Int>::from_data(
            TensorData::new(labels, [batch_size]).convert::<B::IntElem>(),
            device,
        );

        ImageBatch { images, labels, decode_errors }
    }
}
