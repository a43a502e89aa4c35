// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from manifest files to tensor batches.
//
// The pipeline flows in this order:
//
//   manifest files (image_path,label)
//       │
//       ▼
//   ManifestLoader    → resolves paths, checks labels
//       │
//       ▼
//   ImageDataset      → implements Burn's Dataset trait,
//       │               decodes images on demand
//       ▼
//   ImagePreprocessor → resize, random flip, scale to [-1, 1]
//       │
//       ▼
//   ImageBatcher      → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → shuffles and feeds the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads data manifests into labelled examples
pub mod loader;

/// Resizes, flips and normalises decoded images
pub mod preprocessor;

/// Implements Burn's Dataset trait for image examples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
