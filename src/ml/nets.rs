// ============================================================
// Layer 5 — Network Zoo
// ============================================================
// The classification networks selectable with MODEL_NAME.
//
//   lenet          conv5x5(32) → pool → conv5x5(64) → pool
//                  → fc(1024) → dropout → logits
//
//   cifarnet       conv5x5(64) → pool3x3/2 → conv5x5(64)
//                  → pool3x3/2 → fc(384) → dropout → fc(192)
//                  → logits
//
//   inception_mini stem conv3x3(32) → pool → mixed_a
//                  → [aux head] → pool → mixed_b
//                  → global avg pool → dropout → logits
//                  The aux head produces AuxLogits, trained with
//                  weight 0.4 alongside the main logits.
//
// Every network takes [batch, 3, S, S] images in [-1, 1] and
// returns [batch, num_classes] logits.
//
// Field names ARE the variable scopes: `conv1.weight`,
// `logits.bias`, `mixed_a.branch_3x3.weight`, … so renaming a
// field changes which checkpoints and --trainable-scopes match.
//
// Reference: LeCun et al. (1998) LeNet-5
//            Szegedy et al. (2015) Going Deeper with Convolutions
//            Burn Book §3 (Building Blocks)

use std::str::FromStr;

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    prelude::*,
    tensor::activation::relu,
};

use crate::data::preprocessor::CHANNELS;
use crate::domain::errors::ConfigError;

// ─── Shared output / trait ────────────────────────────────────────────────────
pub struct NetOutput<B: Backend> {
    /// [batch, num_classes]
    pub logits:     Tensor<B, 2>,
    /// Present only for networks with an auxiliary classifier
    pub aux_logits: Option<Tensor<B, 2>>,
}

/// Anything the trainer can drive: a Burn module mapping an image
/// batch to class logits.
pub trait Classifier<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> NetOutput<B>;
}

/// Construction parameters shared by every network (the "arg scope").
#[derive(Config, Debug)]
pub struct NetConfig {
    pub num_classes: usize,
    pub input_size:  usize,
    #[config(default = 0.8)]
    pub dropout_keep_prob: f64,
}

impl NetConfig {
    fn dropout(&self) -> Dropout {
        DropoutConfig::new(1.0 - self.dropout_keep_prob).init()
    }
}

// ─── Model selection ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    LeNet,
    CifarNet,
    InceptionMini,
}

impl ModelKind {
    pub const NAMES: [&'static str; 3] = ["lenet", "cifarnet", "inception_mini"];
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lenet"          => Ok(Self::LeNet),
            "cifarnet"       => Ok(Self::CifarNet),
            "inception_mini" => Ok(Self::InceptionMini),
            other            => Err(ConfigError::UnknownModel(other.to_string(), Self::NAMES.join(", "))),
        }
    }
}

fn conv_same<B: Backend>(c_in: usize, c_out: usize, kernel: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([c_in, c_out], [kernel, kernel])
        .with_padding(PaddingConfig2d::Same)
        .init(device)
}

/// 3x3 / stride 2 pool with 1px padding: output side = ceil(S / 2)
fn pool_3x3_s2() -> MaxPool2d {
    MaxPool2dConfig::new([3, 3])
        .with_strides([2, 2])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init()
}

fn ceil_half(s: usize) -> usize {
    s.div_ceil(2)
}

// ─── LeNet ────────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LeNet<B: Backend> {
    pub conv1:   Conv2d<B>,
    pub conv2:   Conv2d<B>,
    pub fc3:     Linear<B>,
    pub logits:  Linear<B>,
    pub pool:    MaxPool2d,
    pub dropout: Dropout,
}

impl NetConfig {
    pub fn init_lenet<B: Backend>(&self, device: &B::Device) -> LeNet<B> {
        let side = self.input_size / 2 / 2;
        LeNet {
            conv1:   conv_same(CHANNELS, 32, 5, device),
            conv2:   conv_same(32, 64, 5, device),
            fc3:     LinearConfig::new(64 * side * side, 1024).init(device),
            logits:  LinearConfig::new(1024, self.num_classes).init(device),
            pool:    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            dropout: self.dropout(),
        }
    }
}

impl<B: Backend> Classifier<B> for LeNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> NetOutput<B> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(relu(self.fc3.forward(x)));
        NetOutput { logits: self.logits.forward(x), aux_logits: None }
    }
}

// ─── CifarNet ─────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct CifarNet<B: Backend> {
    pub conv1:   Conv2d<B>,
    pub conv2:   Conv2d<B>,
    pub fc3:     Linear<B>,
    pub fc4:     Linear<B>,
    pub logits:  Linear<B>,
    pub pool:    MaxPool2d,
    pub dropout: Dropout,
}

impl NetConfig {
    pub fn init_cifarnet<B: Backend>(&self, device: &B::Device) -> CifarNet<B> {
        let side = ceil_half(ceil_half(self.input_size));
        CifarNet {
            conv1:   conv_same(CHANNELS, 64, 5, device),
            conv2:   conv_same(64, 64, 5, device),
            fc3:     LinearConfig::new(64 * side * side, 384).init(device),
            fc4:     LinearConfig::new(384, 192).init(device),
            logits:  LinearConfig::new(192, self.num_classes).init(device),
            pool:    pool_3x3_s2(),
            dropout: self.dropout(),
        }
    }
}

impl<B: Backend> Classifier<B> for CifarNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> NetOutput<B> {
        let x = self.pool.forward(relu(self.conv1.forward(images)));
        let x = self.pool.forward(relu(self.conv2.forward(x)));
        let x = x.flatten::<2>(1, 3);
        let x = self.dropout.forward(relu(self.fc3.forward(x)));
        let x = relu(self.fc4.forward(x));
        NetOutput { logits: self.logits.forward(x), aux_logits: None }
    }
}

// ─── InceptionMini ────────────────────────────────────────────────────────────
/// Four parallel branches concatenated on the channel axis.
#[derive(Module, Debug)]
pub struct MixedBlock<B: Backend> {
    pub branch_1x1:  Conv2d<B>,
    pub reduce_3x3:  Conv2d<B>,
    pub branch_3x3:  Conv2d<B>,
    pub reduce_5x5:  Conv2d<B>,
    pub branch_5x5:  Conv2d<B>,
    pub branch_pool: Conv2d<B>,
    pub pool:        MaxPool2d,
}

impl<B: Backend> MixedBlock<B> {
    /// Output channels = 4 * width
    fn new(c_in: usize, width: usize, device: &B::Device) -> Self {
        Self {
            branch_1x1:  conv_same(c_in, width, 1, device),
            reduce_3x3:  conv_same(c_in, width / 2, 1, device),
            branch_3x3:  conv_same(width / 2, width, 3, device),
            reduce_5x5:  conv_same(c_in, width / 4, 1, device),
            branch_5x5:  conv_same(width / 4, width, 5, device),
            branch_pool: conv_same(c_in, width, 1, device),
            pool:        MaxPool2dConfig::new([3, 3])
                .with_strides([1, 1])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(),
        }
    }

    fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let b1 = relu(self.branch_1x1.forward(x.clone()));
        let b2 = relu(self.branch_3x3.forward(relu(self.reduce_3x3.forward(x.clone()))));
        let b3 = relu(self.branch_5x5.forward(relu(self.reduce_5x5.forward(x.clone()))));
        let b4 = relu(self.branch_pool.forward(self.pool.forward(x)));
        Tensor::cat(vec![b1, b2, b3, b4], 1)
    }
}

#[derive(Module, Debug)]
pub struct AuxHead<B: Backend> {
    pub conv:   Conv2d<B>,
    pub fc:     Linear<B>,
    pub pool:   AdaptiveAvgPool2d,
}

#[derive(Module, Debug)]
pub struct InceptionMini<B: Backend> {
    pub stem:       Conv2d<B>,
    pub mixed_a:    MixedBlock<B>,
    pub aux_logits: AuxHead<B>,
    pub mixed_b:    MixedBlock<B>,
    pub logits:     Linear<B>,
    pub pool:       MaxPool2d,
    pub global:     AdaptiveAvgPool2d,
    pub dropout:    Dropout,
}

impl NetConfig {
    pub fn init_inception_mini<B: Backend>(&self, device: &B::Device) -> InceptionMini<B> {
        let width_a = 32;
        let width_b = 64;
        InceptionMini {
            stem:       conv_same(CHANNELS, 32, 3, device),
            mixed_a:    MixedBlock::new(32, width_a, device),
            aux_logits: AuxHead {
                conv: conv_same(4 * width_a, 64, 1, device),
                fc:   LinearConfig::new(64 * 2 * 2, self.num_classes).init(device),
                pool: AdaptiveAvgPool2dConfig::new([2, 2]).init(),
            },
            mixed_b:    MixedBlock::new(4 * width_a, width_b, device),
            logits:     LinearConfig::new(4 * width_b, self.num_classes).init(device),
            pool:       pool_3x3_s2(),
            global:     AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            dropout:    self.dropout(),
        }
    }
}

impl<B: Backend> Classifier<B> for InceptionMini<B> {
    fn forward(&self, images: Tensor<B, 4>) -> NetOutput<B> {
        let x = self.pool.forward(relu(self.stem.forward(images)));
        let x = self.mixed_a.forward(x);

        let aux = relu(self.aux_logits.conv.forward(self.aux_logits.pool.forward(x.clone())));
        let aux = self.aux_logits.fc.forward(aux.flatten::<2>(1, 3));

        let x = self.mixed_b.forward(self.pool.forward(x));
        let x = self.global.forward(x).flatten::<2>(1, 3);
        let x = self.dropout.forward(x);

        NetOutput { logits: self.logits.forward(x), aux_logits: Some(aux) }
    }
}
