//! Inference-only plumbing for the pre-trained note classifier: a flat weight
//! container on disk, the layer math, and the fixed network topology the
//! shipped weight files were trained for.

pub mod layers;
pub mod network;
pub mod weights;

pub use network::Network;
pub use weights::{Tensor, TensorDump, WeightsContainer};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeightsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a weight container (bad magic)")]
    BadMagic,
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),
    #[error("tensor name is not valid utf-8")]
    BadTensorName,
    #[error("missing tensor {0:?}")]
    MissingTensor(String),
    #[error("tensor {name:?} has shape {actual:?}, expected {expected}")]
    BadShape {
        name: String,
        expected: String,
        actual: Vec<usize>,
    },
    #[error("inconsistent topology: {0}")]
    Topology(String),
}
