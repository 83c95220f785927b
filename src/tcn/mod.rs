//! TCNN (Temporal Convolutional Neural Network) implementation
//!
//! This module provides:
//! - Causal dilated convolutions with weight normalization
//! - Temporal residual blocks
//! - The full model with side-input concatenation and a dense head

mod block;
mod head;
mod layer;
mod model;

pub use block::{BlockSpec, TemporalBlock};
pub use head::DenseHead;
pub use layer::{relu, Chomp1d, Conv1d, Dropout, Linear, WeightNormConv1d};
pub use model::{ModelInputs, ModelOutput, Tcnn};
