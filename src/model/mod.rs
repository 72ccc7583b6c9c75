//! Scoring models
//!
//! Two model families behind opaque scoring contracts:
//! - Sequence: LSTM over a driver's recent races, lower output = better finish
//! - Win classifier: MLP over the whole field, one win probability per driver

pub mod lstm;
pub mod mlp;

pub use lstm::{LoadedSequenceNet, SequenceNet, SequenceNetConfig};
pub use mlp::{LoadedWinClassifier, WinClassifier, WinClassifierConfig};

use crate::Result;

/// Backend used to serve predictions
pub type InferenceBackend = burn::backend::NdArray<f32>;

/// A trained sequence model: `(history, current) -> finish score`
pub trait SequenceModel: Send + Sync {
    /// `history` is `window * hist_dim` values, oldest first
    fn predict(&self, history: &[f32], current: &[f32]) -> Result<f32>;
}

/// A trained field classifier: one raw value in [0, 1] per input row
pub trait FieldModel: Send + Sync {
    fn predict_field(&self, matrix: &[Vec<f32>]) -> Result<Vec<f32>>;
}

/// Flatten a single-column output tensor
pub(crate) fn tensor_to_vec<B: burn::tensor::backend::Backend>(
    tensor: burn::tensor::Tensor<B, 2>,
) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| crate::F1Error::Model(format!("Failed to read model output: {:?}", e)))
}
