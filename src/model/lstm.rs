//! LSTM sequence model for finishing-order scores
//!
//! Processes a driver's recent race history together with the current race
//! context and regresses a single finish score.

use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Lstm, LstmConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::sync::Mutex;

use super::SequenceModel;
use crate::{F1Error, Result};

/// Configuration for the sequence model
#[derive(Debug, Clone)]
pub struct SequenceNetConfig {
    /// Per-step history feature count
    pub hist_dim: usize,
    /// Current-race context feature count
    pub curr_dim: usize,
    /// LSTM hidden size
    pub hidden_size: usize,
}

/// LSTM model for finish prediction
///
/// Architecture:
/// 1. History [batch, window, hist_dim] through LSTM -> final hidden state
/// 2. Context [batch, curr_dim] through a linear projection
/// 3. Concatenate, FC + ReLU -> score head
#[derive(Module, Debug)]
pub struct SequenceNet<B: Backend> {
    lstm: Lstm<B>,
    context: Linear<B>,
    fc1: Linear<B>,
    head: Linear<B>,
    hidden_size: usize,
}

impl<B: Backend> SequenceNet<B> {
    /// Create a new sequence model
    pub fn new(device: &B::Device, config: &SequenceNetConfig) -> Self {
        let lstm = LstmConfig::new(config.hist_dim, config.hidden_size, true).init(device);
        let context = LinearConfig::new(config.curr_dim, config.hidden_size).init(device);
        let fc1 = LinearConfig::new(config.hidden_size * 2, config.hidden_size).init(device);
        let head = LinearConfig::new(config.hidden_size, 1).init(device);

        SequenceNet {
            lstm,
            context,
            fc1,
            head,
            hidden_size: config.hidden_size,
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `history` - Driver history [batch, window, hist_dim]
    /// * `current` - Current race context [batch, curr_dim]
    ///
    /// # Returns
    /// Finish score [batch, 1]
    pub fn forward(&self, history: Tensor<B, 3>, current: Tensor<B, 2>) -> Tensor<B, 2> {
        let batch_size = history.dims()[0];

        let (_, state) = self.lstm.forward(history, None);
        let history_repr = state.hidden.reshape([batch_size, self.hidden_size]);

        let context_repr = burn::tensor::activation::relu(self.context.forward(current));

        let combined = Tensor::cat(vec![history_repr, context_repr], 1);
        let x = burn::tensor::activation::relu(self.fc1.forward(combined));

        self.head.forward(x)
    }

    /// Load model from file
    pub fn load(device: &B::Device, path: &str, config: &SequenceNetConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.into(), device)
            .map_err(|e| F1Error::Model(format!("Failed to load {}: {}", path, e)))?;

        let model = Self::new(device, config);
        Ok(model.load_record(record))
    }
}

/// A sequence model ready to serve single-driver predictions
pub struct LoadedSequenceNet<B: Backend> {
    // burn modules are Send but not Sync
    net: Mutex<SequenceNet<B>>,
    device: B::Device,
    config: SequenceNetConfig,
    window: usize,
}

impl<B: Backend> LoadedSequenceNet<B> {
    pub fn new(net: SequenceNet<B>, device: B::Device, config: SequenceNetConfig, window: usize) -> Self {
        LoadedSequenceNet {
            net: Mutex::new(net),
            device,
            config,
            window,
        }
    }

    pub fn load(device: B::Device, path: &str, config: SequenceNetConfig, window: usize) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let net = SequenceNet::load(&device, path, &config)?;
        Ok(Self::new(net, device, config, window))
    }
}

impl<B: Backend> SequenceModel for LoadedSequenceNet<B> {
    fn predict(&self, history: &[f32], current: &[f32]) -> Result<f32> {
        let hist_len = self.window * self.config.hist_dim;
        if history.len() != hist_len {
            return Err(F1Error::ShapeMismatch {
                what: "sequence history",
                expected: hist_len,
                got: history.len(),
            });
        }
        if current.len() != self.config.curr_dim {
            return Err(F1Error::ShapeMismatch {
                what: "sequence context",
                expected: self.config.curr_dim,
                got: current.len(),
            });
        }

        let history = Tensor::<B, 1>::from_floats(history, &self.device).reshape([
            1,
            self.window,
            self.config.hist_dim,
        ]);
        let current =
            Tensor::<B, 1>::from_floats(current, &self.device).reshape([1, self.config.curr_dim]);

        let output = {
            let net = self
                .net
                .lock()
                .map_err(|_| F1Error::Model("sequence model lock poisoned".to_string()))?;
            net.forward(history, current)
        };

        super::tensor_to_vec(output)?
            .first()
            .copied()
            .ok_or_else(|| F1Error::Model("sequence model returned no output".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn config() -> SequenceNetConfig {
        SequenceNetConfig {
            hist_dim: 6,
            curr_dim: 4,
            hidden_size: 16,
        }
    }

    #[test]
    fn test_sequence_net_dims() {
        let device = Default::default();
        let model = SequenceNet::<TestBackend>::new(&device, &config());

        let history = Tensor::random(
            [3, 5, 6],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );
        let current = Tensor::random(
            [3, 4],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        );

        let score = model.forward(history, current);
        assert_eq!(score.dims(), [3, 1]);
    }

    #[test]
    fn test_loaded_model_scores_one_driver() {
        let device = Default::default();
        let net = SequenceNet::<TestBackend>::new(&device, &config());
        let loaded = LoadedSequenceNet::new(net, device, config(), 5);

        let score = loaded.predict(&[0.1; 30], &[0.2; 4]).unwrap();
        assert!(score.is_finite());

        assert!(matches!(
            loaded.predict(&[0.1; 29], &[0.2; 4]),
            Err(F1Error::ShapeMismatch { expected: 30, got: 29, .. })
        ));
        assert!(loaded.predict(&[0.1; 30], &[0.2; 3]).is_err());
    }
}
