//! MLP win classifier
//!
//! Architecture: Input(8) → Hidden1 → ReLU → Dropout
//!                        → Hidden2 → ReLU → Dropout (optional)
//!                        → win_head(1) → sigmoid

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use std::sync::Mutex;

use super::FieldModel;
use crate::features::FieldFeatures;
use crate::{F1Error, Result};

/// Configuration for the win classifier
#[derive(Debug, Clone)]
pub struct WinClassifierConfig {
    /// Input dimension (FieldFeatures::DIM)
    pub input_dim: usize,
    /// Hidden layer dimensions (e.g., [32, 16] for two layers)
    pub hidden_dims: Vec<usize>,
    /// Dropout rate
    pub dropout: f64,
}

impl Default for WinClassifierConfig {
    fn default() -> Self {
        WinClassifierConfig {
            input_dim: FieldFeatures::DIM,
            hidden_dims: vec![32, 16],
            dropout: 0.1,
        }
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

/// Per-driver win classifier
#[derive(Module, Debug)]
pub struct WinClassifier<B: Backend> {
    hidden1: HiddenBlock<B>,
    hidden2: Option<HiddenBlock<B>>,
    win_head: Linear<B>,
}

impl<B: Backend> WinClassifier<B> {
    /// Create a new classifier
    pub fn new(device: &B::Device, config: &WinClassifierConfig) -> Self {
        let first = config.hidden_dims.first().copied().unwrap_or(32);
        let hidden1 = HiddenBlock::new(device, config.input_dim, first, config.dropout);

        let (hidden2, head_input_dim) = match config.hidden_dims.get(1) {
            Some(&second) => (
                Some(HiddenBlock::new(device, first, second, config.dropout)),
                second,
            ),
            None => (None, first),
        };

        WinClassifier {
            hidden1,
            hidden2,
            win_head: LinearConfig::new(head_input_dim, 1).init(device),
        }
    }

    /// Forward pass
    ///
    /// # Arguments
    /// * `features` - Scaled field features [drivers, input_dim]
    ///
    /// # Returns
    /// Win probability per driver [drivers, 1]
    pub fn forward(&self, features: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden1.forward(features);
        let x = match &self.hidden2 {
            Some(h2) => h2.forward(x),
            None => x,
        };
        sigmoid(self.win_head.forward(x))
    }

    /// Load model from file
    pub fn load(device: &B::Device, path: &str, config: &WinClassifierConfig) -> Result<Self>
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

/// A classifier ready to score whole fields
pub struct LoadedWinClassifier<B: Backend> {
    net: Mutex<WinClassifier<B>>,
    device: B::Device,
    input_dim: usize,
}

impl<B: Backend> LoadedWinClassifier<B> {
    pub fn new(net: WinClassifier<B>, device: B::Device, input_dim: usize) -> Self {
        LoadedWinClassifier {
            net: Mutex::new(net),
            device,
            input_dim,
        }
    }

    pub fn load(device: B::Device, path: &str, config: WinClassifierConfig) -> Result<Self>
    where
        B::FloatElem: serde::Serialize + serde::de::DeserializeOwned,
        B::IntElem: serde::Serialize + serde::de::DeserializeOwned,
    {
        let net = WinClassifier::load(&device, path, &config)?;
        Ok(Self::new(net, device, config.input_dim))
    }
}

impl<B: Backend> FieldModel for LoadedWinClassifier<B> {
    fn predict_field(&self, matrix: &[Vec<f32>]) -> Result<Vec<f32>> {
        if matrix.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(row) = matrix.iter().find(|r| r.len() != self.input_dim) {
            return Err(F1Error::ShapeMismatch {
                what: "classifier row",
                expected: self.input_dim,
                got: row.len(),
            });
        }

        let flat: Vec<f32> = matrix.iter().flatten().copied().collect();
        let input = Tensor::<B, 1>::from_floats(flat.as_slice(), &self.device)
            .reshape([matrix.len(), self.input_dim]);

        let output = {
            let net = self
                .net
                .lock()
                .map_err(|_| F1Error::Model("classifier lock poisoned".to_string()))?;
            net.forward(input)
        };

        super::tensor_to_vec(output)
    }
}
