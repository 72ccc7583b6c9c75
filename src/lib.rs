//! F1 race outcome prediction
//!
//! Fuses a history-based finishing-order model and a field-wide win classifier
//! into one ranked prediction per race.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Which scoring path a prediction request uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// History-based sequence model only
    Sequence,
    /// Field-wide win classifier only
    Probability,
    /// Rank fusion of both signals
    Fused,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMode::Sequence => "sequence",
            PredictionMode::Probability => "probability",
            PredictionMode::Fused => "fused",
        }
    }
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PredictionMode {
    type Err = F1Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sequence" | "historical" => Ok(PredictionMode::Sequence),
            "probability" | "telemetry" => Ok(PredictionMode::Probability),
            "fused" | "hybrid" => Ok(PredictionMode::Fused),
            _ => Err(F1Error::UnsupportedRequest(format!(
                "unknown mode '{}', use sequence, probability or fused",
                s
            ))),
        }
    }
}

/// One driver's entry in one race, as read from the race store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRaceRecord {
    pub season: i32,
    pub round: u32,
    pub circuit: String,
    /// Driver code, e.g. "VER"
    pub driver: String,
    pub team: String,
    pub grid_position: u32,
    /// None while the race is in progress or the result is unknown
    pub final_position: Option<u32>,
    /// Raw performance columns keyed by name
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

impl DriverRaceRecord {
    /// Resolve a numeric column by name
    pub fn column(&self, name: &str) -> Option<f64> {
        match name {
            "season" => Some(self.season as f64),
            "round" => Some(self.round as f64),
            "grid_position" => Some(self.grid_position as f64),
            "final_position" => self.final_position.map(|p| p as f64),
            _ => self.metrics.get(name).copied(),
        }
    }

    /// Chronological sort key
    pub fn race_key(&self) -> (i32, u32) {
        (self.season, self.round)
    }
}

/// Caller input for a single race prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub season: i32,
    pub circuit: String,
    pub mode: PredictionMode,
}

impl PredictionRequest {
    pub fn new(season: i32, circuit: impl Into<String>, mode: PredictionMode) -> Self {
        PredictionRequest {
            season,
            circuit: circuit.into(),
            mode,
        }
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum F1Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Race not found: {circuit} {season}")]
    RaceNotFound { season: i32, circuit: String },

    #[error("Race not found in session data: {circuit} {season}")]
    SessionNotFound { season: i32, circuit: String },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Shape mismatch for {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("History out of order: {0}")]
    HistoryOrder(String),

    #[error("Service unavailable for {0} mode: model not loaded")]
    CapabilityUnavailable(PredictionMode),

    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),
}

impl F1Error {
    /// Errors that fail one race prediction but are a normal outcome.
    ///
    /// Store, IO and configuration failures are not: they say nothing about
    /// the requested race.
    pub fn is_race_level(&self) -> bool {
        matches!(
            self,
            F1Error::RaceNotFound { .. }
                | F1Error::SessionNotFound { .. }
                | F1Error::MissingColumn(_)
                | F1Error::ShapeMismatch { .. }
                | F1Error::HistoryOrder(_)
                | F1Error::Model(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, F1Error>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub sequence: SequenceConfig,
    pub probability: ProbabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceConfig {
    /// Burn record path (without the .mpk extension)
    pub model_path: String,
    /// JSON sidecar with scaler, encoders and feature lists
    pub artifacts_path: String,
    /// Required number of prior races
    pub window: usize,
    pub hidden_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbabilityConfig {
    pub model_path: String,
    pub artifacts_path: String,
    /// Per-session feature rows backing the classifier
    pub sessions_path: String,
    pub hidden_dims: Vec<usize>,
    /// Softmax temperature for field renormalization
    pub temperature: f64,
    /// First season covered by the session data
    pub min_season: i32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/f1_data.db".to_string(),
            },
            sequence: SequenceConfig {
                model_path: "models/sequence_net".to_string(),
                artifacts_path: "models/sequence_artifacts.json".to_string(),
                window: 5,
                hidden_size: 64,
            },
            probability: ProbabilityConfig {
                model_path: "models/win_classifier".to_string(),
                artifacts_path: "models/win_classifier_artifacts.json".to_string(),
                sessions_path: "models/sessions.json".to_string(),
                hidden_dims: vec![32, 16],
                temperature: 0.5,
                min_season: 2023,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            F1Error::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| F1Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| F1Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sequence.window == 0 {
            return Err(F1Error::Config("sequence.window must be at least 1".to_string()));
        }
        let t = self.probability.temperature;
        if !(t.is_finite() && t > 0.0) {
            return Err(F1Error::Config(format!(
                "probability.temperature must be positive and finite, got {}",
                t
            )));
        }
        Ok(())
    }
}
