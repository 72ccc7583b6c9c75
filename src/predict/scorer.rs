//! Score providers and the capability registry
//!
//! Each scorer wraps an opaque model together with its fitted preprocessing.
//! The sequence scorer degrades per driver to grid position; the
//! probabilistic scorer succeeds or fails for the whole field.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use super::fusion::{softmax_renormalize, ScoredDriver};
use crate::data::SessionHistory;
use crate::features::{FieldFeatures, SequenceArtifacts, SequenceFeatureBuilder, StandardScaler};
use crate::model::{
    FieldModel, InferenceBackend, LoadedSequenceNet, LoadedWinClassifier, SequenceModel,
    SequenceNetConfig, WinClassifierConfig,
};
use crate::{Config, DriverRaceRecord, F1Error, PredictionMode, Result};

/// Why a driver's sequence score is its grid position
#[derive(Debug, Clone, PartialEq)]
pub enum FallbackReason {
    /// Fewer prior races than the model window
    InsufficientHistory { have: usize, need: usize },
    /// No sequence model was loaded
    ModelUnavailable,
    /// History lookup, feature construction or the model call failed
    Failed(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::InsufficientHistory { have, need } => {
                write!(f, "insufficient history ({} of {} races)", have, need)
            }
            FallbackReason::ModelUnavailable => write!(f, "sequence model unavailable"),
            FallbackReason::Failed(msg) => write!(f, "{}", msg),
        }
    }
}

/// Outcome of sequence scoring for one driver
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceScore {
    /// Model output, lower is better
    Model(f64),
    /// Grid position standing in for the model
    Fallback { grid: f64, reason: FallbackReason },
}

impl SequenceScore {
    pub fn fallback(record: &DriverRaceRecord, reason: FallbackReason) -> Self {
        SequenceScore::Fallback {
            grid: record.grid_position as f64,
            reason,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            SequenceScore::Model(score) => *score,
            SequenceScore::Fallback { grid, .. } => *grid,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, SequenceScore::Fallback { .. })
    }
}

/// History-based finish scorer
pub struct SequenceScorer {
    model: Box<dyn SequenceModel>,
    artifacts: SequenceArtifacts,
    window: usize,
}

impl SequenceScorer {
    pub fn new(model: Box<dyn SequenceModel>, artifacts: SequenceArtifacts, window: usize) -> Result<Self> {
        artifacts.validate()?;
        Ok(SequenceScorer {
            model,
            artifacts,
            window,
        })
    }

    /// Load the burn model and its artifact sidecar
    pub fn load(config: &crate::SequenceConfig) -> Result<Self> {
        let artifacts = SequenceArtifacts::load(&config.artifacts_path)?;
        let net_config = SequenceNetConfig {
            hist_dim: artifacts.hist_features.len(),
            curr_dim: artifacts.curr_features.len(),
            hidden_size: config.hidden_size,
        };
        let model = LoadedSequenceNet::<InferenceBackend>::load(
            Default::default(),
            &config.model_path,
            net_config,
            config.window,
        )?;
        Self::new(Box::new(model), artifacts, config.window)
    }

    /// Required number of prior races
    pub fn window(&self) -> usize {
        self.window
    }

    /// Score one driver; never fails, degrades to grid position
    pub fn score(&self, current: &DriverRaceRecord, history: &[DriverRaceRecord]) -> SequenceScore {
        if history.len() < self.window {
            return SequenceScore::fallback(
                current,
                FallbackReason::InsufficientHistory {
                    have: history.len(),
                    need: self.window,
                },
            );
        }

        match self.try_score(current, history) {
            Ok(score) => SequenceScore::Model(score),
            Err(e) => {
                log::debug!("Sequence fallback for {}: {}", current.driver, e);
                SequenceScore::fallback(current, FallbackReason::Failed(e.to_string()))
            }
        }
    }

    fn try_score(&self, current: &DriverRaceRecord, history: &[DriverRaceRecord]) -> Result<f64> {
        // Only the most recent `window` races feed the model
        let recent = &history[history.len() - self.window..];
        let input = SequenceFeatureBuilder::new(&self.artifacts, self.window).build(current, recent)?;
        let score = self.model.predict(&input.history, &input.current)?;
        if !score.is_finite() {
            return Err(F1Error::Model(format!("non-finite sequence score {}", score)));
        }
        Ok(score as f64)
    }
}

/// Fitted preprocessing shipped with the win classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldArtifacts {
    pub scaler: StandardScaler,
}

impl FieldArtifacts {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            F1Error::Model(format!("Failed to read artifacts {}: {}", path.display(), e))
        })?;
        let artifacts: FieldArtifacts = serde_json::from_str(&content)?;
        artifacts.validate()?;
        Ok(artifacts)
    }

    /// The scaler must cover exactly the classifier inputs, in order
    pub fn validate(&self) -> Result<()> {
        self.scaler.validate()?;
        if self.scaler.features.iter().map(String::as_str).ne(FieldFeatures::NAMES) {
            return Err(F1Error::Model(format!(
                "classifier scaler features {:?} do not match {:?}",
                self.scaler.features,
                FieldFeatures::NAMES
            )));
        }
        Ok(())
    }
}

/// Field-wide win probability scorer
pub struct ProbabilisticScorer {
    model: Box<dyn FieldModel>,
    artifacts: FieldArtifacts,
    sessions: SessionHistory,
    temperature: f64,
    min_season: i32,
}

impl ProbabilisticScorer {
    pub fn new(
        model: Box<dyn FieldModel>,
        artifacts: FieldArtifacts,
        sessions: SessionHistory,
        temperature: f64,
        min_season: i32,
    ) -> Result<Self> {
        artifacts.validate()?;
        if !(temperature.is_finite() && temperature > 0.0) {
            return Err(F1Error::Config(format!(
                "softmax temperature must be positive and finite, got {}",
                temperature
            )));
        }
        Ok(ProbabilisticScorer {
            model,
            artifacts,
            sessions,
            temperature,
            min_season,
        })
    }

    /// Load the burn classifier, its scaler and the session rows
    pub fn load(config: &crate::ProbabilityConfig) -> Result<Self> {
        let artifacts = FieldArtifacts::load(&config.artifacts_path)?;
        let sessions = SessionHistory::load(&config.sessions_path)?;
        let model = LoadedWinClassifier::<InferenceBackend>::load(
            Default::default(),
            &config.model_path,
            WinClassifierConfig {
                hidden_dims: config.hidden_dims.clone(),
                ..WinClassifierConfig::default()
            },
        )?;
        Self::new(
            Box::new(model),
            artifacts,
            sessions,
            config.temperature,
            config.min_season,
        )
    }

    /// First season the session data supports
    pub fn min_season(&self) -> i32 {
        self.min_season
    }

    pub fn covers(&self, season: i32) -> bool {
        season >= self.min_season
    }

    pub fn sessions(&self) -> &SessionHistory {
        &self.sessions
    }

    /// Renormalized win probabilities for one field, summing to 1
    pub fn score_field(&self, field: &[FieldFeatures]) -> Result<Vec<f64>> {
        let matrix = field
            .iter()
            .map(|f| -> Result<Vec<f32>> {
                let raw: Vec<f64> = f.to_vec().into_iter().map(f64::from).collect();
                let scaled = self.artifacts.scaler.transform(&raw)?;
                Ok(scaled.into_iter().map(|v| v as f32).collect())
            })
            .collect::<Result<Vec<Vec<f32>>>>()?;

        let raw = self.model.predict_field(&matrix)?;
        if raw.len() != field.len() {
            return Err(F1Error::ShapeMismatch {
                what: "classifier output",
                expected: field.len(),
                got: raw.len(),
            });
        }

        let raw: Vec<f64> = raw.into_iter().map(f64::from).collect();
        Ok(softmax_renormalize(&raw, self.temperature))
    }

    /// Score every driver of the session matching (season, circuit)
    pub fn score_race(&self, season: i32, circuit: &str) -> Result<Vec<ScoredDriver>> {
        let rows = self.sessions.find_session(season, circuit)?;
        let field = rows
            .iter()
            .map(|e| FieldFeatures::from_entry(e))
            .collect::<Result<Vec<_>>>()?;
        let probs = self.score_field(&field)?;

        Ok(rows
            .iter()
            .zip(probs)
            .map(|(entry, p)| {
                let mut scored = ScoredDriver::from_session(entry);
                scored.probability = Some(p);
                scored
            })
            .collect())
    }

    /// Driver code -> probability for one race
    pub fn probability_map(&self, season: i32, circuit: &str) -> Result<HashMap<String, f64>> {
        Ok(self
            .score_race(season, circuit)?
            .into_iter()
            .map(|d| {
                let p = d.probability_value();
                (d.driver, p)
            })
            .collect())
    }
}

/// Which model families loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStatus {
    pub sequence: bool,
    pub probability: bool,
    pub fused: bool,
}

/// Immutable set of loaded scorers, shared by every request
#[derive(Default)]
pub struct ModelRegistry {
    sequence: Option<SequenceScorer>,
    probability: Option<ProbabilisticScorer>,
}

impl ModelRegistry {
    pub fn new(sequence: Option<SequenceScorer>, probability: Option<ProbabilisticScorer>) -> Self {
        ModelRegistry {
            sequence,
            probability,
        }
    }

    /// Load every family; a family that fails to load is left out
    pub fn load(config: &Config) -> Self {
        let sequence = match SequenceScorer::load(&config.sequence) {
            Ok(scorer) => {
                log::info!("Sequence model loaded (window {})", scorer.window());
                Some(scorer)
            }
            Err(e) => {
                log::warn!("Sequence model unavailable: {}", e);
                None
            }
        };

        let probability = match ProbabilisticScorer::load(&config.probability) {
            Ok(scorer) => {
                log::info!(
                    "Win classifier loaded ({} session rows, seasons {}+)",
                    scorer.sessions().len(),
                    scorer.min_season()
                );
                Some(scorer)
            }
            Err(e) => {
                log::warn!("Win classifier unavailable: {}", e);
                None
            }
        };

        Self::new(sequence, probability)
    }

    pub fn sequence(&self) -> Option<&SequenceScorer> {
        self.sequence.as_ref()
    }

    pub fn probability(&self) -> Option<&ProbabilisticScorer> {
        self.probability.as_ref()
    }

    /// Fused mode needs at least one family
    pub fn supports(&self, mode: PredictionMode) -> bool {
        match mode {
            PredictionMode::Sequence => self.sequence.is_some(),
            PredictionMode::Probability => self.probability.is_some(),
            PredictionMode::Fused => self.sequence.is_some() || self.probability.is_some(),
        }
    }

    pub fn status(&self) -> RegistryStatus {
        RegistryStatus {
            sequence: self.supports(PredictionMode::Sequence),
            probability: self.supports(PredictionMode::Probability),
            fused: self.supports(PredictionMode::Fused),
        }
    }
}
