//! Prediction engine
//!
//! Score providers, rank fusion and response assembly behind a single
//! `Predictor` entry point.

pub mod assemble;
pub mod fusion;
pub mod inference;
pub mod scorer;

pub use assemble::{format_response, team_color, PredictionResponse, PredictionResult};
pub use fusion::{RankedDriver, ScoreOrdering, ScoreSource, ScoredDriver};
pub use inference::Predictor;
pub use scorer::{
    FallbackReason, FieldArtifacts, ModelRegistry, ProbabilisticScorer, RegistryStatus,
    SequenceScore, SequenceScorer,
};
