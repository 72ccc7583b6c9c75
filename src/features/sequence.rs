//! Sequence model inputs
//!
//! Turns a driver's prior race window plus the current race row into the
//! flattened history and context vectors the sequence model was trained on.
//! Both vectors are cut out of one scaled, named feature space.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::encoding::LabelEncoder;
use super::scaler::StandardScaler;
use crate::{DriverRaceRecord, F1Error, Result};

/// Championship points for P1..P10
pub const POINTS_TABLE: [u32; 10] = [25, 18, 15, 12, 10, 8, 6, 4, 2, 1];

/// Trailing window for the points momentum feature
pub const MOMENTUM_WINDOW: usize = 3;

pub const POINTS: &str = "points";
pub const POSITION_GAIN: &str = "position_gain";
pub const DRIVER_MOMENTUM: &str = "driver_momentum";
pub const DRIVER_ENCODED: &str = "driver_encoded";
pub const TEAM_ENCODED: &str = "team_encoded";

/// Points awarded for a finishing position (0 outside the table or unknown)
pub fn points_for_position(position: Option<u32>) -> f64 {
    position
        .and_then(|p| p.checked_sub(1))
        .and_then(|idx| POINTS_TABLE.get(idx as usize))
        .map_or(0.0, |&pts| pts as f64)
}

/// Places gained from grid to flag (positive = gained)
pub fn position_gain(record: &DriverRaceRecord) -> Option<f64> {
    record
        .final_position
        .map(|fin| record.grid_position as f64 - fin as f64)
}

/// Trailing mean over up to `window` values, minimum one value
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let slice = &values[start..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Fitted preprocessing shipped with the sequence model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceArtifacts {
    /// Shared scaler; its feature list is the full named feature space
    pub scaler: StandardScaler,
    pub driver_encoder: LabelEncoder,
    pub team_encoder: LabelEncoder,
    /// Per-step history features, in model order
    pub hist_features: Vec<String>,
    /// Current-race context features, in model order
    pub curr_features: Vec<String>,
}

impl SequenceArtifacts {
    /// Load the JSON sidecar written at training time
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            F1Error::Model(format!("Failed to read artifacts {}: {}", path.display(), e))
        })?;
        let artifacts: SequenceArtifacts = serde_json::from_str(&content)?;
        artifacts.validate()?;
        Ok(artifacts)
    }

    pub fn all_features(&self) -> &[String] {
        &self.scaler.features
    }

    /// Every model input must be a column of the scaled space
    pub fn validate(&self) -> Result<()> {
        self.scaler.validate()?;
        for name in self.hist_features.iter().chain(&self.curr_features) {
            if self.scaler.index_of(name).is_none() {
                return Err(F1Error::MissingColumn(name.clone()));
            }
        }
        Ok(())
    }
}

/// Flattened model inputs for one driver
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceInput {
    /// `window * hist_features.len()` values, oldest race first
    pub history: Vec<f32>,
    /// `curr_features.len()` values
    pub current: Vec<f32>,
}

/// Builds sequence model inputs from race store rows
pub struct SequenceFeatureBuilder<'a> {
    artifacts: &'a SequenceArtifacts,
    window: usize,
}

impl<'a> SequenceFeatureBuilder<'a> {
    pub fn new(artifacts: &'a SequenceArtifacts, window: usize) -> Self {
        SequenceFeatureBuilder { artifacts, window }
    }

    /// Build inputs from exactly `window` prior races
    pub fn build(
        &self,
        current: &DriverRaceRecord,
        history: &[DriverRaceRecord],
    ) -> Result<SequenceInput> {
        if history.len() != self.window {
            return Err(F1Error::ShapeMismatch {
                what: "history window",
                expected: self.window,
                got: history.len(),
            });
        }
        ensure_chronological(history)?;

        let hist_idx = self.indices(&self.artifacts.hist_features)?;
        let curr_idx = self.indices(&self.artifacts.curr_features)?;

        let mut history_vec = Vec::with_capacity(self.window * hist_idx.len());
        for row in self.history_rows(history)? {
            let scaled = self.artifacts.scaler.transform(&row)?;
            history_vec.extend(hist_idx.iter().map(|&i| scaled[i] as f32));
        }

        let scaled = self.artifacts.scaler.transform(&self.current_row(current))?;
        let current_vec = curr_idx.iter().map(|&i| scaled[i] as f32).collect();

        Ok(SequenceInput {
            history: history_vec,
            current: current_vec,
        })
    }

    fn indices(&self, names: &[String]) -> Result<Vec<usize>> {
        names
            .iter()
            .map(|name| {
                self.artifacts
                    .scaler
                    .index_of(name)
                    .ok_or_else(|| F1Error::MissingColumn(name.clone()))
            })
            .collect()
    }

    /// Unscaled history rows over the full feature space; every column must exist
    fn history_rows(&self, history: &[DriverRaceRecord]) -> Result<Vec<Vec<f64>>> {
        let points: Vec<f64> = history
            .iter()
            .map(|r| points_for_position(r.final_position))
            .collect();
        let momentum = rolling_mean(&points, MOMENTUM_WINDOW);

        history
            .iter()
            .enumerate()
            .map(|(i, record)| {
                self.artifacts
                    .all_features()
                    .iter()
                    .map(|name| match name.as_str() {
                        POINTS => Ok(points[i]),
                        DRIVER_MOMENTUM => Ok(momentum[i]),
                        POSITION_GAIN => position_gain(record)
                            .ok_or_else(|| F1Error::MissingColumn("final_position".to_string())),
                        DRIVER_ENCODED => {
                            Ok(self.artifacts.driver_encoder.encode_or_default(&record.driver))
                        }
                        TEAM_ENCODED => Ok(self.artifacts.team_encoder.encode_or_default(&record.team)),
                        other => record
                            .column(other)
                            .ok_or_else(|| F1Error::MissingColumn(other.to_string())),
                    })
                    .collect()
            })
            .collect()
    }

    /// Unscaled current row; columns the race row lacks are 0
    fn current_row(&self, current: &DriverRaceRecord) -> Vec<f64> {
        self.artifacts
            .all_features()
            .iter()
            .map(|name| match name.as_str() {
                DRIVER_ENCODED => self.artifacts.driver_encoder.encode_or_default(&current.driver),
                TEAM_ENCODED => self.artifacts.team_encoder.encode_or_default(&current.team),
                other => current.column(other).unwrap_or(0.0),
            })
            .collect()
    }
}

/// History must be strictly ascending by (season, round)
fn ensure_chronological(history: &[DriverRaceRecord]) -> Result<()> {
    for pair in history.windows(2) {
        if pair[0].race_key() >= pair[1].race_key() {
            return Err(F1Error::HistoryOrder(format!(
                "{:?} is not before {:?}",
                pair[0].race_key(),
                pair[1].race_key()
            )));
        }
    }
    Ok(())
}
