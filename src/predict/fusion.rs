//! Rank fusion across score types
//!
//! Sequence scores are ordinal (lower is better), classifier scores are
//! probabilities (higher is better). Both are turned into competition ranks,
//! combined per driver, and resolved into a unique 1..K finishing order with
//! ties broken by input order.

use std::cmp::Ordering;

use super::scorer::SequenceScore;
use crate::data::SessionEntry;
use crate::DriverRaceRecord;

/// Direction in which a score improves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreOrdering {
    /// Lower is better
    Ascending,
    /// Higher is better
    Descending,
}

impl ScoreOrdering {
    /// Order `a` before `b` when it is the better score
    pub fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            ScoreOrdering::Ascending => a.total_cmp(&b),
            ScoreOrdering::Descending => b.total_cmp(&a),
        }
    }

    /// Whether `a` is strictly better than `b`
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            ScoreOrdering::Ascending => a < b,
            ScoreOrdering::Descending => a > b,
        }
    }
}

/// The two score families a driver can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreSource {
    Sequence,
    Probability,
}

impl ScoreSource {
    pub fn ordering(self) -> ScoreOrdering {
        match self {
            ScoreSource::Sequence => ScoreOrdering::Ascending,
            ScoreSource::Probability => ScoreOrdering::Descending,
        }
    }
}

/// A driver with whatever raw scores were produced for it
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDriver {
    pub driver: String,
    pub team: String,
    pub grid_position: u32,
    pub final_position: Option<u32>,
    pub sequence_score: Option<SequenceScore>,
    /// Field-renormalized win probability, absent when not scored
    pub probability: Option<f64>,
    pub rank_sequence: Option<u32>,
    pub rank_probability: Option<u32>,
}

impl ScoredDriver {
    pub fn from_record(record: &DriverRaceRecord) -> Self {
        ScoredDriver {
            driver: record.driver.clone(),
            team: record.team.clone(),
            grid_position: record.grid_position,
            final_position: record.final_position,
            sequence_score: None,
            probability: None,
            rank_sequence: None,
            rank_probability: None,
        }
    }

    pub fn from_session(entry: &SessionEntry) -> Self {
        ScoredDriver {
            driver: entry.name_acronym.clone(),
            team: entry.team().to_string(),
            grid_position: entry.grid_position.map_or(0, |g| g.round().max(0.0) as u32),
            final_position: entry.final_position,
            sequence_score: None,
            probability: None,
            rank_sequence: None,
            rank_probability: None,
        }
    }

    /// Sequence score, grid position when the model produced none
    pub fn sequence_value(&self) -> f64 {
        self.sequence_score
            .as_ref()
            .map_or(self.grid_position as f64, SequenceScore::value)
    }

    /// Probability with "not available" as 0
    pub fn probability_value(&self) -> f64 {
        self.probability.unwrap_or(0.0)
    }

    fn value(&self, source: ScoreSource) -> f64 {
        match source {
            ScoreSource::Sequence => self.sequence_value(),
            ScoreSource::Probability => self.probability_value(),
        }
    }
}

/// A driver placed in the final predicted order
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDriver {
    pub scored: ScoredDriver,
    /// 1-based, unique within a race
    pub predicted_position: u32,
    /// Value the order was sorted on
    pub consensus_rank: f64,
    /// Presented win probability, 0..=100
    pub win_probability: f64,
}

/// Competition ("min") ranks: 1 + number of strictly better values
pub fn competition_rank(values: &[f64], ordering: ScoreOrdering) -> Vec<u32> {
    values
        .iter()
        .map(|&v| 1 + values.iter().filter(|&&other| ordering.is_better(other, v)).count() as u32)
        .collect()
}

/// Temperature-scaled softmax over the field; sums to 1
pub fn softmax_renormalize(raw: &[f64], temperature: f64) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }
    // Shift by the max; the ratio exp(a/T) / sum exp(x/T) is unchanged
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp: Vec<f64> = raw.iter().map(|&r| ((r - max) / temperature).exp()).collect();
    let sum: f64 = exp.iter().sum();
    exp.into_iter().map(|e| e / sum).collect()
}

/// Descending stand-in confidence for drivers without a probability.
///
/// A presentation heuristic (100, 95, 90, ... by final order), not a
/// calibrated probability.
pub fn placeholder_probability(index: usize) -> f64 {
    (100.0 - 5.0 * index as f64).max(0.0)
}

/// Average of both ranks when the driver has a probability, else the
/// sequence rank alone
pub fn consensus_rank(rank_sequence: u32, rank_probability: u32, probability: f64) -> f64 {
    if probability > 0.0 {
        (rank_sequence as f64 + rank_probability as f64) / 2.0
    } else {
        rank_sequence as f64
    }
}

/// Single-model ranking: stable sort on one score in its own direction
pub fn rank_by_source(drivers: Vec<ScoredDriver>, source: ScoreSource) -> Vec<RankedDriver> {
    let ordering = source.ordering();
    let values: Vec<f64> = drivers.iter().map(|d| d.value(source)).collect();
    let ranks = competition_rank(&values, ordering);

    let mut rows: Vec<(ScoredDriver, f64, u32)> = drivers
        .into_iter()
        .zip(values)
        .zip(ranks)
        .map(|((d, v), r)| (d, v, r))
        .collect();
    rows.sort_by(|a, b| ordering.compare(a.1, b.1));

    rows.into_iter()
        .enumerate()
        .map(|(i, (mut scored, value, rank))| {
            let win_probability = match source {
                ScoreSource::Sequence => {
                    scored.rank_sequence = Some(rank);
                    placeholder_probability(i)
                }
                ScoreSource::Probability => {
                    scored.rank_probability = Some(rank);
                    value * 100.0
                }
            };
            RankedDriver {
                scored,
                predicted_position: i as u32 + 1,
                consensus_rank: rank as f64,
                win_probability,
            }
        })
        .collect()
}

/// Fused ranking over sequence and probability signals
pub fn rank_fused(drivers: Vec<ScoredDriver>) -> Vec<RankedDriver> {
    let sequence: Vec<f64> = drivers.iter().map(ScoredDriver::sequence_value).collect();
    let probability: Vec<f64> = drivers.iter().map(ScoredDriver::probability_value).collect();
    let rank_sequence = competition_rank(&sequence, ScoreOrdering::Ascending);
    let rank_probability = competition_rank(&probability, ScoreOrdering::Descending);

    let mut rows: Vec<(ScoredDriver, f64)> = drivers
        .into_iter()
        .enumerate()
        .map(|(i, mut scored)| {
            scored.rank_sequence = Some(rank_sequence[i]);
            scored.rank_probability = Some(rank_probability[i]);
            let consensus = consensus_rank(rank_sequence[i], rank_probability[i], probability[i]);
            (scored, consensus)
        })
        .collect();
    rows.sort_by(|a, b| a.1.total_cmp(&b.1));

    rows.into_iter()
        .enumerate()
        .map(|(i, (scored, consensus))| {
            let p = scored.probability_value();
            let win_probability = if p > 0.0 {
                p * 100.0
            } else {
                placeholder_probability(i)
            };
            RankedDriver {
                scored,
                predicted_position: i as u32 + 1,
                consensus_rank: consensus,
                win_probability,
            }
        })
        .collect()
}
