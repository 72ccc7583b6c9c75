//! Win classifier input representation
//!
//! Each driver in a session is encoded as a fixed 8-value feature vector.

use crate::data::SessionEntry;
use crate::{F1Error, Result};

/// Features for one driver in one session, in classifier input order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldFeatures {
    /// Starting grid slot
    pub grid_position: f32,
    /// Mean lap time over the race (seconds)
    pub avg_race_pace: f32,
    /// Lap time standard deviation
    pub pace_consistency: f32,
    /// Speed trap maximum (km/h)
    pub top_speed: f32,
    /// Team label code
    pub team_encoded: f32,
    pub track_temperature: f32,
    /// 0.0 - 1.0
    pub rain_probability: f32,
    /// Driver label code
    pub driver_encoded: f32,
}

impl FieldFeatures {
    /// Dimension of feature vector
    pub const DIM: usize = 8;

    /// Column names in vector order
    pub const NAMES: [&'static str; Self::DIM] = [
        "grid_position",
        "avg_race_pace",
        "pace_consistency",
        "top_speed",
        "team_encoded",
        "track_temperature",
        "rain_probability",
        "driver_encoded",
    ];

    /// Extract from a session row; any missing column fails the row
    pub fn from_entry(entry: &SessionEntry) -> Result<Self> {
        fn require(value: Option<f64>, name: &str) -> Result<f32> {
            value
                .map(|v| v as f32)
                .ok_or_else(|| F1Error::MissingColumn(name.to_string()))
        }

        Ok(FieldFeatures {
            grid_position: require(entry.grid_position, "grid_position")?,
            avg_race_pace: require(entry.avg_race_pace, "avg_race_pace")?,
            pace_consistency: require(entry.pace_consistency, "pace_consistency")?,
            top_speed: require(entry.top_speed, "top_speed")?,
            team_encoded: require(entry.team_encoded, "team_encoded")?,
            track_temperature: require(entry.track_temperature, "track_temperature")?,
            rain_probability: require(entry.rain_probability, "rain_probability")?,
            driver_encoded: require(entry.driver_encoded, "driver_encoded")?,
        })
    }

    /// Convert to a flat vector
    pub fn to_vec(&self) -> Vec<f32> {
        vec![
            self.grid_position,
            self.avg_race_pace,
            self.pace_consistency,
            self.top_speed,
            self.team_encoded,
            self.track_temperature,
            self.rain_probability,
            self.driver_encoded,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sessions::tests::session_entry;

    #[test]
    fn test_from_entry_order() {
        let entry = session_entry(1, "2024-09-01", "Monza", "LEC", 4.0);
        let features = FieldFeatures::from_entry(&entry).unwrap();
        let v = features.to_vec();

        assert_eq!(v.len(), FieldFeatures::DIM);
        assert_eq!(v[0], 4.0);
        assert_eq!(v[3], 320.0);
        assert_eq!(v[7], 7.0);
    }

    #[test]
    fn test_missing_column_fails() {
        let mut entry = session_entry(1, "2024-09-01", "Monza", "LEC", 4.0);
        entry.track_temperature = None;

        let err = FieldFeatures::from_entry(&entry).unwrap_err();
        assert!(matches!(err, F1Error::MissingColumn(ref c) if c == "track_temperature"));
    }
}
