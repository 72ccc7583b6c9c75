//! Per-session feature rows backing the win classifier
//!
//! One row per driver per race session with the raw pace, speed and weather
//! columns the classifier was trained on. Loaded once alongside the model.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::{F1Error, Result};

/// A driver's row in one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub session_key: i64,
    pub date: NaiveDate,
    pub circuit_name: String,
    /// Three-letter driver acronym, matches the race store's driver code
    pub name_acronym: String,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub grid_position: Option<f64>,
    #[serde(default)]
    pub final_position: Option<u32>,
    #[serde(default)]
    pub avg_race_pace: Option<f64>,
    #[serde(default)]
    pub pace_consistency: Option<f64>,
    #[serde(default)]
    pub top_speed: Option<f64>,
    #[serde(default)]
    pub team_encoded: Option<f64>,
    #[serde(default)]
    pub track_temperature: Option<f64>,
    #[serde(default)]
    pub rain_probability: Option<f64>,
    #[serde(default)]
    pub driver_encoded: Option<f64>,
}

impl SessionEntry {
    pub fn season(&self) -> i32 {
        self.date.year()
    }

    pub fn team(&self) -> &str {
        self.team_name.as_deref().unwrap_or("Unknown")
    }
}

/// Session rows in file order
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    entries: Vec<SessionEntry>,
}

impl SessionHistory {
    pub fn new(entries: Vec<SessionEntry>) -> Self {
        SessionHistory { entries }
    }

    /// Load a JSON array of session rows
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            F1Error::Model(format!("Failed to read sessions {}: {}", path.display(), e))
        })?;
        let entries: Vec<SessionEntry> = serde_json::from_str(&content)?;
        log::debug!("Loaded {} session rows from {}", entries.len(), path.display());
        Ok(Self::new(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Seasons covered, newest first
    pub fn seasons(&self) -> Vec<i32> {
        let seasons: BTreeSet<i32> = self.entries.iter().map(SessionEntry::season).collect();
        seasons.into_iter().rev().collect()
    }

    /// Rows of the first session in `season` whose circuit name contains
    /// `circuit` (case-insensitive)
    pub fn find_session(&self, season: i32, circuit: &str) -> Result<Vec<&SessionEntry>> {
        let needle = circuit.to_lowercase();
        let session_key = self
            .entries
            .iter()
            .find(|e| e.season() == season && e.circuit_name.to_lowercase().contains(&needle))
            .map(|e| e.session_key)
            .ok_or_else(|| F1Error::SessionNotFound {
                season,
                circuit: circuit.to_string(),
            })?;

        Ok(self
            .entries
            .iter()
            .filter(|e| e.session_key == session_key)
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn session_entry(
        session_key: i64,
        date: &str,
        circuit: &str,
        driver: &str,
        grid: f64,
    ) -> SessionEntry {
        SessionEntry {
            session_key,
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            circuit_name: circuit.to_string(),
            name_acronym: driver.to_string(),
            team_name: Some("McLaren".to_string()),
            grid_position: Some(grid),
            final_position: Some(grid as u32),
            avg_race_pace: Some(95.0),
            pace_consistency: Some(0.4),
            top_speed: Some(320.0),
            team_encoded: Some(3.0),
            track_temperature: Some(38.0),
            rain_probability: Some(0.0),
            driver_encoded: Some(7.0),
        }
    }

    #[test]
    fn test_find_session_by_year_and_circuit_substring() {
        let history = SessionHistory::new(vec![
            session_entry(9001, "2023-05-28", "Monaco", "VER", 1.0),
            session_entry(9001, "2023-05-28", "Monaco", "ALO", 2.0),
            session_entry(9100, "2024-05-26", "Monaco", "LEC", 1.0),
            session_entry(9002, "2023-07-09", "Silverstone", "NOR", 2.0),
        ]);

        let rows = history.find_session(2023, "mona").unwrap();
        let drivers: Vec<&str> = rows.iter().map(|e| e.name_acronym.as_str()).collect();
        assert_eq!(drivers, vec!["VER", "ALO"]);

        assert!(matches!(
            history.find_session(2022, "Monaco"),
            Err(F1Error::SessionNotFound { season: 2022, .. })
        ));
    }

    #[test]
    fn test_first_matching_session_wins() {
        // Sprint and race share the circuit; only the first key is used
        let history = SessionHistory::new(vec![
            session_entry(7, "2024-04-20", "Shanghai", "VER", 1.0),
            session_entry(8, "2024-04-21", "Shanghai", "VER", 1.0),
            session_entry(8, "2024-04-21", "Shanghai", "NOR", 2.0),
        ]);

        let rows = history.find_session(2024, "Shanghai").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].session_key, 7);
    }

    #[test]
    fn test_missing_optional_columns_deserialize() {
        let json = r#"[{"session_key": 1, "date": "2024-03-02", "circuit_name": "Sakhir",
                        "name_acronym": "PIA", "grid_position": 5.0}]"#;
        let entries: Vec<SessionEntry> = serde_json::from_str(json).unwrap();
        let history = SessionHistory::new(entries);

        assert_eq!(history.seasons(), vec![2024]);
        let rows = history.find_session(2024, "sakhir").unwrap();
        assert_eq!(rows[0].team(), "Unknown");
        assert_eq!(rows[0].top_speed, None);
    }
}
