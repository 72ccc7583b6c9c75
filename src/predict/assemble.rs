//! Response shaping for ranked predictions

use serde::{Deserialize, Serialize};

use super::fusion::RankedDriver;
use crate::{F1Error, PredictionMode, PredictionRequest};

/// Team display colors, matched in order by case-insensitive substring
pub const TEAM_COLORS: &[(&str, &str)] = &[
    ("Red Bull Racing", "#3671C6"),
    ("Ferrari", "#E8002D"),
    ("Mercedes", "#27F4D2"),
    ("McLaren", "#FF8000"),
    ("Aston Martin", "#229971"),
    ("Alpine", "#FF87BC"),
    ("Williams", "#64C4FF"),
    ("AlphaTauri", "#5E8FAA"),
    ("RB", "#6692FF"),
    ("Alfa Romeo", "#C92D4B"),
    ("Haas F1 Team", "#B6BABD"),
    ("Kick Sauber", "#52E252"),
    ("Racing Point", "#F596C8"),
    ("Renault", "#FFF500"),
];

pub const DEFAULT_TEAM_COLOR: &str = "#888888";

/// Actual winner when no driver finished first
pub const UNKNOWN_WINNER: &str = "Unknown";

/// First table entry whose name occurs in `team`
pub fn team_color(team: &str) -> &'static str {
    let team = team.to_lowercase();
    TEAM_COLORS
        .iter()
        .find(|(name, _)| team.contains(&name.to_lowercase()))
        .map_or(DEFAULT_TEAM_COLOR, |(_, color)| *color)
}

/// One driver in the response, in predicted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub grid_position: u32,
    pub driver: String,
    pub team: String,
    pub predicted_position: u32,
    pub actual_position: Option<u32>,
    /// 0..=100
    pub win_probability: f64,
    pub team_color: String,
}

impl From<&RankedDriver> for PredictionResult {
    fn from(ranked: &RankedDriver) -> Self {
        PredictionResult {
            grid_position: ranked.scored.grid_position,
            driver: ranked.scored.driver.clone(),
            team: ranked.scored.team.clone(),
            predicted_position: ranked.predicted_position,
            actual_position: ranked.scored.final_position,
            win_probability: ranked.win_probability,
            team_color: team_color(&ranked.scored.team).to_string(),
        }
    }
}

/// Result of one prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub success: bool,
    pub season: i32,
    pub circuit: String,
    pub mode: PredictionMode,
    pub predictions: Vec<PredictionResult>,
    pub predicted_winner: String,
    pub actual_winner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResponse {
    pub fn success(request: &PredictionRequest, ranked: &[RankedDriver]) -> Self {
        let predictions: Vec<PredictionResult> = ranked.iter().map(PredictionResult::from).collect();

        let predicted_winner = predictions
            .first()
            .map(|p| p.driver.clone())
            .unwrap_or_default();
        let actual_winner = predictions
            .iter()
            .find(|p| p.actual_position == Some(1))
            .map_or_else(|| UNKNOWN_WINNER.to_string(), |p| p.driver.clone());

        PredictionResponse {
            success: true,
            season: request.season,
            circuit: request.circuit.clone(),
            mode: request.mode,
            predictions,
            predicted_winner,
            actual_winner,
            error: None,
        }
    }

    /// A race-level failure: empty results and the reason
    pub fn failure(request: &PredictionRequest, error: &F1Error) -> Self {
        PredictionResponse {
            success: false,
            season: request.season,
            circuit: request.circuit.clone(),
            mode: request.mode,
            predictions: Vec::new(),
            predicted_winner: String::new(),
            actual_winner: String::new(),
            error: Some(error.to_string()),
        }
    }

    /// CSV with a header row
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "predicted_position,driver,team,grid_position,actual_position,win_probability\n",
        );
        for p in &self.predictions {
            out.push_str(&format!(
                "{},{},{},{},{},{:.2}\n",
                p.predicted_position,
                p.driver,
                csv_field(&p.team),
                p.grid_position,
                p.actual_position.map(|a| a.to_string()).unwrap_or_default(),
                p.win_probability
            ));
        }
        out
    }
}

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Human-readable table for the terminal
pub fn format_response(response: &PredictionResponse) -> String {
    let mut out = String::new();
    out.push_str("\n┌──────────────────────────────────────────────────────────┐\n");
    out.push_str(&format!(
        "│  {} {} ({} mode)\n",
        response.circuit, response.season, response.mode
    ));
    out.push_str("├──────────────────────────────────────────────────────────┤\n");

    if !response.success {
        out.push_str(&format!(
            "│  Prediction failed: {}\n",
            response.error.as_deref().unwrap_or("unknown error")
        ));
        out.push_str("└──────────────────────────────────────────────────────────┘\n");
        return out;
    }

    out.push_str(&format!(
        "│  {:>4}  {:<6} {:<24} {:>5} {:>7} {:>7}\n",
        "Pos", "Driver", "Team", "Grid", "Actual", "Win %"
    ));
    for p in &response.predictions {
        out.push_str(&format!(
            "│  {:>4}  {:<6} {:<24} {:>5} {:>7} {:>6.1}%\n",
            p.predicted_position,
            p.driver,
            p.team,
            p.grid_position,
            p.actual_position.map_or_else(|| "-".to_string(), |a| a.to_string()),
            p.win_probability
        ));
    }
    out.push_str("├──────────────────────────────────────────────────────────┤\n");
    out.push_str(&format!("│  Predicted winner: {}\n", response.predicted_winner));
    out.push_str(&format!("│  Actual winner:    {}\n", response.actual_winner));
    out.push_str("└──────────────────────────────────────────────────────────┘\n");
    out
}
