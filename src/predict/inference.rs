//! Request orchestration for race predictions

use std::sync::Arc;

use super::assemble::PredictionResponse;
use super::fusion::{rank_by_source, rank_fused, RankedDriver, ScoreSource, ScoredDriver};
use super::scorer::{FallbackReason, ModelRegistry, SequenceScore, SequenceScorer};
use crate::data::RaceStore;
use crate::{DriverRaceRecord, F1Error, PredictionMode, PredictionRequest, Result};

/// Serves predictions from a race store and a shared set of loaded models
pub struct Predictor<S: RaceStore> {
    store: S,
    models: Arc<ModelRegistry>,
}

impl<S: RaceStore> Predictor<S> {
    pub fn new(store: S, models: Arc<ModelRegistry>) -> Self {
        Predictor { store, models }
    }

    /// Reject requests that cannot be served before touching any data
    pub fn validate(&self, request: &PredictionRequest) -> Result<()> {
        if request.circuit.trim().is_empty() {
            return Err(F1Error::UnsupportedRequest("circuit must not be empty".to_string()));
        }
        if !self.models.supports(request.mode) {
            return Err(F1Error::CapabilityUnavailable(request.mode));
        }
        if request.mode == PredictionMode::Probability {
            if let Some(scorer) = self.models.probability() {
                if !scorer.covers(request.season) {
                    return Err(F1Error::UnsupportedRequest(format!(
                        "probability mode needs season {} or later, got {}",
                        scorer.min_season(),
                        request.season
                    )));
                }
            }
        }
        Ok(())
    }

    /// Predict one race.
    ///
    /// Capability and validation errors are returned as `Err`; a race that
    /// cannot be found or scored yields `Ok` with `success == false`.
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        self.validate(request)?;

        match self.rank(request) {
            Ok(ranked) => {
                log::info!(
                    "Predicted {} {} ({} mode, {} drivers)",
                    request.circuit,
                    request.season,
                    request.mode,
                    ranked.len()
                );
                Ok(PredictionResponse::success(request, &ranked))
            }
            Err(e) if e.is_race_level() => {
                log::warn!(
                    "Prediction failed for {} {} ({} mode): {}",
                    request.circuit,
                    request.season,
                    request.mode,
                    e
                );
                Ok(PredictionResponse::failure(request, &e))
            }
            Err(e) => Err(e),
        }
    }

    fn rank(&self, request: &PredictionRequest) -> Result<Vec<RankedDriver>> {
        match request.mode {
            PredictionMode::Sequence => {
                let drivers = self.score_sequence(request)?;
                Ok(rank_by_source(drivers, ScoreSource::Sequence))
            }
            PredictionMode::Probability => {
                let scorer = self
                    .models
                    .probability()
                    .ok_or(F1Error::CapabilityUnavailable(PredictionMode::Probability))?;
                let drivers = scorer.score_race(request.season, &request.circuit)?;
                Ok(rank_by_source(drivers, ScoreSource::Probability))
            }
            PredictionMode::Fused => {
                let mut drivers = self.score_sequence(request)?;
                self.attach_probabilities(request, &mut drivers);
                Ok(rank_fused(drivers))
            }
        }
    }

    /// Entered field for the requested race, in store order
    fn race_entries(&self, request: &PredictionRequest) -> Result<Vec<DriverRaceRecord>> {
        let not_found = || F1Error::RaceNotFound {
            season: request.season,
            circuit: request.circuit.clone(),
        };

        let round = self
            .store
            .find_round(request.season, &request.circuit)?
            .ok_or_else(not_found)?;
        let entries = self.store.race_entries(request.season, round)?;
        if entries.is_empty() {
            return Err(not_found());
        }
        Ok(entries)
    }

    /// Sequence score for every entered driver; never drops a driver
    fn score_sequence(&self, request: &PredictionRequest) -> Result<Vec<ScoredDriver>> {
        let entries = self.race_entries(request)?;
        let scorer = self.models.sequence();

        let drivers: Vec<ScoredDriver> = entries
            .iter()
            .map(|record| {
                let score = match scorer {
                    Some(scorer) => self.sequence_score(scorer, record),
                    None => SequenceScore::fallback(record, FallbackReason::ModelUnavailable),
                };
                let mut scored = ScoredDriver::from_record(record);
                scored.sequence_score = Some(score);
                scored
            })
            .collect();

        let fallbacks = drivers
            .iter()
            .filter(|d| d.sequence_score.as_ref().is_some_and(SequenceScore::is_fallback))
            .count();
        if fallbacks > 0 {
            log::debug!(
                "{} of {} drivers scored by grid position",
                fallbacks,
                drivers.len()
            );
        }

        Ok(drivers)
    }

    fn sequence_score(&self, scorer: &SequenceScorer, record: &DriverRaceRecord) -> SequenceScore {
        match self
            .store
            .prior_entries(&record.driver, record.season, record.round, scorer.window())
        {
            Ok(history) => scorer.score(record, &history),
            Err(e) => {
                log::debug!("History lookup failed for {}: {}", record.driver, e);
                SequenceScore::fallback(record, FallbackReason::Failed(e.to_string()))
            }
        }
    }

    /// Add classifier probabilities where available; failures leave the
    /// field on sequence ranks alone
    fn attach_probabilities(&self, request: &PredictionRequest, drivers: &mut [ScoredDriver]) {
        let Some(scorer) = self.models.probability() else {
            return;
        };
        if !scorer.covers(request.season) {
            log::debug!(
                "Season {} predates session data, fusing without probabilities",
                request.season
            );
            return;
        }

        match scorer.probability_map(request.season, &request.circuit) {
            Ok(probabilities) => {
                for driver in drivers.iter_mut() {
                    if let Some(&p) = probabilities.get(&driver.driver) {
                        driver.probability = Some(p);
                    }
                }
            }
            Err(e) => log::warn!("Probability scoring skipped for fused prediction: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sessions::tests::session_entry;
    use crate::data::{Database, SessionHistory};
    use crate::features::sequence::tests::record;
    use crate::predict::assemble::UNKNOWN_WINNER;
    use crate::predict::scorer::tests::{probabilistic_scorer, sequence_scorer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn seed_race(db: &Database, season: i32, round: u32, circuit: &str, field: &[(&str, u32, Option<u32>)]) {
        for &(driver, grid, fin) in field {
            let mut entry = record(driver, season, round, grid, fin);
            entry.circuit = circuit.to_string();
            db.upsert_entry(&entry).unwrap();
        }
    }

    fn seed_history(db: &Database, driver: &str, season: i32, races: u32) {
        for round in 1..=races {
            db.upsert_entry(&record(driver, season, round, 5, Some(4))).unwrap();
        }
    }

    /// Store that counts queries and either finds nothing or fails every query
    struct CountingStore {
        calls: Arc<AtomicUsize>,
        broken: bool,
    }

    impl CountingStore {
        fn query<T>(&self, empty: T) -> Result<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.broken {
                Err(F1Error::Database(rusqlite::Error::InvalidQuery))
            } else {
                Ok(empty)
            }
        }
    }

    impl RaceStore for CountingStore {
        fn find_round(&self, _season: i32, _circuit: &str) -> Result<Option<u32>> {
            self.query(None)
        }

        fn race_entries(&self, _season: i32, _round: u32) -> Result<Vec<DriverRaceRecord>> {
            self.query(Vec::new())
        }

        fn prior_entries(
            &self,
            _driver: &str,
            _season: i32,
            _round: u32,
            _limit: usize,
        ) -> Result<Vec<DriverRaceRecord>> {
            self.query(Vec::new())
        }
    }

    fn counting_store(broken: bool) -> (CountingStore, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            calls: Arc::clone(&calls),
            broken,
        };
        (store, calls)
    }

    fn drivers(response: &PredictionResponse) -> Vec<&str> {
        response.predictions.iter().map(|p| p.driver.as_str()).collect()
    }

    #[test]
    fn test_sequence_mode_orders_by_grid_without_history() {
        let db = Database::in_memory().unwrap();
        seed_race(
            &db,
            2024,
            4,
            "Suzuka",
            &[("OCO", 2, Some(3)), ("GAS", 1, Some(2)), ("DOO", 3, Some(1))],
        );
        let (scorer, calls) = sequence_scorer(5);
        let predictor = Predictor::new(db, Arc::new(ModelRegistry::new(Some(scorer), None)));

        let request = PredictionRequest::new(2024, "Suzuka", PredictionMode::Sequence);
        let response = predictor.predict(&request).unwrap();

        assert!(response.success);
        assert_eq!(drivers(&response), vec!["GAS", "OCO", "DOO"]);
        let positions: Vec<u32> = response.predictions.iter().map(|p| p.predicted_position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert_eq!(response.predicted_winner, "GAS");
        assert_eq!(response.actual_winner, "DOO");
        assert_eq!(response.predictions[0].win_probability, 100.0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sequence_mode_uses_model_with_full_history() {
        let db = Database::in_memory().unwrap();
        seed_history(&db, "ALB", 2023, 5);
        seed_history(&db, "SAR", 2023, 2);
        seed_race(&db, 2024, 1, "Sakhir", &[("SAR", 1, None), ("ALB", 10, None)]);

        let (scorer, calls) = sequence_scorer(5);
        let predictor = Predictor::new(db, Arc::new(ModelRegistry::new(Some(scorer), None)));
        let response = predictor
            .predict(&PredictionRequest::new(2024, "sakhir", PredictionMode::Sequence))
            .unwrap();

        // ALB scores -10 from the model, SAR falls back to grid 1
        assert_eq!(drivers(&response), vec!["ALB", "SAR"]);
        assert_eq!(response.actual_winner, UNKNOWN_WINNER);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_probability_mode_tie_keeps_input_order() {
        let sessions = SessionHistory::new(vec![
            session_entry(11, "2024-04-07", "Suzuka", "TSU", 3.0),
            session_entry(11, "2024-04-07", "Suzuka", "LAW", 1.0),
            session_entry(11, "2024-04-07", "Suzuka", "HAD", 2.0),
        ]);
        let scorer = probabilistic_scorer(sessions, vec![(1.0, 0.1), (2.0, 0.1), (3.0, 0.1)]);
        let predictor = Predictor::new(
            Database::in_memory().unwrap(),
            Arc::new(ModelRegistry::new(None, Some(scorer))),
        );

        let response = predictor
            .predict(&PredictionRequest::new(2024, "Suzuka", PredictionMode::Probability))
            .unwrap();

        assert_eq!(drivers(&response), vec!["TSU", "LAW", "HAD"]);
        for p in &response.predictions {
            assert!((p.win_probability - 33.333).abs() < 0.01);
        }
    }

    #[test]
    fn test_fused_mode_ranks_exactly_the_entered_field() {
        let db = Database::in_memory().unwrap();
        seed_history(&db, "ALB", 2023, 5);
        seed_history(&db, "SAR", 2023, 5);
        seed_race(
            &db,
            2024,
            3,
            "Melbourne",
            &[
                ("ALB", 4, Some(2)),
                ("SAR", 1, Some(5)),
                ("VER", 2, Some(1)),
                ("NOR", 3, Some(3)),
                ("PIA", 5, None),
                ("HAM", 6, Some(4)),
            ],
        );
        let sessions = SessionHistory::new(vec![
            session_entry(77, "2024-03-24", "Melbourne Grand Prix Circuit", "VER", 2.0),
            session_entry(77, "2024-03-24", "Melbourne Grand Prix Circuit", "NOR", 3.0),
            session_entry(77, "2024-03-24", "Melbourne Grand Prix Circuit", "XXX", 9.0),
        ]);
        let (sequence, calls) = sequence_scorer(5);
        let probability = probabilistic_scorer(sessions, vec![(2.0, 0.9), (3.0, 0.4), (9.0, 0.2)]);
        let predictor = Predictor::new(
            db,
            Arc::new(ModelRegistry::new(Some(sequence), Some(probability))),
        );

        let response = predictor
            .predict(&PredictionRequest::new(2024, "Melbourne", PredictionMode::Fused))
            .unwrap();

        // Consensus: ALB 1, SAR 2, VER (3+1)/2 = 2, NOR (4+2)/2 = 3, PIA 5, HAM 6
        assert_eq!(drivers(&response), vec!["ALB", "SAR", "VER", "NOR", "PIA", "HAM"]);
        let mut positions: Vec<u32> = response.predictions.iter().map(|p| p.predicted_position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=6).collect::<Vec<u32>>());

        assert_eq!(response.predictions[0].win_probability, 100.0);
        assert_eq!(response.predictions[1].win_probability, 95.0);
        let ver = response.predictions[2].win_probability;
        assert!(ver > 0.0 && ver < 100.0);
        assert_eq!(response.actual_winner, "VER");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fused_mode_survives_missing_session() {
        let db = Database::in_memory().unwrap();
        seed_race(&db, 2024, 9, "Imola", &[("RUS", 2, None), ("HAM", 1, None)]);
        let probability = probabilistic_scorer(SessionHistory::default(), vec![]);
        let predictor = Predictor::new(db, Arc::new(ModelRegistry::new(None, Some(probability))));

        let response = predictor
            .predict(&PredictionRequest::new(2024, "Imola", PredictionMode::Fused))
            .unwrap();

        assert!(response.success);
        assert_eq!(drivers(&response), vec!["HAM", "RUS"]);
        let probs: Vec<f64> = response.predictions.iter().map(|p| p.win_probability).collect();
        assert_eq!(probs, vec![100.0, 95.0]);
    }

    #[test]
    fn test_unloaded_capability_is_rejected() {
        let predictor = Predictor::new(Database::in_memory().unwrap(), Arc::new(ModelRegistry::default()));
        let result = predictor.predict(&PredictionRequest::new(2024, "Monza", PredictionMode::Fused));
        assert!(matches!(
            result,
            Err(F1Error::CapabilityUnavailable(PredictionMode::Fused))
        ));

        let (scorer, _) = sequence_scorer(5);
        let predictor = Predictor::new(
            Database::in_memory().unwrap(),
            Arc::new(ModelRegistry::new(Some(scorer), None)),
        );
        let result = predictor.predict(&PredictionRequest::new(2024, "Monza", PredictionMode::Probability));
        assert!(matches!(
            result,
            Err(F1Error::CapabilityUnavailable(PredictionMode::Probability))
        ));
    }

    #[test]
    fn test_probability_mode_rejects_early_season() {
        let scorer = probabilistic_scorer(SessionHistory::default(), vec![]);
        let predictor = Predictor::new(
            Database::in_memory().unwrap(),
            Arc::new(ModelRegistry::new(None, Some(scorer))),
        );

        let result = predictor.predict(&PredictionRequest::new(2021, "Monza", PredictionMode::Probability));
        assert!(matches!(result, Err(F1Error::UnsupportedRequest(_))));

        let result = predictor.predict(&PredictionRequest::new(2024, "  ", PredictionMode::Probability));
        assert!(matches!(result, Err(F1Error::UnsupportedRequest(_))));
    }

    #[test]
    fn test_unknown_race_is_a_failed_response() {
        let (scorer, _) = sequence_scorer(5);
        let predictor = Predictor::new(
            Database::in_memory().unwrap(),
            Arc::new(ModelRegistry::new(Some(scorer), None)),
        );

        let response = predictor
            .predict(&PredictionRequest::new(2019, "Hockenheim", PredictionMode::Sequence))
            .unwrap();
        assert!(!response.success);
        assert!(response.predictions.is_empty());
        assert_eq!(response.predicted_winner, "");
        assert!(response.error.is_some());
    }

    #[test]
    fn test_probability_mode_missing_session_is_a_failed_response() {
        let scorer = probabilistic_scorer(SessionHistory::default(), vec![]);
        let predictor = Predictor::new(
            Database::in_memory().unwrap(),
            Arc::new(ModelRegistry::new(None, Some(scorer))),
        );

        let response = predictor
            .predict(&PredictionRequest::new(2024, "Las Vegas", PredictionMode::Probability))
            .unwrap();
        assert!(!response.success);
        assert_eq!(response.actual_winner, "");
    }

    #[test]
    fn test_concurrent_requests_share_registry() {
        let (scorer, calls) = sequence_scorer(5);
        let registry = Arc::new(ModelRegistry::new(Some(scorer), None));

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let db = Database::in_memory().unwrap();
                    seed_history(&db, "ALB", 2023, 5);
                    seed_race(&db, 2024, 1, "Bahrain", &[("SAR", 1 + i, None), ("ALB", 20, None)]);
                    let predictor = Predictor::new(db, registry);
                    predictor
                        .predict(&PredictionRequest::new(2024, "Bahrain", PredictionMode::Sequence))
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            let response = handle.join().unwrap();
            assert!(response.success);
            assert_eq!(response.predicted_winner, "ALB");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_fused_mode_ignores_probabilities_before_session_coverage() {
        let db = Database::in_memory().unwrap();
        seed_race(
            &db,
            2021,
            14,
            "Monza",
            &[("NOR", 2, Some(2)), ("RIC", 1, Some(1)), ("BOT", 3, Some(3))],
        );
        // Matching session rows exist but 2021 predates the covered range
        let sessions = SessionHistory::new(vec![
            session_entry(21, "2021-09-12", "Monza", "NOR", 2.0),
            session_entry(21, "2021-09-12", "Monza", "RIC", 1.0),
            session_entry(21, "2021-09-12", "Monza", "BOT", 3.0),
        ]);
        let probability = probabilistic_scorer(sessions, vec![(1.0, 0.1), (2.0, 0.9), (3.0, 0.5)]);
        let (sequence, calls) = sequence_scorer(5);
        let predictor = Predictor::new(
            db,
            Arc::new(ModelRegistry::new(Some(sequence), Some(probability))),
        );

        let response = predictor
            .predict(&PredictionRequest::new(2021, "Monza", PredictionMode::Fused))
            .unwrap();

        assert!(response.success);
        assert_eq!(drivers(&response), vec!["RIC", "NOR", "BOT"]);
        let probs: Vec<f64> = response.predictions.iter().map(|p| p.win_probability).collect();
        assert_eq!(probs, vec![100.0, 95.0, 90.0]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_rejected_requests_never_query_the_store() {
        let (store, calls) = counting_store(false);
        let scorer = probabilistic_scorer(SessionHistory::default(), vec![]);
        let predictor = Predictor::new(store, Arc::new(ModelRegistry::new(None, Some(scorer))));

        let early = predictor.predict(&PredictionRequest::new(2021, "Monza", PredictionMode::Probability));
        assert!(matches!(early, Err(F1Error::UnsupportedRequest(_))));

        let unloaded = predictor.predict(&PredictionRequest::new(2024, "Monza", PredictionMode::Sequence));
        assert!(matches!(
            unloaded,
            Err(F1Error::CapabilityUnavailable(PredictionMode::Sequence))
        ));

        let blank = predictor.predict(&PredictionRequest::new(2024, "", PredictionMode::Fused));
        assert!(matches!(blank, Err(F1Error::UnsupportedRequest(_))));

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // An accepted request does reach the store
        let response = predictor
            .predict(&PredictionRequest::new(2024, "Monza", PredictionMode::Fused))
            .unwrap();
        assert!(!response.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_store_failure_is_not_a_race_outcome() {
        let (store, calls) = counting_store(true);
        let (scorer, _) = sequence_scorer(5);
        let predictor = Predictor::new(store, Arc::new(ModelRegistry::new(Some(scorer), None)));

        let result = predictor.predict(&PredictionRequest::new(2024, "Monza", PredictionMode::Sequence));
        assert!(matches!(result, Err(F1Error::Database(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
