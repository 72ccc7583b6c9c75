//! SQLite store for historical race results

use crate::{DriverRaceRecord, F1Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;

/// Read-only query surface the prediction engine needs from a race store
pub trait RaceStore {
    /// Round number of `circuit` in `season`, if that race exists
    fn find_round(&self, season: i32, circuit: &str) -> Result<Option<u32>>;

    /// All driver entries for one race, in insertion order
    fn race_entries(&self, season: i32, round: u32) -> Result<Vec<DriverRaceRecord>>;

    /// Up to `limit` of a driver's entries strictly before (season, round),
    /// oldest first
    fn prior_entries(
        &self,
        driver: &str,
        season: i32,
        round: u32,
        limit: usize,
    ) -> Result<Vec<DriverRaceRecord>>;
}

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

const ENTRY_COLUMNS: &str = "season, round, circuit_name, driver_code, team_name, \
                             grid_position, final_position, metrics";

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS race_data (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                season INTEGER NOT NULL,
                round INTEGER NOT NULL,
                circuit_name TEXT NOT NULL,
                driver_code TEXT NOT NULL,
                team_name TEXT NOT NULL,
                grid_position INTEGER NOT NULL,
                final_position INTEGER,
                metrics TEXT NOT NULL DEFAULT '{}',
                UNIQUE(season, round, driver_code)
            );

            CREATE INDEX IF NOT EXISTS idx_race_data_race ON race_data(season, round);
            CREATE INDEX IF NOT EXISTS idx_race_data_driver ON race_data(driver_code, season, round);
            "#,
        )?;
        Ok(())
    }

    // ==================== Entry Operations ====================

    /// Insert or update one driver's race entry
    pub fn upsert_entry(&self, record: &DriverRaceRecord) -> Result<()> {
        let metrics_json = serde_json::to_string(&record.metrics)?;
        self.conn.execute(
            r#"
            INSERT INTO race_data (season, round, circuit_name, driver_code, team_name,
                                   grid_position, final_position, metrics)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(season, round, driver_code) DO UPDATE SET
                circuit_name = excluded.circuit_name,
                team_name = excluded.team_name,
                grid_position = excluded.grid_position,
                final_position = COALESCE(excluded.final_position, final_position),
                metrics = excluded.metrics
            "#,
            params![
                record.season,
                record.round,
                record.circuit,
                record.driver,
                record.team,
                record.grid_position,
                record.final_position,
                metrics_json,
            ],
        )?;
        Ok(())
    }

    /// Insert multiple entries
    pub fn upsert_entries(&self, records: &[DriverRaceRecord]) -> Result<usize> {
        let mut count = 0;
        for record in records {
            self.upsert_entry(record)?;
            count += 1;
        }
        Ok(count)
    }

    /// Seasons present in the store, newest first
    pub fn seasons(&self) -> Result<Vec<i32>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT season FROM race_data ORDER BY season DESC")?;
        let seasons = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i32>, _>>()?;
        Ok(seasons)
    }

    /// Circuits raced in a season, in calendar order
    pub fn circuits(&self, season: i32) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT circuit_name FROM race_data
             WHERE season = ?1
             GROUP BY circuit_name
             ORDER BY MIN(round)",
        )?;
        let circuits = stmt
            .query_map(params![season], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(circuits)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<DriverRaceRecord> {
        let metrics_json: String = row.get(7)?;
        let metrics: BTreeMap<String, f64> =
            serde_json::from_str(&metrics_json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(DriverRaceRecord {
            season: row.get(0)?,
            round: row.get(1)?,
            circuit: row.get(2)?,
            driver: row.get(3)?,
            team: row.get(4)?,
            grid_position: row.get(5)?,
            final_position: row.get(6)?,
            metrics,
        })
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let entry_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM race_data", [], |row| row.get(0))?;

        let race_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT DISTINCT season, round FROM race_data)",
            [],
            |row| row.get(0),
        )?;

        let driver_count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT driver_code) FROM race_data",
            [],
            |row| row.get(0),
        )?;

        let (first_season, last_season): (Option<i32>, Option<i32>) = self
            .conn
            .query_row("SELECT MIN(season), MAX(season) FROM race_data", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()?
            .unwrap_or((None, None));

        Ok(DatabaseStats {
            entry_count: entry_count as usize,
            race_count: race_count as usize,
            driver_count: driver_count as usize,
            first_season,
            last_season,
        })
    }
}

impl RaceStore for Database {
    fn find_round(&self, season: i32, circuit: &str) -> Result<Option<u32>> {
        let round = self
            .conn
            .query_row(
                "SELECT round FROM race_data
                 WHERE season = ?1 AND LOWER(circuit_name) = LOWER(?2)
                 LIMIT 1",
                params![season, circuit],
                |row| row.get(0),
            )
            .optional()?;
        Ok(round)
    }

    fn race_entries(&self, season: i32, round: u32) -> Result<Vec<DriverRaceRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM race_data WHERE season = ?1 AND round = ?2 ORDER BY id",
            ENTRY_COLUMNS
        ))?;

        let entries = stmt
            .query_map(params![season, round], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    fn prior_entries(
        &self,
        driver: &str,
        season: i32,
        round: u32,
        limit: usize,
    ) -> Result<Vec<DriverRaceRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|_| F1Error::UnsupportedRequest(format!("history limit {} too large", limit)))?;
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM race_data
             WHERE driver_code = ?1
               AND (season < ?2 OR (season = ?2 AND round < ?3))
             ORDER BY season DESC, round DESC
             LIMIT ?4",
            ENTRY_COLUMNS
        ))?;

        let mut entries = stmt
            .query_map(params![driver, season, round, limit], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Reverse to get chronological order
        entries.reverse();
        Ok(entries)
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub entry_count: usize,
    pub race_count: usize,
    pub driver_count: usize,
    pub first_season: Option<i32>,
    pub last_season: Option<i32>,
}
