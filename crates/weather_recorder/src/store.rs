//! Observation store seam and its SQLite implementation.
//!
//! Records live in a single `observations` table keyed by a UUID, with a
//! UNIQUE constraint on the observation time. The constraint is the final
//! arbiter of duplicates; the check in [`crate::recorder`] only avoids
//! needless inserts.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::error::StoreError;
use crate::observation::Observation;

pub type Result<T> = std::result::Result<T, StoreError>;

/// A persisted observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub id: String,
    pub observation: Observation,
    pub recorded_at: DateTime<Utc>,
}

impl ObservationRecord {
    /// Wrap an observation with a fresh identifier.
    pub fn new(observation: Observation) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            observation,
            recorded_at: Utc::now(),
        }
    }
}

/// Storage operations the recorder relies on.
pub trait ObservationStore {
    /// Create the schema if it is missing. Also used to repair a store
    /// after a schema error.
    fn initialize(&self) -> Result<()>;

    fn exists(&self, time: &DateTime<Utc>) -> Result<bool>;

    /// Insert a record. A record with the same time must fail with
    /// [`StoreError::Duplicate`].
    fn insert(&self, record: &ObservationRecord) -> Result<()>;

    fn find(&self, time: &DateTime<Utc>) -> Result<Option<ObservationRecord>>;
}

/// SQLite-backed observation store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    ///
    /// Creates the parent directory and the schema if needed, and switches
    /// the database to WAL journal mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self { conn };
        store.initialize()?;
        log::info!("Observation store ready at {}", path.display());
        Ok(store)
    }

    /// Number of stored observations.
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Most recently observed record, if any.
    pub fn latest(&self) -> Result<Option<ObservationRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM observations ORDER BY observation_time DESC LIMIT 1"),
                [],
                RawRecord::from_row,
            )
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }
}

const COLUMNS: &str = "id, observation_time, source_id, temperature, pressure, humidity, \
                       wind_speed, wind_direction, dew_point, recorded_at";

impl ObservationStore for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS observations (
                id                TEXT PRIMARY KEY,
                observation_time  INTEGER NOT NULL UNIQUE,
                source_id         TEXT,
                temperature       REAL NOT NULL,
                pressure          REAL NOT NULL,
                humidity          REAL NOT NULL,
                wind_speed        REAL NOT NULL,
                wind_direction    REAL NOT NULL,
                dew_point         REAL NOT NULL,
                recorded_at       INTEGER NOT NULL
            );",
        )?;
        Ok(())
    }

    fn exists(&self, time: &DateTime<Utc>) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM observations WHERE observation_time = ?1",
                params![time.timestamp_millis()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&self, record: &ObservationRecord) -> Result<()> {
        let obs = &record.observation;
        let inserted = self.conn.execute(
            &format!("INSERT INTO observations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                record.id,
                obs.time.timestamp_millis(),
                obs.source_id,
                obs.temperature,
                obs.pressure,
                obs.humidity,
                obs.wind_speed,
                obs.wind_direction,
                obs.dew_point,
                record.recorded_at.timestamp_millis(),
            ],
        );

        match inserted {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::Duplicate { time: obs.time })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find(&self, time: &DateTime<Utc>) -> Result<Option<ObservationRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM observations WHERE observation_time = ?1"),
                params![time.timestamp_millis()],
                RawRecord::from_row,
            )
            .optional()?;
        row.map(RawRecord::into_record).transpose()
    }
}

/// Row as stored, before timestamps are converted back.
struct RawRecord {
    id: String,
    observation_time: i64,
    source_id: Option<String>,
    temperature: f64,
    pressure: f64,
    humidity: f64,
    wind_speed: f64,
    wind_direction: f64,
    dew_point: f64,
    recorded_at: i64,
}

impl RawRecord {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            observation_time: row.get(1)?,
            source_id: row.get(2)?,
            temperature: row.get(3)?,
            pressure: row.get(4)?,
            humidity: row.get(5)?,
            wind_speed: row.get(6)?,
            wind_direction: row.get(7)?,
            dew_point: row.get(8)?,
            recorded_at: row.get(9)?,
        })
    }

    fn into_record(self) -> Result<ObservationRecord> {
        Ok(ObservationRecord {
            observation: Observation {
                time: from_millis(self.observation_time)?,
                source_id: self.source_id,
                temperature: self.temperature,
                pressure: self.pressure,
                humidity: self.humidity,
                wind_speed: self.wind_speed,
                wind_direction: self.wind_direction,
                dew_point: self.dew_point,
            },
            recorded_at: from_millis(self.recorded_at)?,
            id: self.id,
        })
    }
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StoreError::Corrupt(format!("timestamp out of range: {millis}")))
}
