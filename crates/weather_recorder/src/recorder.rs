//! Idempotent persistence of observations.

use crate::error::StoreError;
use crate::observation::Observation;
use crate::store::{ObservationRecord, ObservationStore};

/// Result of a successful [`Recorder::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was written with this identifier.
    Inserted { id: String },
    /// A record for this observation time already existed.
    AlreadyRecorded,
}

/// Writes each observation time at most once.
pub struct Recorder<S> {
    store: S,
}

impl<S: ObservationStore> Recorder<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist an observation unless its time is already recorded.
    ///
    /// An existing record, or a uniqueness violation from a concurrent
    /// writer, is reported as [`SaveOutcome::AlreadyRecorded`]. Only
    /// connectivity and schema failures surface as errors.
    pub fn save(&self, observation: Observation) -> Result<SaveOutcome, StoreError> {
        if self.store.exists(&observation.time)? {
            log::info!(
                "Observation at {} already recorded, skipping",
                observation.time
            );
            return Ok(SaveOutcome::AlreadyRecorded);
        }

        let record = ObservationRecord::new(observation);
        log::debug!("Data to save: {}", record.observation);
        match self.store.insert(&record) {
            Ok(()) => {
                log::info!(
                    "Recorded observation at {} as {}",
                    record.observation.time,
                    record.id
                );
                Ok(SaveOutcome::Inserted { id: record.id })
            }
            Err(StoreError::Duplicate { time }) => {
                log::info!("Observation at {} recorded by another writer", time);
                Ok(SaveOutcome::AlreadyRecorded)
            }
            Err(e) => {
                log::error!(
                    "Couldn't add observation {}: {}",
                    record.observation.time,
                    e
                );
                Err(e)
            }
        }
    }

    /// Re-run store initialization after a failed save.
    pub fn repair(&self) -> Result<(), StoreError> {
        log::warn!("Re-initializing observation store");
        self.store.initialize()
    }
}

// ── In-memory store for testing ─────────────────────────────────────


#[cfg(test)]
mod tests {
    use super::mock::MemoryStore;
    use super::*;
    use crate::store::SqliteStore;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::Ordering;

    fn observation() -> Observation {
        Observation {
            time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            source_id: None,
            temperature: 5.0,
            pressure: 101325.0,
            humidity: 50.0,
            wind_speed: 3.0,
            wind_direction: 180.0,
            dew_point: -2.0,
        }
    }

    #[test]
    fn save_inserts_new_observation() {
        let recorder = Recorder::new(MemoryStore::default());
        let outcome = recorder.save(observation()).unwrap();
        assert!(matches!(outcome, SaveOutcome::Inserted { .. }));
        assert_eq!(recorder.store().len(), 1);
    }

    #[test]
    fn save_twice_writes_once() {
        let recorder = Recorder::new(MemoryStore::default());
        recorder.save(observation()).unwrap();
        let second = recorder.save(observation()).unwrap();
        assert_eq!(second, SaveOutcome::AlreadyRecorded);
        assert_eq!(recorder.store().len(), 1);
    }

    #[test]
    fn racing_writer_counts_as_success() {
        let recorder = Recorder::new(MemoryStore::default());
        recorder.save(observation()).unwrap();
        recorder.store().blind_exists.store(true, Ordering::SeqCst);

        let outcome = recorder.save(observation()).unwrap();
        assert_eq!(outcome, SaveOutcome::AlreadyRecorded);
        assert_eq!(recorder.store().len(), 1);
    }

    #[test]
    fn store_failure_propagates() {
        let recorder = Recorder::new(MemoryStore::default());
        recorder.store().broken.store(true, Ordering::SeqCst);

        let err = recorder.save(observation()).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert_eq!(recorder.store().len(), 0);
    }

    #[test]
    fn repair_reinitializes_store() {
        let recorder = Recorder::new(MemoryStore::default());
        recorder.store().broken.store(true, Ordering::SeqCst);
        recorder.repair().unwrap();

        assert_eq!(recorder.store().initialized.load(Ordering::SeqCst), 1);
        assert!(recorder.save(observation()).is_ok());
    }

    #[test]
    fn saved_observation_round_trips_through_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(SqliteStore::open(&dir.path().join("obs.db")).unwrap());

        let id = match recorder.save(observation()).unwrap() {
            SaveOutcome::Inserted { id } => id,
            other => panic!("expected Inserted, got {other:?}"),
        };
        let found = recorder.store().find(&observation().time).unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.observation, observation());
    }

    #[test]
    fn sqlite_save_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Recorder::new(SqliteStore::open(&dir.path().join("obs.db")).unwrap());

        recorder.save(observation()).unwrap();
        assert_eq!(
            recorder.save(observation()).unwrap(),
            SaveOutcome::AlreadyRecorded
        );
        assert_eq!(recorder.store().count().unwrap(), 1);
    }
}
