//! Weather Recorder
//!
//! Periodically fetches the latest observation for a single api.weather.gov
//! station and records it in SQLite exactly once per observation time.
//!
//! # Architecture
//!
//! ```text
//! scheduler tick ──► Acquirer ──► Observation ──► Recorder ──► ObservationStore (SQLite)
//!                      │  ▲                          │
//!                      │  └─ jittered backoff        └─ exists? ─► insert (unique on time)
//!                      ▼
//!               ObservationSource (reqwest)
//! ```
//!
//! # Modules
//!
//! - [`acquirer`] — HTTP fetch with failure classification and jittered retry.
//! - [`config`] — YAML configuration for station, headers, store and cadence.
//! - [`cycle`] — One fetch-then-save invocation and the scheduled loop.
//! - [`error`] — Fetch, store and cycle error taxonomy.
//! - [`observation`] — The observation value type and payload parsing.
//! - [`recorder`] — Idempotent check-then-insert persistence.
//! - [`schedule`] — Fixed-rate or cron cadence.
//! - [`store`] — Store seam and the SQLite implementation.

pub mod acquirer;
pub mod config;
pub mod cycle;
pub mod error;
pub mod observation;
pub mod recorder;
pub mod schedule;
pub mod store;

pub use acquirer::{Acquirer, HttpSource, ObservationSource, RetryPolicy, SourceResponse};
pub use config::{Config, ConfigError, RetryConfig};
pub use cycle::{run_cycle, run_schedule};
pub use error::{CycleError, FailureClass, FetchError, StoreError};
pub use observation::Observation;
pub use recorder::{Recorder, SaveOutcome};
pub use schedule::{Cadence, ScheduleError};
pub use store::{ObservationRecord, ObservationStore, SqliteStore};
